// src/lib.rs

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod mcp;
pub mod services;
pub mod tools;
pub mod utils;

pub use config::Config;
pub use error::{ToolError, ToolResult};
pub use mcp::registry::ToolRegistry;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: Arc<Config>,
    /// Registered tools and their shared context
    pub registry: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = tools::build_registry(config.clone());
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }
}
