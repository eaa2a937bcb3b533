//! The tool set exposed over MCP.
//!
//! One parameterized set replaces per-revision plugin copies: the
//! [`Capabilities`] in the configuration decide which tools are registered
//! and what their schemas advertise.

pub mod agents;
pub mod backtest;
pub mod identity;
pub mod market;
pub mod wallets;

use serde::Deserialize;
use serde_json::{json, Value};
use validator::{Validate, ValidationErrors};

use crate::config::{Capabilities, Config};
use crate::mcp::registry::{ToolContext, ToolRegistry};

/// Registers every tool the capabilities allow.
pub fn register_all(registry: &mut ToolRegistry, capabilities: Capabilities) {
    market::register(registry);
    identity::register(registry);
    agents::register(registry, capabilities);
    backtest::register(registry, capabilities);
    wallets::register(registry, capabilities);
}

pub fn build_registry(config: Config) -> ToolRegistry {
    let capabilities = config.capabilities;
    let mut registry = ToolRegistry::new(ToolContext::new(config));
    register_all(&mut registry, capabilities);
    registry
}

/// Arguments of tools that take none; unknown fields are still rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NoParams {}

impl Validate for NoParams {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

pub(crate) fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {}, "additionalProperties": false })
}

pub(crate) fn agent_id_schema() -> Value {
    json!({ "type": "integer", "minimum": 0, "description": "Agent id" })
}

pub(crate) fn strategy_schema() -> Value {
    json!({
        "type": "object",
        "description": "Declarative strategy, forwarded as-is",
        "properties": {
            "indicators": {"type": "array", "items": {"type": "object"}},
            "rules": {"type": ["array", "object"]},
            "riskManager": {"type": "object"}
        }
    })
}
