//! # API Module
//!
//! HTTP surface of the trading tools server.
//!
//! ## Available Endpoints
//! - `GET /api/health` - Liveness plus the number of registered tools
//! - `POST /api/rpc` - JSON-RPC endpoint for MCP tool calls

pub mod health;
pub mod rpc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/rpc", post(rpc::rpc_handler));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
