//! # MCP Handler Module
//!
//! Implements the Model Context Protocol surface of the trading tools server.
//! Requests are dispatched to the [`ToolRegistry`]; the set of tools depends
//! on the configured capabilities (see `tools::register_all`).
//!
//! ## Methods
//! - `initialize` - server info and capabilities
//! - `tools/list` - definitions of every registered tool
//! - `tools/call` - run a tool by name with an `arguments` object
//!
//! Any registered tool name may also be used directly as the method, with
//! the arguments as `params`.

use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::mcp::{
    protocol::{error_codes, Request, Response},
    registry::ToolRegistry,
};

pub const SERVER_NAME: &str = "decom_trading_tools";
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, registry: &ToolRegistry) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req, registry),
        "tools/call" => handle_tool_call(req, registry).await,
        // Direct method calls are rewritten into tools/call
        name if registry.contains(name) => {
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": name,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, registry).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the registry.
async fn handle_tool_call(req: Request, registry: &ToolRegistry) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name.to_string(),
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let call_id = match &req.id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    match registry.call(&call_id, &tool_name, args).await {
        Ok(output) => match serde_json::to_value(&output) {
            Ok(result) => Response::success(req.id, result),
            Err(e) => Response::error(
                req.id,
                error_codes::INTERNAL_ERROR,
                format!("{}: failed to encode result: {}", tool_name, e),
            ),
        },
        Err(err) => {
            error!(tool = %tool_name, kind = err.kind(), "Tool call failed: {}", err);
            Response::error_with_data(
                req.id,
                err.rpc_code(),
                format!("{}: {}", tool_name, err),
                err.rpc_data(),
            )
        }
    }
}

fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions =
        "Decom trading tools: market data, trading agents, backtests, whitelist access and agent wallet onboarding. Authenticated tools sign requests with the configured nostr key.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

fn handle_tools_list(req: &Request, registry: &ToolRegistry) -> Response {
    Response::success(req.id.clone(), json!({ "tools": registry.definitions() }))
}
