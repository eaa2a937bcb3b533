// src/tools/agents.rs

use std::sync::Arc;

use serde_json::{json, Value};

use super::{agent_id_schema, strategy_schema};
use crate::config::Capabilities;
use crate::error::{ToolError, ToolResult};
use crate::mcp::registry::{ToolContext, ToolRegistry};
use crate::services::agents::{
    self, AgentIdRequest, AgentMode, CreateAgentRequest, LogActionRequest, NotifyAgentRequest,
    UpdateAgentRequest,
};
use crate::utils::parse_params;

pub fn register(registry: &mut ToolRegistry, capabilities: Capabilities) {
    let modes: Vec<&str> = if capabilities.live_trading {
        vec!["paper", "live"]
    } else {
        vec!["paper"]
    };

    registry.register(
        "create_agent",
        "Create a trading agent owned by this server's public key",
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "minLength": 1, "maxLength": 64},
                "initialCapital": {"type": "number", "exclusiveMinimum": 0, "description": "Starting capital in USD"},
                "mode": {"type": "string", "enum": modes, "description": "Paper trading or live execution"},
                "symbol": {"type": "string", "description": "Trading pair, e.g. \"BTC/USDC\""},
                "strategy": strategy_schema()
            },
            "required": ["name", "initialCapital", "mode"],
            "additionalProperties": false
        }),
        create_agent,
    );
    registry.register(
        "get_agent",
        "Get a trading agent by id",
        json!({
            "type": "object",
            "properties": { "agentId": agent_id_schema() },
            "required": ["agentId"],
            "additionalProperties": false
        }),
        get_agent,
    );
    registry.register(
        "list_agents",
        "List the trading agents owned by this server's public key",
        super::empty_schema(),
        list_agents,
    );
    registry.register(
        "update_agent",
        "Rename an agent, change its capital or replace its strategy",
        json!({
            "type": "object",
            "properties": {
                "agentId": agent_id_schema(),
                "name": {"type": "string", "minLength": 1, "maxLength": 64},
                "initialCapital": {"type": "number", "exclusiveMinimum": 0},
                "strategy": strategy_schema()
            },
            "required": ["agentId", "name", "initialCapital"],
            "additionalProperties": false
        }),
        update_agent,
    );
    registry.register(
        "delete_agent",
        "Delete a trading agent",
        json!({
            "type": "object",
            "properties": { "agentId": agent_id_schema() },
            "required": ["agentId"],
            "additionalProperties": false
        }),
        delete_agent,
    );
    registry.register(
        "notify_agent",
        "Send a message to a running agent",
        json!({
            "type": "object",
            "properties": {
                "agentId": agent_id_schema(),
                "message": {"type": "string", "minLength": 1, "maxLength": 4000},
                "level": {"type": "string", "description": "Severity, defaults to \"info\""}
            },
            "required": ["agentId", "message"],
            "additionalProperties": false
        }),
        notify_agent,
    );
    registry.register(
        "log_agent_action",
        "Record an action taken on behalf of an agent",
        json!({
            "type": "object",
            "properties": {
                "agentId": agent_id_schema(),
                "action": {"type": "string", "minLength": 1, "maxLength": 128},
                "details": {"description": "Free-form context stored with the action"}
            },
            "required": ["agentId", "action"],
            "additionalProperties": false
        }),
        log_agent_action,
    );
}

async fn create_agent(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: CreateAgentRequest = parse_params(args)?;
    if req.mode == AgentMode::Live && !ctx.config.capabilities.live_trading {
        return Err(ToolError::invalid("live mode is disabled; use mode \"paper\""));
    }
    let keypair = ctx.keypair()?;
    agents::create_agent(&ctx.client, &ctx.config.trading_bot_url, &keypair, &req).await
}

async fn get_agent(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: AgentIdRequest = parse_params(args)?;
    agents::get_agent(&ctx.client, &ctx.config.trading_bot_url, req.agent_id).await
}

async fn list_agents(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    parse_params::<super::NoParams>(args)?;
    let keypair = ctx.keypair()?;
    agents::list_agents(&ctx.client, &ctx.config.trading_bot_url, &keypair).await
}

async fn update_agent(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: UpdateAgentRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    agents::update_agent(&ctx.client, &ctx.config.trading_bot_url, &keypair, &req).await
}

async fn delete_agent(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: AgentIdRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    agents::delete_agent(&ctx.client, &ctx.config.trading_bot_url, &keypair, req.agent_id).await
}

async fn notify_agent(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: NotifyAgentRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    agents::notify_agent(&ctx.client, &ctx.config.trading_bot_url, &keypair, &req).await
}

async fn log_agent_action(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: LogActionRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    agents::log_action(&ctx.client, &ctx.config.trading_bot_url, &keypair, &req).await
}
