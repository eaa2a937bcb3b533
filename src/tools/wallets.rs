//! Wallet tools: backend registration and, with live trading enabled, TEE
//! custody, settlement registration and the combined onboarding flow.

use std::sync::Arc;

use serde_json::{json, Value};

use super::agent_id_schema;
use crate::config::Capabilities;
use crate::error::ToolResult;
use crate::mcp::registry::{ToolContext, ToolRegistry};
use crate::services::custody::{self, StoreTeeWalletRequest};
use crate::services::onboarding::{self, OnboardRequest};
use crate::services::settlement::{self, RegisterTraderRequest};
use crate::services::wallets::{self, RegisterWalletRequest};
use crate::utils::parse_params;

fn address_schema(description: &str) -> Value {
    json!({
        "type": "string",
        "pattern": "^0x[0-9a-fA-F]{40}$",
        "description": description
    })
}

fn private_key_schema() -> Value {
    json!({
        "type": "string",
        "description": "Agent wallet private key (hex). Sealed to the custody service before it is sent."
    })
}

pub fn register(registry: &mut ToolRegistry, capabilities: Capabilities) {
    registry.register(
        "list_wallets",
        "List the wallets registered under this server's public key",
        super::empty_schema(),
        list_wallets,
    );
    registry.register(
        "register_wallet",
        "Register an agent wallet address with the trading backend. Returns the existing record if the address is already registered.",
        json!({
            "type": "object",
            "properties": {
                "agentWalletAddress": address_schema("Agent wallet address"),
                "agentId": agent_id_schema(),
                "label": {"type": "string", "minLength": 1, "maxLength": 64}
            },
            "required": ["agentWalletAddress"],
            "additionalProperties": false
        }),
        register_wallet,
    );

    if !capabilities.live_trading {
        return;
    }

    registry.register(
        "store_tee_wallet",
        "Store an agent wallet key in TEE custody. An already stored wallet is resolved to its address.",
        json!({
            "type": "object",
            "properties": {
                "privateKey": private_key_schema(),
                "agentId": agent_id_schema(),
                "label": {"type": "string", "minLength": 1, "maxLength": 64}
            },
            "required": ["privateKey"],
            "additionalProperties": false
        }),
        store_tee_wallet,
    );
    registry.register(
        "register_trader",
        "Register an agent and its wallets with the settlement engine",
        json!({
            "type": "object",
            "properties": {
                "agentId": agent_id_schema(),
                "agentWalletAddress": address_schema("Agent wallet address"),
                "userWalletAddress": address_schema("User wallet that funds the agent"),
                "symbol": {"type": "string"},
                "chainId": {"type": "integer", "minimum": 1},
                "buyLimitUsd": {"type": "number", "exclusiveMinimum": 0, "description": "Initial capital times leverage"}
            },
            "required": ["agentId", "agentWalletAddress", "userWalletAddress", "symbol", "chainId", "buyLimitUsd"],
            "additionalProperties": false
        }),
        register_trader,
    );
    registry.register(
        "onboard_agent_wallet",
        "Store the agent wallet in custody, register it with the backend, then register the trader with the settlement engine",
        json!({
            "type": "object",
            "properties": {
                "agentId": agent_id_schema(),
                "agentWalletPrivateKey": private_key_schema(),
                "userWalletAddress": address_schema("User wallet that funds the agent"),
                "symbol": {"type": "string"},
                "chainId": {"type": "integer", "minimum": 1},
                "initialCapital": {"type": "number", "exclusiveMinimum": 0},
                "leverage": {"type": "number", "exclusiveMinimum": 0},
                "label": {"type": "string", "minLength": 1, "maxLength": 64}
            },
            "required": ["agentId", "agentWalletPrivateKey", "userWalletAddress", "symbol", "chainId", "initialCapital", "leverage"],
            "additionalProperties": false
        }),
        onboard_agent_wallet,
    );
}

async fn list_wallets(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    parse_params::<super::NoParams>(args)?;
    let keypair = ctx.keypair()?;
    wallets::list_wallets(&ctx.client, &ctx.config.trading_bot_url, &keypair).await
}

async fn register_wallet(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: RegisterWalletRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    let wallet = wallets::register_wallet(&ctx.client, &ctx.config.trading_bot_url, &keypair, &req).await?;
    Ok(json!(wallet))
}

async fn store_tee_wallet(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: StoreTeeWalletRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    let stored = custody::store_wallet(&ctx.client, &ctx.config.wallet_agent_url, &keypair, &req).await?;
    Ok(json!(stored))
}

async fn register_trader(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: RegisterTraderRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    settlement::register_trader(&ctx.client, &ctx.config.settlement_engine_url, &keypair, &req).await
}

async fn onboard_agent_wallet(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: OnboardRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    let report = onboarding::onboard(&ctx.client, &ctx.config, &keypair, &req).await?;
    Ok(json!(report))
}
