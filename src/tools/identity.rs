// src/tools/identity.rs

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::NoParams;
use crate::error::ToolResult;
use crate::identity::generate_or_load;
use crate::mcp::registry::{ToolContext, ToolRegistry};
use crate::services::whitelist::{self, WhitelistRequest};
use crate::utils::parse_params;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
struct GenerateKeyParams {
    #[serde(default = "default_persist")]
    persist: bool,
}

fn default_persist() -> bool {
    true
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        "get_identity",
        "Show the public key and npub this server signs requests with",
        super::empty_schema(),
        get_identity,
    );
    registry.register(
        "generate_key",
        "Create a signing key if none exists and store it in the user config. Returns the existing identity otherwise.",
        json!({
            "type": "object",
            "properties": {
                "persist": {
                    "type": "boolean",
                    "default": true,
                    "description": "Write a newly generated key to the key store"
                }
            },
            "additionalProperties": false
        }),
        generate_key,
    );
    registry.register(
        "check_whitelist",
        "Check whether this server's public key is whitelisted for trading",
        super::empty_schema(),
        check_whitelist,
    );
    registry.register(
        "request_whitelist",
        "Ask for this server's public key to be whitelisted",
        json!({
            "type": "object",
            "properties": {
                "reason": {"type": "string", "maxLength": 1000, "description": "Why access is needed"},
                "contact": {"type": "string", "maxLength": 200, "description": "How to reach the requester"}
            },
            "additionalProperties": false
        }),
        request_whitelist,
    );
}

async fn get_identity(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    parse_params::<NoParams>(args)?;
    let keypair = ctx.keypair()?;
    Ok(json!({
        "publicKey": keypair.public_key(),
        "npub": keypair.npub(),
    }))
}

async fn generate_key(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let params: GenerateKeyParams = parse_params(args)?;
    let outcome = generate_or_load(&ctx.config, &ctx.key_store, params.persist)?;
    Ok(json!({
        "publicKey": outcome.keypair.public_key(),
        "npub": outcome.keypair.npub(),
        "persisted": outcome.persisted,
        "source": outcome.source,
        "storePath": ctx.key_store.path().display().to_string(),
    }))
}

async fn check_whitelist(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    parse_params::<NoParams>(args)?;
    let keypair = ctx.keypair()?;
    whitelist::check(&ctx.client, &ctx.config.trading_bot_url, &keypair).await
}

async fn request_whitelist(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: WhitelistRequest = parse_params(args)?;
    let keypair = ctx.keypair()?;
    whitelist::request_access(&ctx.client, &ctx.config.trading_bot_url, &keypair, &req).await
}
