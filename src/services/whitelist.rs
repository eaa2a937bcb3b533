// src/services/whitelist.rs

use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::client::{endpoint, ServiceClient};
use crate::error::ToolResult;
use crate::identity::{Auth, Keypair};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WhitelistRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub contact: Option<String>,
}

/// Whether the caller's public key is allowed to trade.
pub async fn check(client: &ServiceClient, base_url: &str, keypair: &Keypair) -> ToolResult<Value> {
    client
        .get(
            "whitelist check",
            &endpoint(base_url, "/api/whitelist/check"),
            &[("pubkey", keypair.public_key().to_string())],
            &Auth::bearer(keypair)?,
        )
        .await
}

pub async fn request_access(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &WhitelistRequest,
) -> ToolResult<Value> {
    let body = json!({
        "pubkey": keypair.public_key(),
        "npub": keypair.npub(),
        "reason": req.reason,
        "contact": req.contact,
    });
    client
        .post(
            "whitelist request",
            &endpoint(base_url, "/api/whitelist/request"),
            &Auth::bearer(keypair)?,
            &body,
        )
        .await
}
