// src/services/settlement.rs

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::{Validate, ValidationError};

use super::client::{endpoint, ServiceClient};
use crate::error::ToolResult;
use crate::identity::{Auth, FieldType, Keypair, PayloadSchema};
use crate::utils::{unix_now, validate_evm_address};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_buy_limit"))]
pub struct RegisterTraderRequest {
    pub agent_id: u64,
    #[validate(custom = "validate_evm_address")]
    pub agent_wallet_address: String,
    #[validate(custom = "validate_evm_address")]
    pub user_wallet_address: String,
    #[validate(length(min = 1))]
    pub symbol: String,
    pub chain_id: u64,
    /// Initial capital times leverage, computed by the caller.
    pub buy_limit_usd: f64,
}

fn validate_buy_limit(req: &RegisterTraderRequest) -> Result<(), ValidationError> {
    if req.buy_limit_usd.is_finite() && req.buy_limit_usd > 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("buy_limit_usd");
        err.message = Some("buyLimitUsd must be a positive number".into());
        Err(err)
    }
}

/// Binds an agent and its wallets to the settlement engine.
pub async fn register_trader(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &RegisterTraderRequest,
) -> ToolResult<Value> {
    let body = json!({
        "agent_id": req.agent_id,
        "agent_wallet_address": req.agent_wallet_address,
        "user_wallet_address": req.user_wallet_address,
        "symbol": req.symbol,
        "chain_id": req.chain_id,
        "buy_limit_usd": req.buy_limit_usd,
        "pubkey": keypair.public_key(),
        "timestamp": unix_now(),
    });
    let schema = PayloadSchema::new(&[
        ("agent_id", FieldType::Number),
        ("agent_wallet_address", FieldType::String),
        ("user_wallet_address", FieldType::String),
        ("symbol", FieldType::String),
        ("chain_id", FieldType::Number),
        ("buy_limit_usd", FieldType::Number),
        ("timestamp", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;

    let registered = client
        .post("register trader", &endpoint(base_url, "/api/traders"), &auth, &body)
        .await?;
    info!(
        agent_id = req.agent_id,
        chain_id = req.chain_id,
        buy_limit_usd = req.buy_limit_usd,
        "Trader registered with settlement engine"
    );
    Ok(registered)
}
