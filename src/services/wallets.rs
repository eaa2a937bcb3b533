//! Wallet records on the trading bot backend.
//!
//! Registration is idempotent by address: the backend is asked first, and
//! only an unknown address leads to a create call. A create that fails with a
//! server error is followed by one more lookup, since the backend may have
//! applied the write before failing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use validator::Validate;

use super::client::{endpoint, ServiceClient};
use super::{entry_address, entry_id, wallet_entries};
use crate::error::{ToolError, ToolResult};
use crate::identity::{Auth, FieldType, Keypair, PayloadSchema};
use crate::utils::{same_address, unix_now, validate_evm_address};

pub const DEFAULT_WALLET_LABEL: &str = "agent-wallet";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterWalletRequest {
    #[validate(custom = "validate_evm_address")]
    pub agent_wallet_address: String,
    pub agent_id: Option<u64>,
    #[validate(length(min = 1, max = 64))]
    pub label: Option<String>,
}

/// Backend wallet record as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRegistration {
    pub wallet_id: Value,
    pub wallet_address: String,
}

fn wallets_url(base: &str) -> String {
    endpoint(base, "/api/wallets")
}

/// Wallets registered under the caller's public key.
pub async fn list_wallets(client: &ServiceClient, base_url: &str, keypair: &Keypair) -> ToolResult<Value> {
    client
        .get(
            "list wallets",
            &wallets_url(base_url),
            &[("pubkey", keypair.public_key().to_string())],
            &Auth::bearer(keypair)?,
        )
        .await
}

/// Looks up a wallet by address among the caller's wallets.
pub async fn find_wallet(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    address: &str,
) -> ToolResult<Option<WalletRegistration>> {
    let listing = list_wallets(client, base_url, keypair).await?;
    Ok(wallet_entries(&listing)
        .into_iter()
        .find(|entry| entry_address(entry).is_some_and(|a| same_address(a, address)))
        .and_then(|entry| {
            Some(WalletRegistration {
                wallet_id: entry_id(entry)?,
                wallet_address: entry_address(entry)?.to_string(),
            })
        }))
}

pub async fn register_wallet(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &RegisterWalletRequest,
) -> ToolResult<WalletRegistration> {
    let address = req.agent_wallet_address.as_str();

    if let Some(existing) = find_wallet(client, base_url, keypair, address).await? {
        info!(wallet_address = address, "Wallet already registered, skipping create");
        return Ok(existing);
    }

    let body = json!({
        "wallet_address": address,
        "agent_id": req.agent_id,
        "label": req.label.as_deref().unwrap_or(DEFAULT_WALLET_LABEL),
        "pubkey": keypair.public_key(),
        "signed_at": unix_now(),
    });
    let schema = PayloadSchema::new(&[
        ("wallet_address", FieldType::String),
        ("label", FieldType::String),
        ("signed_at", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;

    match client
        .post("create wallet", &wallets_url(base_url), &auth, &body)
        .await
    {
        Ok(created) => {
            let record = created.get("wallet").unwrap_or(&created);
            if let Some(wallet_id) = entry_id(record) {
                info!(wallet_address = address, "Wallet registered");
                return Ok(WalletRegistration {
                    wallet_id,
                    wallet_address: entry_address(record).unwrap_or(address).to_string(),
                });
            }
            // Created but the response did not echo an id.
            find_wallet(client, base_url, keypair, address)
                .await?
                .ok_or_else(|| ToolError::ParseFailure {
                    what: "wallet id from create response",
                    detail: created.to_string(),
                })
        }
        Err(err) if err.status().is_some_and(|s| s.is_server_error()) => {
            warn!(wallet_address = address, error = %err, "Wallet create failed, checking whether it landed");
            match find_wallet(client, base_url, keypair, address).await {
                Ok(Some(existing)) => Ok(existing),
                _ => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}
