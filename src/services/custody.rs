//! Agent wallet custody in the TEE-backed wallet agent.
//!
//! The agent wallet's private key is sealed to the custody service's public
//! key before it leaves this process. When the custody service already holds
//! a wallet for this identity it answers with a `WALLET_EXISTS` error whose
//! shape is not consistent, so the stored address is resolved in order:
//! the create response, an address embedded in the error text, and finally
//! the last entry of the wallet listing.

use std::str::FromStr;

use ethers_core::utils::to_checksum;
use ethers_signers::{LocalWallet, Signer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use validator::{Validate, ValidationError};
use zeroize::Zeroizing;

use super::client::{endpoint, ServiceClient};
use super::{entry_address, wallet_entries};
use crate::error::{ToolError, ToolResult};
use crate::identity::encryption::{parse_public_key, seal};
use crate::identity::{Auth, FieldType, Keypair, PayloadSchema};
use crate::utils::{find_evm_address, unix_now};

pub const WALLET_EXISTS: &str = "WALLET_EXISTS";

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreTeeWalletRequest {
    /// Agent wallet private key, hex.
    #[validate(custom = "validate_wallet_key")]
    pub private_key: Zeroizing<String>,
    pub agent_id: Option<u64>,
    #[validate(length(min = 1, max = 64))]
    pub label: Option<String>,
}

impl std::fmt::Debug for StoreTeeWalletRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTeeWalletRequest")
            .field("agent_id", &self.agent_id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

fn validate_wallet_key(key: &str) -> Result<(), ValidationError> {
    if LocalWallet::from_str(key).is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("private_key");
        err.message = Some("privateKey must be a 32-byte hex secp256k1 key".into());
        Err(err)
    }
}

/// How the custody address was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Created,
    ExistingFromError,
    ExistingFromListing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWallet {
    /// Address the custody service reports for the wallet.
    pub wallet_address: String,
    /// Address computed locally from the submitted key.
    pub derived_address: String,
    pub resolution: Resolution,
}

/// Checksummed address of the wallet a private key controls.
pub fn wallet_address(private_key: &str) -> ToolResult<String> {
    let wallet = LocalWallet::from_str(private_key)
        .map_err(|e| ToolError::invalid(format!("invalid agent wallet key: {}", e)))?;
    Ok(to_checksum(&wallet.address(), None))
}

async fn custody_public_key(client: &ServiceClient, base_url: &str) -> ToolResult<String> {
    let resp = client
        .get("custody public key", &endpoint(base_url, "/api/public-key"), &[], &Auth::None)
        .await?;
    ["publicKey", "public_key", "pubkey"]
        .iter()
        .find_map(|k| resp.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| ToolError::ParseFailure {
            what: "custody public key",
            detail: resp.to_string(),
        })
}

/// Wallets held by the custody service for the caller.
pub async fn list_custody_wallets(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
) -> ToolResult<Value> {
    client
        .get(
            "list custody wallets",
            &endpoint(base_url, "/api/wallets"),
            &[("pubkey", keypair.public_key().to_string())],
            &Auth::bearer(keypair)?,
        )
        .await
}

pub async fn store_wallet(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &StoreTeeWalletRequest,
) -> ToolResult<StoredWallet> {
    let derived_address = wallet_address(&req.private_key)?;
    debug!(derived_address = %derived_address, "Storing agent wallet in custody");

    let recipient = parse_public_key(&custody_public_key(client, base_url).await?)?;
    let secret = Zeroizing::new(req.private_key.trim_start_matches("0x").to_lowercase());
    let sealed = seal(secret.as_bytes(), &recipient)?;

    let body = json!({
        "encrypted_key": sealed.ciphertext,
        "ephemeral_public_key": sealed.ephemeral_public_key,
        "address": derived_address,
        "agent_id": req.agent_id,
        "label": req.label,
        "pubkey": keypair.public_key(),
        "timestamp": unix_now(),
    });
    let schema = PayloadSchema::new(&[
        ("encrypted_key", FieldType::String),
        ("ephemeral_public_key", FieldType::String),
        ("timestamp", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;

    let err = match client
        .post("store custody wallet", &endpoint(base_url, "/api/wallets"), &auth, &body)
        .await
    {
        Ok(resp) => {
            let record = resp.get("wallet").unwrap_or(&resp);
            let address = entry_address(record).unwrap_or(&derived_address).to_string();
            info!(wallet_address = %address, "Wallet stored in custody");
            return Ok(StoredWallet {
                wallet_address: address,
                derived_address,
                resolution: Resolution::Created,
            });
        }
        Err(err) => err,
    };

    let body_text = match &err {
        ToolError::Remote { body, .. } if body.contains(WALLET_EXISTS) => body.clone(),
        _ => return Err(err),
    };

    if let Some(address) = find_evm_address(&body_text) {
        info!(wallet_address = %address, "Custody already holds wallet (address from error)");
        return Ok(StoredWallet {
            wallet_address: address,
            derived_address,
            resolution: Resolution::ExistingFromError,
        });
    }

    warn!("WALLET_EXISTS without an address, falling back to listing");
    let listing = list_custody_wallets(client, base_url, keypair).await?;
    let address = wallet_entries(&listing)
        .last()
        .and_then(|entry| entry_address(entry))
        .map(str::to_string)
        .ok_or(ToolError::ResourceConflict {
            operation: "store custody wallet",
            body: body_text,
        })?;

    info!(wallet_address = %address, "Custody already holds wallet (address from listing)");
    Ok(StoredWallet {
        wallet_address: address,
        derived_address,
        resolution: Resolution::ExistingFromListing,
    })
}
