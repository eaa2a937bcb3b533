//! Three-step agent wallet onboarding.
//!
//! 1. store the agent wallet key in custody
//! 2. register the custody address with the trading bot backend
//! 3. register the trader with the settlement engine
//!
//! Steps run strictly in order and nothing is rolled back. A failure reports
//! the step number and what already completed; steps 1 and 2 resolve
//! existing records by address, so rerunning the whole flow is safe.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use validator::{Validate, ValidationError};
use zeroize::Zeroizing;

use super::client::ServiceClient;
use super::custody::{self, StoreTeeWalletRequest, StoredWallet};
use super::settlement::{self, RegisterTraderRequest};
use super::wallets::{self, RegisterWalletRequest, WalletRegistration};
use crate::config::Config;
use crate::error::{ToolError, ToolResult};
use crate::identity::Keypair;
use crate::utils::validate_evm_address;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_onboarding"))]
pub struct OnboardRequest {
    pub agent_id: u64,
    pub agent_wallet_private_key: Zeroizing<String>,
    #[validate(custom = "validate_evm_address")]
    pub user_wallet_address: String,
    #[validate(length(min = 1))]
    pub symbol: String,
    pub chain_id: u64,
    pub initial_capital: f64,
    pub leverage: f64,
    #[validate(length(min = 1, max = 64))]
    pub label: Option<String>,
}

impl std::fmt::Debug for OnboardRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardRequest")
            .field("agent_id", &self.agent_id)
            .field("user_wallet_address", &self.user_wallet_address)
            .field("symbol", &self.symbol)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

fn validate_onboarding(req: &OnboardRequest) -> Result<(), ValidationError> {
    if !(req.initial_capital.is_finite() && req.initial_capital > 0.0) {
        let mut err = ValidationError::new("initial_capital");
        err.message = Some("initialCapital must be a positive number".into());
        return Err(err);
    }
    if !(req.leverage.is_finite() && req.leverage > 0.0) {
        let mut err = ValidationError::new("leverage");
        err.message = Some("leverage must be a positive number".into());
        return Err(err);
    }
    Ok(())
}

impl OnboardRequest {
    pub fn buy_limit_usd(&self) -> f64 {
        self.initial_capital * self.leverage
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingReport {
    pub custody_wallet: StoredWallet,
    pub wallet: WalletRegistration,
    pub trader: Value,
    pub buy_limit_usd: f64,
}

fn step_failed(step: u8, name: &'static str, completed: Value, source: ToolError) -> ToolError {
    error!(step, name, error = %source, "Onboarding step failed");
    ToolError::Onboarding {
        step,
        name,
        completed,
        source: Box::new(source),
    }
}

pub async fn onboard(
    client: &ServiceClient,
    config: &Config,
    keypair: &Keypair,
    req: &OnboardRequest,
) -> ToolResult<OnboardingReport> {
    let custody_wallet = custody::store_wallet(
        client,
        &config.wallet_agent_url,
        keypair,
        &StoreTeeWalletRequest {
            private_key: req.agent_wallet_private_key.clone(),
            agent_id: Some(req.agent_id),
            label: req.label.clone(),
        },
    )
    .await
    .map_err(|e| step_failed(1, "store custody wallet", json!({}), e))?;
    info!(step = 1, wallet_address = %custody_wallet.wallet_address, "Custody wallet ready");

    let wallet = wallets::register_wallet(
        client,
        &config.trading_bot_url,
        keypair,
        &RegisterWalletRequest {
            agent_wallet_address: custody_wallet.wallet_address.clone(),
            agent_id: Some(req.agent_id),
            label: req.label.clone(),
        },
    )
    .await
    .map_err(|e| {
        step_failed(
            2,
            "register wallet",
            json!({ "custodyWallet": custody_wallet }),
            e,
        )
    })?;
    info!(step = 2, wallet_id = %wallet.wallet_id, "Backend wallet ready");

    let buy_limit_usd = req.buy_limit_usd();
    let trader = settlement::register_trader(
        client,
        &config.settlement_engine_url,
        keypair,
        &RegisterTraderRequest {
            agent_id: req.agent_id,
            agent_wallet_address: wallet.wallet_address.clone(),
            user_wallet_address: req.user_wallet_address.clone(),
            symbol: req.symbol.clone(),
            chain_id: req.chain_id,
            buy_limit_usd,
        },
    )
    .await
    .map_err(|e| {
        step_failed(
            3,
            "register trader",
            json!({ "custodyWallet": custody_wallet, "wallet": wallet }),
            e,
        )
    })?;
    info!(step = 3, agent_id = req.agent_id, "Agent onboarding complete");

    Ok(OnboardingReport {
        custody_wallet,
        wallet,
        trader,
        buy_limit_usd,
    })
}
