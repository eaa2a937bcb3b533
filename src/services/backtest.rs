// src/services/backtest.rs

use serde::Deserialize;
use serde_json::{json, Number, Value};
use tracing::info;
use validator::{Validate, ValidationError};

use super::agents::validate_strategy;
use super::client::{endpoint, ServiceClient};
use super::market::RESOLUTIONS;
use crate::error::ToolResult;
use crate::identity::{Auth, FieldType, Keypair, PayloadSchema};
use crate::utils::unix_now;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_submit"))]
pub struct SubmitBacktestRequest {
    pub agent_id: u64,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1))]
    pub symbol: String,
    pub initial_capital: f64,
    pub from: Option<Number>,
    pub to: Option<Number>,
    pub resolution: Option<String>,
    #[validate(custom = "validate_strategy")]
    pub strategy: Value,
    /// Simulation settings (fees, slippage, latency), forwarded as-is.
    pub simulation: Option<Value>,
}

fn validate_submit(req: &SubmitBacktestRequest) -> Result<(), ValidationError> {
    let fail = |code: &'static str, message: &'static str| {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        Err(err)
    };
    if !(req.initial_capital.is_finite() && req.initial_capital > 0.0) {
        return fail("initial_capital", "initialCapital must be a positive number");
    }
    if let (Some(from), Some(to)) = (
        req.from.as_ref().and_then(Number::as_f64),
        req.to.as_ref().and_then(Number::as_f64),
    ) {
        if from >= to {
            return fail("range", "from must be earlier than to");
        }
    }
    if let Some(resolution) = &req.resolution {
        if !RESOLUTIONS.contains(&resolution.as_str()) {
            return fail("resolution", "resolution is not a supported candle size");
        }
    }
    if req.simulation.as_ref().is_some_and(|s| !s.is_object()) {
        return fail("simulation", "simulation must be an object");
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BacktestJobRequest {
    #[validate(custom = "validate_job_id")]
    pub job_id: String,
}

fn validate_job_id(job_id: &str) -> Result<(), ValidationError> {
    let ok = !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("job_id");
        err.message = Some("jobId must be a non-empty alphanumeric identifier".into());
        Err(err)
    }
}

pub async fn submit(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &SubmitBacktestRequest,
) -> ToolResult<Value> {
    let mut body = json!({
        "id": req.agent_id,
        "agent_id": req.agent_id,
        "name": req.name,
        "symbol": req.symbol,
        "initial_capital": req.initial_capital,
        "from": req.from,
        "to": req.to,
        "resolution": req.resolution,
        "strategy": req.strategy,
        "pubkey": keypair.public_key(),
        "signed_at": unix_now(),
    });
    if let Some(simulation) = &req.simulation {
        body["simulation"] = simulation.clone();
    }

    let schema = PayloadSchema::new(&[
        ("id", FieldType::Number),
        ("name", FieldType::String),
        ("initial_capital", FieldType::Number),
        ("signed_at", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;

    let job = client
        .post("submit backtest", &endpoint(base_url, "/api/backtests"), &auth, &body)
        .await?;
    info!(agent_id = req.agent_id, symbol = %req.symbol, "Backtest submitted");
    Ok(job)
}

pub async fn status(client: &ServiceClient, base_url: &str, job_id: &str) -> ToolResult<Value> {
    client
        .get(
            "backtest status",
            &endpoint(base_url, &format!("/api/backtests/{}/status", job_id)),
            &[],
            &Auth::None,
        )
        .await
}

pub async fn result(client: &ServiceClient, base_url: &str, job_id: &str) -> ToolResult<Value> {
    client
        .get(
            "backtest result",
            &endpoint(base_url, &format!("/api/backtests/{}/result", job_id)),
            &[],
            &Auth::None,
        )
        .await
}
