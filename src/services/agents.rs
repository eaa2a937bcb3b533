//! Agent lifecycle calls against the trading bot service.
//!
//! Agents are owned by the remote service and keyed by an integer id. This
//! module only builds and signs the requests; ids are passed through.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::{Validate, ValidationError};

use super::client::{endpoint, ServiceClient};
use crate::error::ToolResult;
use crate::identity::{Auth, FieldType, Keypair, PayloadSchema};
use crate::utils::unix_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Paper,
    Live,
}

impl AgentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentMode::Paper => "paper",
            AgentMode::Live => "live",
        }
    }
}

/// Shape check for the opaque strategy block. Contents are never interpreted.
pub fn validate_strategy(strategy: &Value) -> Result<(), ValidationError> {
    let fail = |message: &'static str| {
        let mut err = ValidationError::new("strategy");
        err.message = Some(message.into());
        Err(err)
    };

    let Some(object) = strategy.as_object() else {
        return fail("strategy must be an object");
    };
    if object.get("indicators").is_some_and(|v| !v.is_array()) {
        return fail("strategy.indicators must be an array");
    }
    if object
        .get("rules")
        .is_some_and(|v| !(v.is_array() || v.is_object()))
    {
        return fail("strategy.rules must be an array or object");
    }
    for key in ["riskManager", "risk_manager"] {
        if object.get(key).is_some_and(|v| !v.is_object()) {
            return fail("strategy.riskManager must be an object");
        }
    }
    Ok(())
}

fn validate_capital(capital: f64) -> Result<(), ValidationError> {
    if capital.is_finite() && capital > 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("initial_capital");
        err.message = Some("initialCapital must be a positive number".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_create_agent"))]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub initial_capital: f64,
    pub mode: AgentMode,
    #[validate(length(min = 1))]
    pub symbol: Option<String>,
    #[validate(custom = "validate_strategy")]
    pub strategy: Option<Value>,
}

fn validate_create_agent(req: &CreateAgentRequest) -> Result<(), ValidationError> {
    validate_capital(req.initial_capital)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_update_agent"))]
pub struct UpdateAgentRequest {
    pub agent_id: u64,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub initial_capital: f64,
    #[validate(custom = "validate_strategy")]
    pub strategy: Option<Value>,
}

fn validate_update_agent(req: &UpdateAgentRequest) -> Result<(), ValidationError> {
    validate_capital(req.initial_capital)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentIdRequest {
    pub agent_id: u64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotifyAgentRequest {
    pub agent_id: u64,
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
    #[validate(length(min = 1))]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LogActionRequest {
    pub agent_id: u64,
    #[validate(length(min = 1, max = 128))]
    pub action: String,
    pub details: Option<Value>,
}

fn agents_url(base: &str) -> String {
    endpoint(base, "/api/agents")
}

fn agent_url(base: &str, agent_id: u64, suffix: &str) -> String {
    endpoint(base, &format!("/api/agents/{}{}", agent_id, suffix))
}

pub async fn create_agent(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &CreateAgentRequest,
) -> ToolResult<Value> {
    let body = json!({
        "name": req.name,
        "initial_capital": req.initial_capital,
        "mode": req.mode.as_str(),
        "symbol": req.symbol,
        "strategy": req.strategy,
        "pubkey": keypair.public_key(),
        "signed_at": unix_now(),
    });
    let schema = PayloadSchema::new(&[
        ("name", FieldType::String),
        ("initial_capital", FieldType::Number),
        ("mode", FieldType::String),
        ("signed_at", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;

    let created = client
        .post("create agent", &agents_url(base_url), &auth, &body)
        .await?;
    info!(name = %req.name, mode = req.mode.as_str(), "Agent created");
    Ok(created)
}

pub async fn get_agent(client: &ServiceClient, base_url: &str, agent_id: u64) -> ToolResult<Value> {
    client
        .get("get agent", &agent_url(base_url, agent_id, ""), &[], &Auth::None)
        .await
}

/// Agents owned by the caller's public key.
pub async fn list_agents(client: &ServiceClient, base_url: &str, keypair: &Keypair) -> ToolResult<Value> {
    client
        .get(
            "list agents",
            &agents_url(base_url),
            &[("pubkey", keypair.public_key().to_string())],
            &Auth::bearer(keypair)?,
        )
        .await
}

pub async fn update_agent(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &UpdateAgentRequest,
) -> ToolResult<Value> {
    let body = json!({
        "id": req.agent_id,
        "name": req.name,
        "initial_capital": req.initial_capital,
        "strategy": req.strategy,
        "signed_at": unix_now(),
    });
    let schema = PayloadSchema::new(&[
        ("id", FieldType::Number),
        ("name", FieldType::String),
        ("initial_capital", FieldType::Number),
        ("signed_at", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;
    client
        .send(
            "update agent",
            Method::PATCH,
            &agent_url(base_url, req.agent_id, ""),
            &auth,
            Some(&body),
        )
        .await
}

pub async fn delete_agent(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    agent_id: u64,
) -> ToolResult<Value> {
    let body = json!({ "id": agent_id, "signed_at": unix_now() });
    let schema = PayloadSchema::new(&[("id", FieldType::Number), ("signed_at", FieldType::Number)]);
    let auth = Auth::signed(keypair, &body, &schema)?;
    client
        .send(
            "delete agent",
            Method::DELETE,
            &agent_url(base_url, agent_id, ""),
            &auth,
            Some(&body),
        )
        .await
}

pub async fn notify_agent(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &NotifyAgentRequest,
) -> ToolResult<Value> {
    let body = json!({
        "id": req.agent_id,
        "message": req.message,
        "level": req.level.as_deref().unwrap_or("info"),
        "timestamp": unix_now(),
    });
    let schema = PayloadSchema::new(&[
        ("id", FieldType::Number),
        ("message", FieldType::String),
        ("timestamp", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;
    client
        .post("notify agent", &agent_url(base_url, req.agent_id, "/notify"), &auth, &body)
        .await
}

pub async fn log_action(
    client: &ServiceClient,
    base_url: &str,
    keypair: &Keypair,
    req: &LogActionRequest,
) -> ToolResult<Value> {
    let body = json!({
        "id": req.agent_id,
        "action": req.action,
        "details": req.details.clone().unwrap_or(Value::Null),
        "created_at": unix_now(),
    });
    let schema = PayloadSchema::new(&[
        ("id", FieldType::Number),
        ("action", FieldType::String),
        ("created_at", FieldType::Number),
    ]);
    let auth = Auth::signed(keypair, &body, &schema)?;
    client
        .post("log agent action", &agent_url(base_url, req.agent_id, "/actions"), &auth, &body)
        .await
}
