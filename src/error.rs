// src/error.rs

use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp::protocol::error_codes;

/// Everything a tool handler can fail with. Each variant is surfaced to the
/// caller verbatim, prefixed with the tool name.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no signing key configured (set nostrPrivateKey or run generate_key)")]
    MissingCredential,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{operation} failed: HTTP {status}: {body}")]
    Remote {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{operation} conflict: {body}")]
    ResourceConflict {
        operation: &'static str,
        body: String,
    },

    #[error("could not parse {what}: {detail}")]
    ParseFailure { what: &'static str, detail: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned invalid JSON: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("key storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("step {step} ({name}) failed: {source}")]
    Onboarding {
        step: u8,
        name: &'static str,
        /// Results of the steps that finished before the failure.
        completed: Value,
        #[source]
        source: Box<ToolError>,
    },
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    /// Short machine-readable tag carried in the JSON-RPC error data.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidParams(_) => "invalid_params",
            Self::Remote { .. } => "remote_failure",
            Self::ResourceConflict { .. } => "resource_conflict",
            Self::ParseFailure { .. } => "parse_failure",
            Self::InvalidKey(_) => "invalid_key",
            Self::Signing(_) => "signing",
            Self::Encryption(_) => "encryption",
            Self::Transport { .. } => "transport",
            Self::Decode { .. } => "decode",
            Self::Storage(_) => "storage",
            Self::UnknownTool(_) => "unknown_tool",
            Self::Onboarding { .. } => "onboarding",
        }
    }

    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::InvalidParams(_) => error_codes::INVALID_PARAMS,
            Self::UnknownTool(_) => error_codes::METHOD_NOT_FOUND,
            Self::Onboarding { source, .. } => source.rpc_code(),
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn rpc_data(&self) -> Value {
        match self {
            Self::Remote { operation, status, .. } => json!({
                "kind": self.kind(),
                "operation": operation,
                "status": status.as_u16(),
            }),
            Self::Onboarding {
                step,
                name,
                completed,
                source,
            } => json!({
                "kind": self.kind(),
                "step": step,
                "stepName": name,
                "completed": completed,
                "cause": source.rpc_data(),
            }),
            _ => json!({ "kind": self.kind() }),
        }
    }

    /// HTTP status of a remote failure, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Onboarding { source, .. } => source.status(),
            _ => None,
        }
    }
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;
