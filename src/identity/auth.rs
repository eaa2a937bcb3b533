//! Request authentication built on payload signatures.

use reqwest::RequestBuilder;
use serde_json::{json, Value};

use super::keypair::Keypair;
use super::payload::{sign_payload, FieldType, PayloadSchema};
use crate::error::ToolResult;

pub const PUBLIC_KEY_HEADER: &str = "x-public-key";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// How an outgoing request proves the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    /// `Authorization: Bearer <pubkey>:<signature over {pubkey}>`
    Bearer(String),
    /// `x-public-key` / `x-signature` over a request-specific payload.
    Signed { public_key: String, signature: String },
}

impl Auth {
    /// Lightweight proof of key ownership: signs the single-field `{pubkey}`
    /// challenge.
    pub fn bearer(keypair: &Keypair) -> ToolResult<Self> {
        let schema = PayloadSchema::new(&[("pubkey", FieldType::String)]);
        let signature = sign_payload(keypair, &json!({ "pubkey": keypair.public_key() }), &schema)?;
        Ok(Auth::Bearer(format!("{}:{}", keypair.public_key(), signature)))
    }

    /// Signs the schema subset of `payload` for header-based verification.
    pub fn signed(keypair: &Keypair, payload: &Value, schema: &PayloadSchema) -> ToolResult<Self> {
        Ok(Auth::Signed {
            public_key: keypair.public_key().to_string(),
            signature: sign_payload(keypair, payload, schema)?,
        })
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Signed {
                public_key,
                signature,
            } => request
                .header(PUBLIC_KEY_HEADER, public_key)
                .header(SIGNATURE_HEADER, signature),
        }
    }
}
