//! Canonical payload signing.
//!
//! A payload is signed against a schema: an ordered list of field names with
//! their expected primitive type. The signed message is the JSON array of the
//! schema fields' values in schema order, hashed with SHA-256 and signed with
//! BIP-340 Schnorr using zero auxiliary randomness. Fields that are not in the
//! schema do not contribute to the signature.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::schnorr::{Signature, VerifyingKey};
use serde_json::Value;

use super::keypair::Keypair;
use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
        }
    }
}

/// Ordered field-name → type contract for a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSchema {
    fields: Vec<(&'static str, FieldType)>,
}

impl PayloadSchema {
    pub fn new(fields: &[(&'static str, FieldType)]) -> Self {
        Self {
            fields: fields.to_vec(),
        }
    }

    pub fn fields(&self) -> &[(&'static str, FieldType)] {
        &self.fields
    }
}

/// Serializes the schema fields of `payload` in schema order.
pub fn canonical_bytes(payload: &Value, schema: &PayloadSchema) -> ToolResult<Vec<u8>> {
    let object = payload
        .as_object()
        .ok_or_else(|| ToolError::Signing("payload must be a JSON object".into()))?;

    let mut values = Vec::with_capacity(schema.fields.len());
    for (name, kind) in &schema.fields {
        let value = object
            .get(*name)
            .ok_or_else(|| ToolError::Signing(format!("payload is missing field '{}'", name)))?;
        if !kind.accepts(value) {
            return Err(ToolError::Signing(format!(
                "field '{}' must be a {}",
                name,
                kind.name()
            )));
        }
        values.push(value.clone());
    }

    serde_json::to_vec(&Value::Array(values)).map_err(|e| ToolError::Signing(e.to_string()))
}

/// Signs the schema subset of `payload`. Returns the 64-byte signature as hex.
pub fn sign_payload(keypair: &Keypair, payload: &Value, schema: &PayloadSchema) -> ToolResult<String> {
    let message = canonical_bytes(payload, schema)?;
    let signature: Signature = keypair
        .signing_key()
        .try_sign(&message)
        .map_err(|e| ToolError::Signing(e.to_string()))?;
    Ok(hex::encode(signature.to_bytes()))
}

/// Checks a hex signature produced by [`sign_payload`].
pub fn verify_payload(
    public_key: &str,
    payload: &Value,
    schema: &PayloadSchema,
    signature: &str,
) -> ToolResult<bool> {
    let key_bytes =
        hex::decode(public_key).map_err(|_| ToolError::InvalidKey("public key is not hex".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| ToolError::InvalidKey("public key is not a valid x-only key".into()))?;
    let sig_bytes =
        hex::decode(signature).map_err(|_| ToolError::Signing("signature is not hex".into()))?;
    let signature = Signature::try_from(sig_bytes.as_slice())
        .map_err(|_| ToolError::Signing("signature must be 64 bytes".into()))?;

    let message = canonical_bytes(payload, schema)?;
    Ok(verifying_key.verify(&message, &signature).is_ok())
}
