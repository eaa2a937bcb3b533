//! Nostr-style identity keys.
//!
//! The private key is a 32-byte secp256k1 scalar. The public key is its
//! BIP-340 x-only form, and `npub` is the bech32 encoding of that public key.

use std::fmt;

use bech32::{Bech32, Hrp};
use k256::schnorr::SigningKey;
use rand::rngs::OsRng;
use secrecy::ExposeSecret;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{ToolError, ToolResult};

const NPUB_HRP: Hrp = Hrp::parse_unchecked("npub");
const NSEC_HRP: Hrp = Hrp::parse_unchecked("nsec");

/// A loaded signing identity. Immutable once constructed.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    public_key: String,
    npub: String,
}

impl Keypair {
    /// Parses a private key given as 64 hex chars (optionally `0x`-prefixed)
    /// or as a bech32 `nsec1...` string.
    pub fn from_secret(raw: &str) -> ToolResult<Self> {
        let raw = raw.trim();
        let bytes = Zeroizing::new(if raw.starts_with("nsec1") {
            let (hrp, data) = bech32::decode(raw)
                .map_err(|e| ToolError::InvalidKey(format!("bad nsec encoding: {}", e)))?;
            if hrp != NSEC_HRP {
                return Err(ToolError::InvalidKey(format!("unexpected prefix '{}'", hrp)));
            }
            data
        } else {
            hex::decode(raw.trim_start_matches("0x"))
                .map_err(|_| ToolError::InvalidKey("private key is not valid hex".into()))?
        });

        if bytes.len() != 32 {
            return Err(ToolError::InvalidKey(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let signing_key = SigningKey::from_bytes(&bytes)
            .map_err(|_| ToolError::InvalidKey("private key is out of range".into()))?;
        Self::from_signing_key(signing_key)
    }

    /// Generates a fresh random identity.
    pub fn generate() -> ToolResult<Self> {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(signing_key: SigningKey) -> ToolResult<Self> {
        let public_bytes = signing_key.verifying_key().to_bytes();
        let npub = bech32::encode::<Bech32>(NPUB_HRP, &public_bytes)
            .map_err(|e| ToolError::InvalidKey(format!("npub encoding failed: {}", e)))?;
        Ok(Self {
            public_key: hex::encode(public_bytes),
            npub,
            signing_key,
        })
    }

    /// Lowercase hex of the private key. Wrapped so it is wiped on drop.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.to_bytes()))
    }

    /// Lowercase hex of the x-only public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn npub(&self) -> &str {
        &self.npub
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .field("npub", &self.npub)
            .finish_non_exhaustive()
    }
}

/// Returns the configured identity, or `MissingCredential` when no key is set.
///
/// Only the plugin-scoped `nostrPrivateKey` option is consulted.
pub fn load_keypair(config: &Config) -> ToolResult<Keypair> {
    let secret = config.private_key().ok_or(ToolError::MissingCredential)?;
    Keypair::from_secret(secret.expose_secret())
}
