// src/identity/encryption.rs

use aes_gcm::{
    aead::{Aead, OsRng},
    AeadCore, Aes256Gcm, Key, KeyInit, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use k256::{
    ecdh::{EphemeralSecret, SharedSecret},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey, SecretKey,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{ToolError, ToolResult};

const NONCE_LEN: usize = 12;

/// A secret sealed for a single recipient public key.
///
/// `ciphertext` is base64 of `[ nonce (12 bytes) | AES-256-GCM ciphertext ]`;
/// the AES key is SHA-256 of the ECDH shared x-coordinate between the
/// ephemeral key and the recipient key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    /// Compressed SEC1 ephemeral public key, hex.
    pub ephemeral_public_key: String,
    pub ciphertext: String,
}

/// Parses a recipient key given as 32-byte x-only hex (even y assumed),
/// 33-byte compressed or 65-byte uncompressed SEC1 hex.
pub fn parse_public_key(raw: &str) -> ToolResult<PublicKey> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .map_err(|_| ToolError::Encryption("recipient public key is not hex".into()))?;
    let sec1 = if bytes.len() == 32 {
        let mut prefixed = Vec::with_capacity(33);
        prefixed.push(0x02);
        prefixed.extend_from_slice(&bytes);
        prefixed
    } else {
        bytes
    };
    PublicKey::from_sec1_bytes(&sec1)
        .map_err(|_| ToolError::Encryption("recipient public key is not on secp256k1".into()))
}

fn cipher_for(shared: &SharedSecret) -> Aes256Gcm {
    let digest = Sha256::digest(shared.raw_secret_bytes());
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(digest.as_slice()))
}

/// Encrypts `plaintext` for `recipient` under a fresh ephemeral key.
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> ToolResult<SealedSecret> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key();
    let cipher = cipher_for(&ephemeral.diffie_hellman(recipient));

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| ToolError::Encryption(e.to_string()))?;

    let mut blob = nonce.to_vec();
    blob.extend_from_slice(&ciphertext);

    Ok(SealedSecret {
        ephemeral_public_key: hex::encode(ephemeral_public.to_encoded_point(true).as_bytes()),
        ciphertext: general_purpose::STANDARD.encode(blob),
    })
}

/// Recipient side of [`seal`].
pub fn open(sealed: &SealedSecret, recipient: &SecretKey) -> ToolResult<Zeroizing<Vec<u8>>> {
    let ephemeral_public = parse_public_key(&sealed.ephemeral_public_key)?;
    let blob = general_purpose::STANDARD
        .decode(&sealed.ciphertext)
        .map_err(|e| ToolError::Encryption(format!("ciphertext is not base64: {}", e)))?;
    if blob.len() < NONCE_LEN {
        return Err(ToolError::Encryption(
            "ciphertext too short to contain a nonce".into(),
        ));
    }

    let shared = k256::ecdh::diffie_hellman(recipient.to_nonzero_scalar(), ephemeral_public.as_affine());
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    cipher_for(&shared)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|e| ToolError::Encryption(e.to_string()))
}
