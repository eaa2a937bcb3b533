//! # Identity Module
//!
//! Keypair loading and persistence, canonical payload signing, the request
//! authentication schemes the remote services accept, and sealing of secrets
//! for the custody service.

pub mod auth;
pub mod encryption;
pub mod key_store;
pub mod keypair;
pub mod payload;

pub use auth::{Auth, PUBLIC_KEY_HEADER, SIGNATURE_HEADER};
pub use key_store::{generate_or_load, IdentityOutcome, KeySource, KeyStore};
pub use keypair::{load_keypair, Keypair};
pub use payload::{canonical_bytes, sign_payload, verify_payload, FieldType, PayloadSchema};
