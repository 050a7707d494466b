//! Cryptographic operations for Courier.
//!
//! This module provides key derivation, key persistence and message
//! envelopes using well-audited libraries:
//! - **PBKDF2-HMAC-SHA256** (default) or **Argon2id** for key derivation
//! - **AES-256-GCM** for authenticated envelope encryption
//!
//! ## Threat Model
//!
//! We defend against:
//! - Message text leaking into transport logs or intermediate storage
//! - Silent corruption or tampering of an envelope in transit
//!
//! We do NOT defend against:
//! - The key holder itself (the sending process has the key)
//! - Theft of the key file (stored unencrypted, owner-only permissions)

pub mod envelope;
pub mod key;
pub mod keystore;

pub use envelope::{
    open, open_text, seal, seal_text, OutgoingText, FALLBACK_PREFIX, SEALED_PREFIX,
};
pub use key::{derive_key, DerivedKey, KdfParams, KeyAlgorithm, KeyMaterial};
pub use keystore::{FileKeyStore, KeyStore, MemoryKeyStore};
