//! Envelope sealing with AES-256-GCM.
//!
//! An envelope is self-contained: it carries its format version, the
//! fingerprint of the key that sealed it, its nonce and the GCM tag.
//!
//! ```text
//! +---------+-----------------+-----------+-------------+----------------------+
//! | version | key fingerprint |   nonce   | header check| ciphertext + GCM tag |
//! |   1 B   |       8 B       |   12 B    |     4 B     |        n + 16 B      |
//! +---------+-----------------+-----------+-------------+----------------------+
//! ```
//!
//! The header check is the first four bytes of SHA-256 over the bytes before
//! it, and the whole header is bound to the ciphertext as associated data.
//! A damaged header is therefore reported as an integrity failure rather than
//! being mistaken for a key mismatch.
//!
//! Envelopes keep message text out of transport logs and intermediate
//! storage. They do not protect against the holder of the key, which is the
//! same process that sends them.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::key::{KeyMaterial, FINGERPRINT_LENGTH};
use crate::error::{CourierError, Result};

const ENVELOPE_VERSION: u8 = 1;
const NONCE_LENGTH: usize = 12;
const CHECK_LENGTH: usize = 4;
const TAG_LENGTH: usize = 16;

const FINGERPRINT_START: usize = 1;
const NONCE_START: usize = FINGERPRINT_START + FINGERPRINT_LENGTH;
const CHECK_START: usize = NONCE_START + NONCE_LENGTH;
const HEADER_LENGTH: usize = CHECK_START + CHECK_LENGTH;

/// Prefix of an outgoing message that carries a sealed envelope.
pub const SEALED_PREFIX: &str = "\u{1F510} ";

/// Prefix of an outgoing message sent in the clear because sealing failed.
pub const FALLBACK_PREFIX: &str = "\u{26A0}\u{FE0F} ";

fn cipher_for(key: &KeyMaterial) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.key().as_bytes())
        .map_err(|e| CourierError::Crypto(format!("failed to create cipher: {}", e)))
}

fn header_check(prefix: &[u8]) -> [u8; CHECK_LENGTH] {
    let digest = Sha256::digest(prefix);
    let mut out = [0u8; CHECK_LENGTH];
    out.copy_from_slice(&digest[..CHECK_LENGTH]);
    out
}

/// Seal `plaintext` under `key`.
///
/// A fresh random nonce is drawn for every call, so sealing the same text
/// twice yields different envelopes.
pub fn seal(plaintext: &str, key: &KeyMaterial) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| CourierError::Crypto(format!("failed to generate nonce: {}", e)))?;

    let mut header = Vec::with_capacity(HEADER_LENGTH);
    header.push(ENVELOPE_VERSION);
    header.extend_from_slice(&key.fingerprint());
    header.extend_from_slice(&nonce_bytes);
    let check = header_check(&header);
    header.extend_from_slice(&check);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext.as_bytes(),
                aad: &header,
            },
        )
        .map_err(|e| CourierError::Crypto(format!("encryption failed: {}", e)))?;

    let mut envelope = header;
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Open an envelope produced by [`seal`].
///
/// # Errors
///
/// - `CourierError::Integrity` if the envelope is truncated, damaged or tampered with
/// - `CourierError::KeyMismatch` if it was sealed with a different key
pub fn open(envelope: &[u8], key: &KeyMaterial) -> Result<String> {
    if envelope.len() < HEADER_LENGTH + TAG_LENGTH {
        return Err(CourierError::Integrity(format!(
            "envelope too short ({} bytes)",
            envelope.len()
        )));
    }

    let (header, ciphertext) = envelope.split_at(HEADER_LENGTH);
    if header_check(&header[..CHECK_START]) != header[CHECK_START..] {
        return Err(CourierError::Integrity("header check mismatch".into()));
    }
    if header[0] != ENVELOPE_VERSION {
        return Err(CourierError::Integrity(format!(
            "unsupported envelope version: {}",
            header[0]
        )));
    }
    if header[FINGERPRINT_START..NONCE_START] != key.fingerprint() {
        return Err(CourierError::KeyMismatch);
    }

    let cipher = cipher_for(key)?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&header[NONCE_START..CHECK_START]),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| CourierError::Integrity("authentication tag mismatch".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| CourierError::Integrity("plaintext is not valid UTF-8".into()))
}

/// Seal and encode as base64 text, ready to be typed into a message box.
pub fn seal_text(plaintext: &str, key: &KeyMaterial) -> Result<String> {
    Ok(STANDARD.encode(seal(plaintext, key)?))
}

/// Decode base64 text produced by [`seal_text`] and open it.
pub fn open_text(encoded: &str, key: &KeyMaterial) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim().as_bytes())
        .map_err(|e| CourierError::Integrity(format!("envelope is not valid base64: {}", e)))?;
    open(&bytes, key)
}

/// Text actually submitted to a target, in one of three framings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingText {
    /// Envelope disabled for the job: message sent as written.
    Plain(String),
    /// Base64 envelope, sent with [`SEALED_PREFIX`].
    Sealed(String),
    /// Sealing failed: message sent in the clear with [`FALLBACK_PREFIX`].
    Fallback(String),
}

impl OutgoingText {
    /// Build the outgoing text for `message`.
    ///
    /// With no key, or when sealing fails, the message is still delivered as a
    /// tagged fallback rather than dropped. The error is returned alongside so
    /// the caller can record it.
    pub fn build(message: &str, key: Option<&KeyMaterial>) -> (Self, Option<CourierError>) {
        let Some(key) = key else {
            return (
                Self::Fallback(message.to_string()),
                Some(CourierError::Crypto("no key material available".into())),
            );
        };
        match seal_text(message, key) {
            Ok(encoded) => (Self::Sealed(encoded), None),
            Err(err) => (Self::Fallback(message.to_string()), Some(err)),
        }
    }

    /// Recognize a submitted text. Anything without a known prefix is `Plain`.
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix(SEALED_PREFIX) {
            Self::Sealed(rest.to_string())
        } else if let Some(rest) = text.strip_prefix(FALLBACK_PREFIX) {
            Self::Fallback(rest.to_string())
        } else {
            Self::Plain(text.to_string())
        }
    }

    /// The exact string handed to the dispatcher.
    pub fn render(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Sealed(encoded) => format!("{}{}", SEALED_PREFIX, encoded),
            Self::Fallback(text) => format!("{}{}", FALLBACK_PREFIX, text),
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }
}
