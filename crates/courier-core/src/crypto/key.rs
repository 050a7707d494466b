//! Key derivation and the key material handed to envelopes.
//!
//! Keys are derived from a password and a random salt with a deliberately
//! slow KDF. PBKDF2-HMAC-SHA256 is the default; Argon2id is available for
//! deployments that prefer a memory-hard function.

use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::error::{CourierError, Result};

/// Length of derived key in bytes (32 bytes = 256 bits for AES-256).
pub const KEY_LENGTH: usize = 32;

/// Length of the random salt stored next to the key.
pub const SALT_LENGTH: usize = 16;

/// Length of the key fingerprint carried by envelopes.
pub const FINGERPRINT_LENGTH: usize = 8;

/// Lowest PBKDF2 iteration count accepted.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Argon2id defaults (OWASP-recommended minimum):
/// 64 MB of memory, 3 passes, single lane.
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 1;

/// Cipher the key material is intended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aes256Gcm => write!(f, "AES-256-GCM"),
        }
    }
}

/// Password-based KDF and its cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum KdfParams {
    Pbkdf2Sha256 {
        iterations: u32,
    },
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Argon2id with the default cost parameters.
    pub fn argon2id() -> Self {
        Self::Argon2id {
            memory_kib: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }

    /// Short name used in config files and status output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pbkdf2Sha256 { .. } => "pbkdf2-sha256",
            Self::Argon2id { .. } => "argon2id",
        }
    }

    /// Reject parameter sets too weak to be worth persisting.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Pbkdf2Sha256 { iterations } if iterations < MIN_PBKDF2_ITERATIONS => {
                Err(CourierError::InvalidInput(format!(
                    "PBKDF2 needs at least {} iterations (got {})",
                    MIN_PBKDF2_ITERATIONS, iterations
                )))
            }
            Self::Argon2id { iterations: 0, .. } | Self::Argon2id { parallelism: 0, .. } => Err(
                CourierError::InvalidInput("Argon2id iterations and parallelism must be > 0".into()),
            ),
            _ => Ok(()),
        }
    }
}

/// A 256-bit key derived from a password.
///
/// The bytes are zeroized when the value is dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Raw key bytes. Use only for immediate cipher operations; never log.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a key from `password` and `salt`.
///
/// Same password, salt and parameters always produce the same key. Any
/// password is accepted, including the empty string; password policy is the
/// caller's business.
pub fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<DerivedKey> {
    if salt.len() < SALT_LENGTH {
        return Err(CourierError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            SALT_LENGTH
        )));
    }
    params.validate()?;

    let mut key_bytes = [0u8; KEY_LENGTH];
    match *params {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key_bytes);
        }
        KdfParams::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } => {
            let argon_params =
                argon2::Params::new(memory_kib, iterations, parallelism, Some(KEY_LENGTH))
                    .map_err(|e| {
                        CourierError::Crypto(format!("Failed to create Argon2 params: {}", e))
                    })?;
            Argon2::new(
                argon2::Algorithm::Argon2id,
                argon2::Version::V0x13,
                argon_params,
            )
            .hash_password_into(password.as_bytes(), salt, &mut key_bytes)
            .map_err(|e| CourierError::Crypto(format!("Key derivation failed: {}", e)))?;
        }
    }

    Ok(DerivedKey::from_bytes(key_bytes))
}

/// Derived key plus the salt and metadata needed to describe it.
#[derive(Clone)]
pub struct KeyMaterial {
    key: DerivedKey,
    salt: [u8; SALT_LENGTH],
    algorithm: KeyAlgorithm,
    kdf: KdfParams,
    created_at: DateTime<Utc>,
}

impl KeyMaterial {
    /// Derive material from a password and an explicit salt.
    pub fn derive(password: &str, salt: [u8; SALT_LENGTH], kdf: KdfParams) -> Result<Self> {
        let key = derive_key(password, &salt, &kdf)?;
        Ok(Self {
            key,
            salt,
            algorithm: KeyAlgorithm::Aes256Gcm,
            kdf,
            created_at: Utc::now(),
        })
    }

    /// Reassemble material read back from storage.
    pub(crate) fn from_parts(
        key: [u8; KEY_LENGTH],
        salt: [u8; SALT_LENGTH],
        algorithm: KeyAlgorithm,
        kdf: KdfParams,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: DerivedKey::from_bytes(key),
            salt,
            algorithm,
            kdf,
            created_at,
        }
    }

    pub fn key(&self) -> &DerivedKey {
        &self.key
    }

    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// First bytes of SHA-256 over the key. Identifies the key without revealing it.
    pub fn fingerprint(&self) -> [u8; FINGERPRINT_LENGTH] {
        let digest = Sha256::digest(self.key.as_bytes());
        let mut out = [0u8; FINGERPRINT_LENGTH];
        out.copy_from_slice(&digest[..FINGERPRINT_LENGTH]);
        out
    }

    /// Fingerprint as lowercase hex, for display.
    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("kdf", &self.kdf)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Fresh random salt from the OS RNG.
pub fn random_salt() -> Result<[u8; SALT_LENGTH]> {
    let mut salt = [0u8; SALT_LENGTH];
    getrandom::getrandom(&mut salt)
        .map_err(|e| CourierError::Crypto(format!("Failed to generate salt: {}", e)))?;
    Ok(salt)
}
