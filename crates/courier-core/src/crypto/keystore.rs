//! Key stores: where derived key material lives between runs.
//!
//! There is exactly one current key per store. `derive` replaces it
//! unconditionally; there is no rotation or version history, so envelopes
//! sealed under a replaced key can no longer be opened.
//!
//! Concurrent `derive` calls against the same file race and the last writer
//! wins.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::key::{random_salt, KdfParams, KeyAlgorithm, KeyMaterial, KEY_LENGTH, SALT_LENGTH};
use crate::error::{CourierError, Result};
use crate::fs::write_private_atomic;

/// Current on-disk format version.
const STORED_KEY_VERSION: u32 = 1;

/// Storage for the process-wide key material.
///
/// Implementations are shared between jobs, so they must be `Send + Sync`.
/// Both operations may block (derivation is slow on purpose); async callers
/// should run them on a blocking thread.
pub trait KeyStore: Send + Sync {
    /// Derive fresh material from `password` with a new random salt and persist it.
    ///
    /// # Errors
    ///
    /// Returns `CourierError::Persistence` if the material cannot be stored.
    fn derive(&self, password: &str) -> Result<Arc<KeyMaterial>>;

    /// Load previously persisted material.
    ///
    /// # Errors
    ///
    /// - `CourierError::NotFound` if nothing has been persisted
    /// - `CourierError::CorruptData` if the stored form cannot be parsed
    fn load(&self) -> Result<Arc<KeyMaterial>>;

    /// Whether material has been persisted.
    fn exists(&self) -> bool;
}

/// Serialized form of key material.
///
/// The key itself is stored unencrypted; the file is written with owner-only
/// permissions.
#[derive(Serialize, Deserialize)]
struct StoredKey {
    version: u32,
    algorithm: KeyAlgorithm,
    kdf: KdfParams,
    key: String,
    salt: String,
    created_at: DateTime<Utc>,
}

impl StoredKey {
    fn from_material(material: &KeyMaterial) -> Self {
        Self {
            version: STORED_KEY_VERSION,
            algorithm: material.algorithm(),
            kdf: *material.kdf(),
            key: STANDARD.encode(material.key().as_bytes()),
            salt: STANDARD.encode(material.salt()),
            created_at: material.created_at(),
        }
    }

    fn into_material(self) -> Result<KeyMaterial> {
        if self.version != STORED_KEY_VERSION {
            return Err(CourierError::CorruptData(format!(
                "unsupported key file version: {}",
                self.version
            )));
        }
        let key_bytes = Zeroizing::new(
            STANDARD
                .decode(self.key.as_bytes())
                .map_err(|e| CourierError::CorruptData(format!("invalid key encoding: {}", e)))?,
        );
        let key: [u8; KEY_LENGTH] = key_bytes.as_slice().try_into().map_err(|_| {
            CourierError::CorruptData(format!(
                "key must be {} bytes (got {})",
                KEY_LENGTH,
                key_bytes.len()
            ))
        })?;
        let salt_bytes = STANDARD
            .decode(self.salt.as_bytes())
            .map_err(|e| CourierError::CorruptData(format!("invalid salt encoding: {}", e)))?;
        let salt: [u8; SALT_LENGTH] = salt_bytes.as_slice().try_into().map_err(|_| {
            CourierError::CorruptData(format!(
                "salt must be {} bytes (got {})",
                SALT_LENGTH,
                salt_bytes.len()
            ))
        })?;

        Ok(KeyMaterial::from_parts(
            key,
            salt,
            self.algorithm,
            self.kdf,
            self.created_at,
        ))
    }
}

fn derive_fresh(password: &str, kdf: KdfParams) -> Result<KeyMaterial> {
    let salt = random_salt()?;
    KeyMaterial::derive(password, salt, kdf)
}

/// Key store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
    kdf: KdfParams,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kdf: KdfParams::default(),
        }
    }

    /// Use a different KDF for future `derive` calls.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyStore for FileKeyStore {
    fn derive(&self, password: &str) -> Result<Arc<KeyMaterial>> {
        let material = derive_fresh(password, self.kdf)?;
        let stored = StoredKey::from_material(&material);
        let json = Zeroizing::new(serde_json::to_vec_pretty(&stored)?);

        write_private_atomic(&self.path, &json).map_err(|e| {
            CourierError::Persistence(format!(
                "Failed to write key file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %self.path.display(),
            kdf = self.kdf.name(),
            fingerprint = %material.fingerprint_hex(),
            "derived new key material"
        );
        Ok(Arc::new(material))
    }

    fn load(&self) -> Result<Arc<KeyMaterial>> {
        let contents = match std::fs::read(&self.path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CourierError::NotFound(format!(
                    "no key material at {}",
                    self.path.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let stored: StoredKey = serde_json::from_slice(&contents).map_err(|e| {
            CourierError::CorruptData(format!(
                "cannot parse key file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Arc::new(stored.into_material()?))
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Process-local key store. Nothing survives the process; useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    kdf: KdfParams,
    current: Mutex<Option<Arc<KeyMaterial>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}

impl KeyStore for MemoryKeyStore {
    fn derive(&self, password: &str) -> Result<Arc<KeyMaterial>> {
        let material = Arc::new(derive_fresh(password, self.kdf)?);
        let mut current = self
            .current
            .lock()
            .map_err(|_| CourierError::Persistence("key store lock poisoned".into()))?;
        *current = Some(Arc::clone(&material));
        Ok(material)
    }

    fn load(&self) -> Result<Arc<KeyMaterial>> {
        let current = self
            .current
            .lock()
            .map_err(|_| CourierError::CorruptData("key store lock poisoned".into()))?;
        current
            .clone()
            .ok_or_else(|| CourierError::NotFound("no key material derived yet".into()))
    }

    fn exists(&self) -> bool {
        self.current
            .lock()
            .map(|current| current.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_derive_then_load() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys.json"));
        assert!(!store.exists());

        let derived = store.derive("secret").unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(derived.key().as_bytes(), loaded.key().as_bytes());
        assert_eq!(derived.salt(), loaded.salt());
        assert_eq!(loaded.algorithm(), KeyAlgorithm::Aes256Gcm);
        assert_eq!(loaded.kdf(), &KdfParams::default());
        assert_eq!(
            derived.created_at().timestamp_millis(),
            loaded.created_at().timestamp_millis()
        );
    }

    #[test]
    fn test_derive_overwrites_previous_material() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys.json"));

        let first = store.derive("same-password").unwrap();
        let second = store.derive("same-password").unwrap();

        // New salt every time, so the key changes even for the same password.
        assert_ne!(first.salt(), second.salt());
        assert_ne!(first.key().as_bytes(), second.key().as_bytes());
        assert_eq!(
            store.load().unwrap().key().as_bytes(),
            second.key().as_bytes()
        );
    }

    #[test]
    fn test_derive_matches_pure_derivation_with_stored_salt() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys.json"));
        let material = store.derive("pw").unwrap();

        let again = KeyMaterial::derive("pw", *material.salt(), *material.kdf()).unwrap();
        assert_eq!(material.key().as_bytes(), again.key().as_bytes());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(CourierError::NotFound(_))));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let store = FileKeyStore::new(&path);
        assert!(matches!(store.load(), Err(CourierError::CorruptData(_))));
    }

    #[test]
    fn test_load_truncated_key_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let store = FileKeyStore::new(&path);
        store.derive("pw").unwrap();

        let mut json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        json["key"] = serde_json::Value::String(STANDARD.encode([1u8; 8]));
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, CourierError::CorruptData(_)));
        assert!(err.to_string().contains("key must be 32 bytes"));
    }

    #[test]
    fn test_derive_into_unwritable_path_is_persistence_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let store = FileKeyStore::new(blocker.join("keys.json"));
        assert!(matches!(
            store.derive("pw"),
            Err(CourierError::Persistence(_))
        ));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryKeyStore::new();
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(CourierError::NotFound(_))));

        let derived = store.derive("pw").unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap().fingerprint(), derived.fingerprint());
    }
}
