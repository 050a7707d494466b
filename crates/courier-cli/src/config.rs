use std::path::{Path, PathBuf};

use courier_core::crypto::KdfParams;
use courier_core::JobConfig;
use serde::{Deserialize, Serialize};

/// Env var holding the key password unless the config names another.
pub const DEFAULT_PASSWORD_ENV: &str = "COURIER_KEY_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierConfig {
    pub paths: PathsSection,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub keys: KeysSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    pub data_dir: String,
    pub key_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysSection {
    pub kdf: KdfName,
    /// Omitted means the KDF's default cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    pub password_env: String,
}

impl Default for KeysSection {
    fn default() -> Self {
        Self {
            kdf: KdfName::Pbkdf2Sha256,
            iterations: None,
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KdfName {
    Pbkdf2Sha256,
    Argon2id,
}

impl KeysSection {
    /// KDF parameters for new key material.
    pub fn kdf_params(&self) -> anyhow::Result<KdfParams> {
        let params = match self.kdf {
            KdfName::Pbkdf2Sha256 => match self.iterations {
                Some(iterations) => KdfParams::Pbkdf2Sha256 { iterations },
                None => KdfParams::default(),
            },
            KdfName::Argon2id => match (KdfParams::argon2id(), self.iterations) {
                (
                    KdfParams::Argon2id {
                        memory_kib,
                        parallelism,
                        ..
                    },
                    Some(iterations),
                ) => KdfParams::Argon2id {
                    memory_kib,
                    iterations,
                    parallelism,
                },
                (defaults, _) => defaults,
            },
        };
        params
            .validate()
            .map_err(|e| anyhow::anyhow!("Config error in [keys]: {}", e))?;
        Ok(params)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CourierConfig {
    pub fn new(data_dir: PathBuf, key_file: PathBuf) -> Self {
        Self {
            paths: PathsSection {
                data_dir: data_dir.to_string_lossy().to_string(),
                key_file: key_file.to_string_lossy().to_string(),
            },
            job: JobConfig::default(),
            keys: KeysSection::default(),
            logging: LoggingSection::default(),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.data_dir)
    }

    pub fn key_file(&self) -> PathBuf {
        PathBuf::from(&self.paths.key_file)
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    xdg_data_dir()
}

pub fn default_key_file() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("keys.json"))
}

pub fn read_config(path: &Path) -> anyhow::Result<CourierConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &CourierConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("courier"));
        }
    }
    Ok(home_dir()?.join(".config").join("courier"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("courier"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("courier"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: CourierConfig = toml::from_str(
            "[paths]\ndata_dir = \"/tmp/courier\"\nkey_file = \"/tmp/courier/keys.json\"\n",
        )
        .unwrap();
        assert_eq!(config.job, JobConfig::default());
        assert_eq!(config.keys.kdf, KdfName::Pbkdf2Sha256);
        assert_eq!(config.keys.password_env, DEFAULT_PASSWORD_ENV);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_job_section_accepts_short_names() {
        let config: CourierConfig = toml::from_str(
            "[paths]\ndata_dir = \"d\"\nkey_file = \"k\"\n\n[job]\nmin_delay = 1.5\nmax_delay = 3.0\nenable_e2ee = false\n",
        )
        .unwrap();
        assert_eq!(config.job.min_delay_seconds, 1.5);
        assert_eq!(config.job.max_delay_seconds, 3.0);
        assert!(!config.job.enable_envelope);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = CourierConfig::new(PathBuf::from("/data"), PathBuf::from("/keys.json"));
        let text = toml::to_string_pretty(&config).unwrap();
        let back: CourierConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.paths.data_dir, "/data");
        assert_eq!(back.job, config.job);
    }

    #[test]
    fn test_kdf_params_from_keys_section() {
        let keys = KeysSection::default();
        assert_eq!(keys.kdf_params().unwrap(), KdfParams::default());

        let argon = KeysSection {
            kdf: KdfName::Argon2id,
            iterations: Some(4),
            ..KeysSection::default()
        };
        assert!(matches!(
            argon.kdf_params().unwrap(),
            KdfParams::Argon2id { iterations: 4, .. }
        ));
    }

    #[test]
    fn test_weak_pbkdf2_rejected() {
        let keys = KeysSection {
            iterations: Some(1_000),
            ..KeysSection::default()
        };
        assert!(keys.kdf_params().is_err());
    }
}
