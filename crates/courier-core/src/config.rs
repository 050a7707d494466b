//! Per-job configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};
use crate::schedule::RateSchedule;

const DEFAULT_MIN_DELAY_SECONDS: f64 = 5.0;
const DEFAULT_MAX_DELAY_SECONDS: f64 = 10.0;

/// Settings for a single delivery job. Fixed once the job starts.
///
/// Unknown keys are not an error: they are kept in `extra` and passed through
/// untouched so control planes can attach their own options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_min_delay", alias = "min_delay")]
    pub min_delay_seconds: f64,

    #[serde(default = "default_max_delay", alias = "max_delay")]
    pub max_delay_seconds: f64,

    /// Seal each message in an envelope before sending.
    #[serde(default = "default_true", alias = "enable_e2ee")]
    pub enable_envelope: bool,

    /// Treat missing or unreadable key material as fatal. When false the job
    /// keeps going and every message is sent as a tagged plaintext fallback.
    #[serde(default = "default_true")]
    pub require_key: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_min_delay() -> f64 {
    DEFAULT_MIN_DELAY_SECONDS
}

fn default_max_delay() -> f64 {
    DEFAULT_MAX_DELAY_SECONDS
}

fn default_true() -> bool {
    true
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            min_delay_seconds: DEFAULT_MIN_DELAY_SECONDS,
            max_delay_seconds: DEFAULT_MAX_DELAY_SECONDS,
            enable_envelope: true,
            require_key: true,
            extra: BTreeMap::new(),
        }
    }
}

impl JobConfig {
    /// Config with the given delay bounds and every other field defaulted.
    pub fn with_delays(min_delay_seconds: f64, max_delay_seconds: f64) -> Self {
        Self {
            min_delay_seconds,
            max_delay_seconds,
            ..Self::default()
        }
    }

    pub fn envelope(mut self, enabled: bool) -> Self {
        self.enable_envelope = enabled;
        self
    }

    pub fn require_key(mut self, required: bool) -> Self {
        self.require_key = required;
        self
    }

    /// Check `0 <= min <= max` with finite values.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = (self.min_delay_seconds, self.max_delay_seconds);
        if !min.is_finite() || !max.is_finite() {
            return Err(CourierError::Config("delays must be finite numbers".into()));
        }
        if min < 0.0 {
            return Err(CourierError::Config(format!(
                "min_delay_seconds must be >= 0 (got {})",
                min
            )));
        }
        if max < min {
            return Err(CourierError::Config(format!(
                "max_delay_seconds ({}) must be >= min_delay_seconds ({})",
                max, min
            )));
        }
        Ok(())
    }

    pub fn schedule(&self) -> RateSchedule {
        RateSchedule::new(self.min_delay_seconds, self.max_delay_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JobConfig::default();
        assert_eq!(config.min_delay_seconds, 5.0);
        assert_eq!(config.max_delay_seconds, 10.0);
        assert!(config.enable_envelope);
        assert!(config.require_key);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let config: JobConfig = serde_json::from_value(serde_json::json!({
            "min_delay": 1,
            "max_delay": 2,
            "enable_e2ee": false,
            "enable_secret": true,
            "encryption_method": "aes"
        }))
        .unwrap();

        assert_eq!(config.min_delay_seconds, 1.0);
        assert_eq!(config.max_delay_seconds, 2.0);
        assert!(!config.enable_envelope);
        assert_eq!(config.extra["enable_secret"], serde_json::json!(true));
        assert_eq!(config.extra["encryption_method"], serde_json::json!("aes"));
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: JobConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, JobConfig::default());
    }

    #[test]
    fn test_max_below_min_rejected() {
        let err = JobConfig::with_delays(3.0, 1.0).validate().unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));
    }

    #[test]
    fn test_negative_min_rejected() {
        assert!(JobConfig::with_delays(-1.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_equal_bounds_allowed() {
        assert!(JobConfig::with_delays(0.0, 0.0).validate().is_ok());
    }
}
