//! Error types for Courier core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages and exit codes.

use thiserror::Error;

use crate::job::JobId;

/// Result type alias for Courier operations.
pub type Result<T> = std::result::Result<T, CourierError>;

/// Core error type for Courier operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Key material could not be written to durable storage
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No key material has been persisted yet
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persisted key material exists but cannot be parsed
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// Envelope was tampered with or is malformed
    #[error("Envelope integrity check failed: {0}")]
    Integrity(String),

    /// Envelope was sealed under a different key
    #[error("Envelope was sealed with a different key")]
    KeyMismatch,

    /// Dispatcher session could not be authenticated
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A single delivery attempt failed
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Job inputs or configuration are unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Key derivation or cipher setup failure
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Job id unknown to the manager
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Generic error (fallback)
    #[error("{0}")]
    Other(String),
}

impl CourierError {
    /// Whether this error means "nothing there" rather than "something broken".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::JobNotFound(_))
    }
}
