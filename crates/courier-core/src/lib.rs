//! # Courier Core
//!
//! Core library for Courier - rate-limited bulk message delivery with
//! envelope encryption and concurrently managed jobs.
//!
//! This crate provides the job orchestration logic, key handling and data
//! models independent of the CLI and of any concrete delivery transport.
//!
//! ## Architecture
//!
//! - **crypto**: Key derivation, key stores and envelope sealing
//! - **schedule**: Inter-message and inter-target delay computation
//! - **source**: Targets, messages and credentials for a job
//! - **dispatch**: The delivery capability a job drives
//! - **job**: Per-job state machine and the job manager registry

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod fs;
pub mod job;
pub mod schedule;
pub mod source;

pub use config::JobConfig;
pub use error::{CourierError, Result};
pub use job::{JobDeps, JobEngine, JobId, JobManager, JobState, JobStatus};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
