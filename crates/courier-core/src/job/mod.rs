//! Delivery jobs and the registry that runs them.
//!
//! Each job walks every target and, for each target, every message, with a
//! delay between sends. A job runs on its own Tokio task and is the sole
//! writer of its status; the [`JobManager`] and any other reader only ever
//! see snapshots.
//!
//! Stopping is cooperative. A stop request is seen before the next message,
//! before the next target, and during any delay. A send already in flight
//! always runs to completion.

mod engine;
mod manager;
mod signal;
mod status;

pub use engine::{JobDeps, JobEngine, JobHandle};
pub use manager::JobManager;
pub use signal::StopSignal;
pub use status::{EncryptionStatus, JobId, JobState, JobStatus};
