//! Job identity and status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier handed out by the manager. Strictly increasing per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a job.
///
/// `Idle -> Starting -> Running -> {Completed | Stopped | Error}`. The last
/// three are terminal. A job can also go straight from `Starting` to `Error`
/// or `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Starting,
    Running,
    Completed,
    Stopped,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope state as seen by the last send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStatus {
    /// Envelope disabled for this job.
    Disabled,
    NotInitialized,
    /// Key material loaded, nothing sealed yet.
    Ready,
    /// Last message went out sealed.
    Active,
    /// Last message went out as a plaintext fallback, or no key is available.
    Error,
}

/// Point-in-time view of a job. Cheap to clone; never mutated by readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: String,
    pub current_target_id: Option<String>,
    pub messages_sent: u64,
    pub failed_sends: u64,
    pub total_targets: u64,
    pub total_messages: u64,
    pub encryption: EncryptionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Derived when the snapshot is taken; not stored by the engine.
    pub running_time_seconds: Option<f64>,
}

impl JobStatus {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            state: JobState::Idle,
            progress: String::new(),
            current_target_id: None,
            messages_sent: 0,
            failed_sends: 0,
            total_targets: 0,
            total_messages: 0,
            encryption: EncryptionStatus::NotInitialized,
            started_at: None,
            finished_at: None,
            running_time_seconds: None,
        }
    }

    /// Copy with `running_time_seconds` filled in relative to `now`.
    ///
    /// Terminal jobs report the time between start and finish.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Self {
        let mut snapshot = self.clone();
        snapshot.running_time_seconds = self.started_at.map(|started| {
            let end = self.finished_at.unwrap_or(now);
            (end - started).num_milliseconds().max(0) as f64 / 1000.0
        });
        snapshot
    }

    pub fn snapshot(&self) -> Self {
        self.snapshot_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Idle.is_terminal());
        assert!(!JobState::Starting.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Stopped.is_terminal());
        assert!(JobState::Error.is_terminal());
    }

    #[test]
    fn test_running_time_absent_before_start() {
        let status = JobStatus::new(JobId(0));
        assert_eq!(status.snapshot().running_time_seconds, None);
    }

    #[test]
    fn test_running_time_from_start() {
        let now = Utc::now();
        let mut status = JobStatus::new(JobId(1));
        status.started_at = Some(now - Duration::seconds(90));

        let snapshot = status.snapshot_at(now);
        assert_eq!(snapshot.running_time_seconds, Some(90.0));
    }

    #[test]
    fn test_running_time_frozen_when_finished() {
        let now = Utc::now();
        let mut status = JobStatus::new(JobId(1));
        status.started_at = Some(now - Duration::seconds(100));
        status.finished_at = Some(now - Duration::seconds(40));

        let snapshot = status.snapshot_at(now);
        assert_eq!(snapshot.running_time_seconds, Some(60.0));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(JobStatus::new(JobId(7))).unwrap();
        assert_eq!(json["job_id"], 7);
        assert_eq!(json["state"], "idle");
        assert_eq!(json["encryption"], "not_initialized");
    }
}
