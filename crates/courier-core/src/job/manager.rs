//! Registry of jobs owned by one process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use super::engine::{JobDeps, JobEngine, JobHandle};
use super::status::{JobId, JobState, JobStatus};
use crate::config::JobConfig;
use crate::error::{CourierError, Result};

struct JobRecord {
    handle: JobHandle,
    config: JobConfig,
    started_at: DateTime<Utc>,
    task: JoinHandle<JobStatus>,
}

impl JobRecord {
    /// Snapshot, reporting an engine task that died without finishing as an error.
    fn status(&self) -> JobStatus {
        let mut status = self.handle.status();
        if self.task.is_finished() && !status.state.is_terminal() {
            status.state = JobState::Error;
            status.progress = "Error: job task ended unexpectedly".to_string();
        }
        status
    }
}

/// Starts jobs, hands out ids and answers status queries.
///
/// Jobs never see each other; a failing job does not affect its neighbours.
/// Records are kept for the life of the manager.
pub struct JobManager {
    deps: Arc<JobDeps>,
    next_id: AtomicU64,
    jobs: RwLock<BTreeMap<JobId, JobRecord>>,
}

impl JobManager {
    pub fn new(deps: JobDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            next_id: AtomicU64::new(0),
            jobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Start a job on its own task and return its id immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, config: JobConfig) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let engine = JobEngine::new(id, config.clone(), Arc::clone(&self.deps));
        let handle = engine.handle();
        let task = tokio::spawn(engine.run());

        let record = JobRecord {
            handle,
            config,
            started_at: Utc::now(),
            task,
        };
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, record);

        tracing::info!(job_id = %id, "job started");
        id
    }

    /// Current status of job `id`.
    ///
    /// # Errors
    ///
    /// Returns `CourierError::JobNotFound` if the id was never issued.
    pub fn status(&self, id: JobId) -> Result<JobStatus> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id)
            .map(JobRecord::status)
            .ok_or(CourierError::JobNotFound(id))
    }

    /// Request a stop. Returns `false` for an unknown id.
    ///
    /// Stopping a finished job is a no-op that still returns `true`.
    pub fn stop(&self, id: JobId) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        match jobs.get(&id) {
            Some(record) => {
                record.handle.stop();
                tracing::info!(job_id = %id, "stop requested");
                true
            }
            None => false,
        }
    }

    /// Request a stop on every job that has not finished. Returns how many were signalled.
    pub fn stop_all(&self) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut signalled = 0;
        for record in jobs.values() {
            if !record.status().state.is_terminal() {
                record.handle.stop();
                signalled += 1;
            }
        }
        if signalled > 0 {
            tracing::info!(jobs = signalled, "stop requested for all jobs");
        }
        signalled
    }

    /// Status of every job, ordered by id.
    pub fn list(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.values().map(JobRecord::status).collect()
    }

    /// Number of jobs not yet in a terminal state.
    pub fn active_count(&self) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.values()
            .filter(|record| !record.status().state.is_terminal())
            .count()
    }

    /// Configuration job `id` was started with.
    pub fn config(&self, id: JobId) -> Result<JobConfig> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id)
            .map(|record| record.config.clone())
            .ok_or(CourierError::JobNotFound(id))
    }

    /// When the manager accepted job `id`.
    pub fn started_at(&self, id: JobId) -> Result<DateTime<Utc>> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id)
            .map(|record| record.started_at)
            .ok_or(CourierError::JobNotFound(id))
    }

    /// Wait for job `id` to reach a terminal state.
    pub async fn wait(&self, id: JobId) -> Result<JobStatus> {
        let handle = {
            let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            jobs.get(&id)
                .map(|record| record.handle.clone())
                .ok_or(CourierError::JobNotFound(id))?
        };
        let last = handle.wait().await;
        if last.state.is_terminal() {
            return Ok(last);
        }
        // The engine dropped its status sender without finishing; the task
        // may still be unwinding.
        loop {
            let status = self.status(id)?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            tokio::task::yield_now().await;
        }
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("JobManager")
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .field("jobs", &jobs.len())
            .finish()
    }
}
