//! The per-job state machine.
//!
//! A [`JobEngine`] runs one pass over `targets x messages` on its own task.
//! It is the only writer of its [`JobStatus`]; everyone else observes it
//! through a [`JobHandle`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;

use super::signal::StopSignal;
use super::status::{EncryptionStatus, JobId, JobState, JobStatus};
use crate::config::JobConfig;
use crate::crypto::{KeyMaterial, KeyStore, OutgoingText};
use crate::dispatch::{Dispatcher, DispatcherFactory};
use crate::error::{CourierError, Result};
use crate::source::{JobSource, Target};

/// Collaborators shared by every job of a manager.
pub struct JobDeps {
    pub key_store: Arc<dyn KeyStore>,
    pub dispatchers: Arc<dyn DispatcherFactory>,
    pub source: Arc<dyn JobSource>,
    /// Password used when a job has to derive key material.
    pub key_password: SecretString,
}

impl JobDeps {
    pub fn new(
        key_store: Arc<dyn KeyStore>,
        dispatchers: Arc<dyn DispatcherFactory>,
        source: Arc<dyn JobSource>,
        key_password: impl Into<String>,
    ) -> Self {
        Self {
            key_store,
            dispatchers,
            source,
            key_password: SecretString::from(key_password.into()),
        }
    }
}

/// How a job that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Stopped,
}

/// Read-only view of a running job plus its stop control.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    stop: Arc<StopSignal>,
    status: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Ask the job to stop at its next check point. Never blocks.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Current status with running time computed now.
    pub fn status(&self) -> JobStatus {
        self.status.borrow().snapshot()
    }

    /// Wait until the job reaches a terminal state and return that status.
    ///
    /// If the engine goes away without finishing, the last published status is returned.
    pub async fn wait(&self) -> JobStatus {
        let mut status = self.status.clone();
        let _ = status.wait_for(|s| s.state.is_terminal()).await;
        let last = status.borrow().snapshot();
        last
    }
}

/// One delivery job.
pub struct JobEngine {
    id: JobId,
    config: JobConfig,
    deps: Arc<JobDeps>,
    stop: Arc<StopSignal>,
    status: watch::Sender<JobStatus>,
}

impl JobEngine {
    pub fn new(id: JobId, config: JobConfig, deps: Arc<JobDeps>) -> Self {
        let (status, _) = watch::channel(JobStatus::new(id));
        Self {
            id,
            config,
            deps,
            stop: Arc::new(StopSignal::new()),
            status,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            stop: Arc::clone(&self.stop),
            status: self.status.subscribe(),
        }
    }

    /// Run the job to a terminal state and return the final status.
    ///
    /// The dispatcher, once created, is closed on every exit path, including
    /// a panic inside the job or the dispatcher.
    pub async fn run(self) -> JobStatus {
        let envelope = if self.config.enable_envelope {
            EncryptionStatus::NotInitialized
        } else {
            EncryptionStatus::Disabled
        };
        self.update(|s| {
            s.state = JobState::Starting;
            s.started_at = Some(Utc::now());
            s.encryption = envelope;
            s.progress = "Starting...".to_string();
        });
        tracing::info!(job_id = %self.id, envelope = self.config.enable_envelope, "job starting");

        let mut session: Option<Box<dyn Dispatcher>> = None;
        let outcome = AssertUnwindSafe(self.drive(&mut session))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(CourierError::Other(panic_message(panic.as_ref()))));
        if let Some(mut dispatcher) = session.take() {
            dispatcher.close().await;
        }

        self.finish(outcome)
    }

    async fn drive(&self, session: &mut Option<Box<dyn Dispatcher>>) -> Result<Outcome> {
        self.config.validate()?;

        let key = if self.config.enable_envelope {
            self.prepare_key().await?
        } else {
            None
        };

        self.set_progress("Opening dispatch session...");
        let credentials = self.deps.source.load_credentials()?;
        let dispatcher = session.insert(self.deps.dispatchers.create()?);
        match dispatcher.authenticate(&credentials).await {
            Ok(true) => {}
            Ok(false) => return Err(CourierError::Auth("session was rejected".into())),
            Err(CourierError::Auth(reason)) => return Err(CourierError::Auth(reason)),
            Err(err) => return Err(CourierError::Auth(err.to_string())),
        }

        self.set_progress("Loading targets and messages...");
        let targets = self.deps.source.load_targets()?;
        let messages = self.deps.source.load_messages()?;
        if targets.is_empty() {
            return Err(CourierError::Config("No targets found".into()));
        }
        if messages.is_empty() {
            return Err(CourierError::Config("No messages found".into()));
        }

        self.update(|s| {
            s.state = JobState::Running;
            s.total_targets = targets.len() as u64;
            s.total_messages = messages.len() as u64;
        });
        tracing::info!(
            job_id = %self.id,
            targets = targets.len(),
            messages = messages.len(),
            "job running"
        );

        Ok(self
            .deliver(dispatcher.as_mut(), &targets, &messages, key.as_deref())
            .await)
    }

    /// Load the stored key, deriving one on first use.
    ///
    /// With `require_key` off, failures are recorded and the job continues
    /// without a key, so every message goes out as a fallback.
    async fn prepare_key(&self) -> Result<Option<Arc<KeyMaterial>>> {
        self.set_progress("Preparing envelope key...");
        let deps = Arc::clone(&self.deps);
        let loaded = tokio::task::spawn_blocking(move || match deps.key_store.load() {
            Err(err) if err.is_not_found() => deps
                .key_store
                .derive(deps.key_password.expose_secret()),
            other => other,
        })
        .await
        .map_err(|e| CourierError::Other(format!("key preparation task failed: {}", e)))?;

        match loaded {
            Ok(key) => {
                self.update(|s| s.encryption = EncryptionStatus::Ready);
                tracing::debug!(job_id = %self.id, fingerprint = %key.fingerprint_hex(), "envelope key ready");
                Ok(Some(key))
            }
            Err(err) if !self.config.require_key => {
                tracing::warn!(job_id = %self.id, error = %err, "no envelope key, sending fallback text");
                self.update(|s| s.encryption = EncryptionStatus::Error);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn deliver(
        &self,
        dispatcher: &mut dyn Dispatcher,
        targets: &[Target],
        messages: &[String],
        key: Option<&KeyMaterial>,
    ) -> Outcome {
        let schedule = self.config.schedule();
        let total_targets = targets.len();

        'targets: for (target_index, target) in targets.iter().enumerate() {
            if self.stop.is_stopped() {
                break;
            }
            self.update(|s| {
                s.current_target_id = Some(target.target_id.clone());
                s.progress = format!(
                    "Processing {} ({}/{})",
                    target.display_name,
                    target_index + 1,
                    total_targets
                );
            });
            tracing::info!(
                job_id = %self.id,
                target_id = %target.target_id,
                name = %target.display_name,
                "processing target"
            );

            for (message_index, message) in messages.iter().enumerate() {
                if self.stop.is_stopped() {
                    break 'targets;
                }
                self.set_progress(&format!(
                    "Sending message {}/{} to {}",
                    message_index + 1,
                    messages.len(),
                    target.display_name
                ));

                let text = self.outgoing_text(message, key);
                match send_one(dispatcher, &target.target_id, &text).await {
                    Ok(()) => {
                        self.update(|s| {
                            s.messages_sent += 1;
                            s.progress = format!(
                                "Sent {}/{} to {}",
                                message_index + 1,
                                messages.len(),
                                target.display_name
                            );
                        });
                        tracing::info!(job_id = %self.id, target_id = %target.target_id, "message sent");
                    }
                    Err(err) => {
                        self.update(|s| s.failed_sends += 1);
                        tracing::warn!(
                            job_id = %self.id,
                            target_id = %target.target_id,
                            error = %err,
                            "message not sent"
                        );
                    }
                }

                if message_index + 1 < messages.len() {
                    let delay = schedule.between_messages(target_index, total_targets);
                    if !self.stop.sleep(delay).await {
                        break 'targets;
                    }
                }
            }

            if target_index + 1 < total_targets && !self.stop.is_stopped() {
                self.stop.sleep(schedule.between_targets()).await;
            }
        }

        if self.stop.is_stopped() {
            Outcome::Stopped
        } else {
            Outcome::Completed
        }
    }

    fn outgoing_text(&self, message: &str, key: Option<&KeyMaterial>) -> String {
        if !self.config.enable_envelope {
            return OutgoingText::Plain(message.to_string()).render();
        }
        let (text, err) = OutgoingText::build(message, key);
        match err {
            None => self.update(|s| s.encryption = EncryptionStatus::Active),
            Some(err) => {
                tracing::warn!(job_id = %self.id, error = %err, "sealing failed, sending fallback text");
                self.update(|s| s.encryption = EncryptionStatus::Error);
            }
        }
        text.render()
    }

    fn finish(&self, outcome: Result<Outcome>) -> JobStatus {
        let finished_at = Utc::now();
        self.update(|s| {
            s.finished_at = Some(finished_at);
            match &outcome {
                Ok(Outcome::Completed) => {
                    s.state = JobState::Completed;
                    s.progress = format!(
                        "Completed! Sent {} messages to {} targets",
                        s.messages_sent, s.total_targets
                    );
                }
                Ok(Outcome::Stopped) => {
                    s.state = JobState::Stopped;
                    s.progress = format!("Stopped by user after {} messages", s.messages_sent);
                }
                Err(err) => {
                    s.state = JobState::Error;
                    s.progress = format!("Error: {}", err);
                }
            }
        });

        let last = self.status.borrow().snapshot();
        match &outcome {
            Ok(_) => tracing::info!(
                job_id = %self.id,
                state = %last.state,
                sent = last.messages_sent,
                failed = last.failed_sends,
                "job finished"
            ),
            Err(err) => tracing::error!(job_id = %self.id, error = %err, "job failed"),
        }
        last
    }

    fn update(&self, modify: impl FnOnce(&mut JobStatus)) {
        self.status.send_modify(modify);
    }

    fn set_progress(&self, progress: &str) {
        self.update(|s| s.progress = progress.to_string());
    }
}

/// One delivery attempt: open the conversation, then submit. No retry.
async fn send_one(dispatcher: &mut dyn Dispatcher, target_id: &str, text: &str) -> Result<()> {
    dispatcher.navigate_to_target(target_id).await?;
    if dispatcher.submit_text(text).await? {
        Ok(())
    } else {
        Err(CourierError::Dispatch("submit was not accepted".into()))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("job panicked: {}", detail)
}
