//! The delivery capability a job drives.
//!
//! A [`Dispatcher`] is whatever actually reaches the remote platform: a
//! scripted browser, a native API client, or the console dry run shipped
//! here. Jobs treat every call as one atomic, non-interruptible unit; there
//! are no retries and no timeouts beyond what an implementation imposes.
//!
//! Each job gets its own dispatcher from a [`DispatcherFactory`] and always
//! calls [`Dispatcher::close`] on the way out, whatever the outcome.

mod console;

use async_trait::async_trait;

use crate::error::Result;
use crate::source::Credentials;

pub use console::{ConsoleDispatcher, ConsoleDispatcherFactory};

/// One authenticated session against the remote platform.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Establish the session. `Ok(false)` and `Err` both mean the job cannot run.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<bool>;

    async fn is_authenticated(&self) -> bool;

    /// Open the conversation with `target_id`.
    async fn navigate_to_target(&mut self, target_id: &str) -> Result<()>;

    /// Type and send `text` in the current conversation.
    ///
    /// `Ok(false)` and `Err` both count as a failed send.
    async fn submit_text(&mut self, text: &str) -> Result<bool>;

    /// Release the session. Must tolerate being called after failures.
    async fn close(&mut self);
}

/// Produces a fresh dispatcher per job.
pub trait DispatcherFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Dispatcher>>;
}
