//! Dry-run dispatcher that reports deliveries through the log.

use async_trait::async_trait;

use super::{Dispatcher, DispatcherFactory};
use crate::error::{CourierError, Result};
use crate::source::Credentials;

/// Logs every delivery instead of performing it.
///
/// Authentication succeeds for any non-empty session, so a dry run still
/// exercises the same setup checks as a real transport.
#[derive(Debug, Default)]
pub struct ConsoleDispatcher {
    authenticated: bool,
    current_target: Option<String>,
    delivered: u64,
}

impl ConsoleDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[async_trait]
impl Dispatcher for ConsoleDispatcher {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<bool> {
        if credentials.is_empty() {
            return Err(CourierError::Auth("session is empty".into()));
        }
        self.authenticated = true;
        tracing::debug!(entries = credentials.entry_count(), "console session opened");
        Ok(true)
    }

    async fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn navigate_to_target(&mut self, target_id: &str) -> Result<()> {
        if !self.authenticated {
            return Err(CourierError::Dispatch("not authenticated".into()));
        }
        self.current_target = Some(target_id.to_string());
        Ok(())
    }

    async fn submit_text(&mut self, text: &str) -> Result<bool> {
        let Some(target) = self.current_target.as_deref() else {
            return Err(CourierError::Dispatch("no conversation open".into()));
        };
        self.delivered += 1;
        tracing::info!(target_id = target, chars = text.chars().count(), text, "delivered");
        Ok(true)
    }

    async fn close(&mut self) {
        if self.authenticated {
            tracing::debug!(delivered = self.delivered, "console session closed");
        }
        self.authenticated = false;
        self.current_target = None;
    }
}

/// Hands out a new [`ConsoleDispatcher`] per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDispatcherFactory;

impl DispatcherFactory for ConsoleDispatcherFactory {
    fn create(&self) -> Result<Box<dyn Dispatcher>> {
        Ok(Box::new(ConsoleDispatcher::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_session_rejected() {
        let mut dispatcher = ConsoleDispatcher::new();
        let result = dispatcher.authenticate(&Credentials::default()).await;
        assert!(matches!(result, Err(CourierError::Auth(_))));
        assert!(!dispatcher.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_delivers_after_navigation() {
        let mut dispatcher = ConsoleDispatcher::new();
        let creds = Credentials::new(serde_json::json!([{"name": "c_user"}]));
        assert!(dispatcher.authenticate(&creds).await.unwrap());

        assert!(dispatcher.submit_text("too early").await.is_err());
        dispatcher.navigate_to_target("42").await.unwrap();
        assert!(dispatcher.submit_text("hello").await.unwrap());
        assert_eq!(dispatcher.delivered(), 1);

        dispatcher.close().await;
        assert!(!dispatcher.is_authenticated().await);
    }
}
