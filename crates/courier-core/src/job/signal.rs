//! Cooperative stop flag shared between a job and its controllers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Stop request for one job.
///
/// Setting it never blocks and never interrupts a call in flight; the job
/// notices at its next check point. Waits made through [`StopSignal::sleep`]
/// end early so a stopped job does not sit out its remaining delay.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless a stop is requested first.
    ///
    /// Returns `true` if the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_stopped();
        }

        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a stop between the two is not lost.
        notified.as_mut().enable();
        if self.is_stopped() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = notified => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_stop_is_idempotent() {
        let signal = StopSignal::new();
        assert!(!signal.is_stopped());
        signal.stop();
        signal.stop();
        assert!(signal.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_runs_full_duration() {
        let signal = StopSignal::new();
        let before = tokio::time::Instant::now();
        assert!(signal.sleep(Duration::from_secs(30)).await);
        assert!(before.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cuts_sleep_short() {
        let signal = Arc::new(StopSignal::new());
        let sleeper = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.sleep(Duration::from_secs(3600)).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let before = tokio::time::Instant::now();
        signal.stop();

        assert!(!sleeper.await.unwrap());
        assert!(before.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_sleep_after_stop_returns_immediately() {
        let signal = StopSignal::new();
        signal.stop();
        assert!(!signal.sleep(Duration::from_secs(3600)).await);
    }
}
