//! Close Tracking
//!
//! Readers must not start consuming a partition before its writer has
//! finished, and the server pushes no notification to remote readers. The
//! tracker offers a bounded wait instead: waiters are woken whenever a
//! partition closes and additionally re-poll at a fixed interval, so a missed
//! wakeup can only delay a waiter by one interval, never strand it.
//!
//! The closed flags themselves live on the partition buffers; the tracker
//! owns only the wakeup primitive and evaluates the caller's predicate. A
//! timed-out wait returns `false` as a normal value the caller retries on.

use std::time::Duration;

use tokio::sync::Notify;

/// Re-poll interval for waiters, bounding the cost of a lost wakeup.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
pub struct CloseTracker {
    notify: Notify,
}

impl CloseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes all current waiters. Called after partitions are marked closed.
    pub fn notify_closed(&self) {
        self.notify.notify_waiters();
    }

    /// Suspends until `is_closed` returns true or `timeout` elapses.
    ///
    /// Holds no locks while suspended; `is_closed` is re-evaluated after every
    /// wakeup and at least every `POLL_INTERVAL`.
    pub async fn wait_until<F>(&self, timeout: Duration, is_closed: F) -> bool
    where
        F: Fn() -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking, so a close that lands between
            // the check and the await still wakes us.
            let notified = self.notify.notified();

            if is_closed() {
                return true;
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return false;
            }

            let step = POLL_INTERVAL.min(deadline - now);
            let _ = tokio::time::timeout(step, notified).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_closed() {
        let tracker = CloseTracker::new();
        assert!(tracker.wait_until(Duration::from_secs(5), || true).await);
    }

    #[tokio::test]
    async fn test_wait_times_out_when_never_closed() {
        let tracker = CloseTracker::new();
        let start = std::time::Instant::now();
        let closed = tracker.wait_until(Duration::from_millis(120), || false).await;
        assert!(!closed);
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_notify() {
        let tracker = Arc::new(CloseTracker::new());
        let flag = Arc::new(AtomicBool::new(false));

        let tracker_clone = tracker.clone();
        let flag_clone = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag_clone.store(true, Ordering::SeqCst);
            tracker_clone.notify_closed();
        });

        let closed = tracker
            .wait_until(Duration::from_secs(5), || flag.load(Ordering::SeqCst))
            .await;
        assert!(closed);
    }
}
