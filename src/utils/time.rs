// src/utils/time.rs
//! Shared wall-clock deadline for session workers
//!
//! Every worker of a recording session holds a clone of the same [`Deadline`].
//! The deadline expires either when its wall-clock budget runs out or when any
//! holder cancels it, so all workers observe the same stop condition.

use crate::config::constants::timing::CANCEL_POLL_INTERVAL_MS;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct DeadlineInner {
    started_at: Instant,
    expires_at: Instant,
    cancelled: AtomicBool,
}

/// Cloneable deadline plus broadcast cancel flag
#[derive(Debug, Clone)]
pub struct Deadline {
    inner: Arc<DeadlineInner>,
}

impl Deadline {
    /// Start a deadline that expires `budget` from now
    pub fn after(budget: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            inner: Arc::new(DeadlineInner {
                started_at,
                expires_at: started_at + budget,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Instant the deadline was created
    pub fn started_at(&self) -> Instant {
        self.inner.started_at
    }

    /// Instant the wall-clock budget runs out
    pub fn expires_at(&self) -> Instant {
        self.inner.expires_at
    }

    /// Time since the deadline was created
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Time left before expiry; zero once expired or cancelled
    pub fn remaining(&self) -> Duration {
        if self.is_cancelled() {
            return Duration::ZERO;
        }
        self.inner.expires_at.saturating_duration_since(Instant::now())
    }

    /// Broadcast a stop to every holder
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Whether some holder called [`Deadline::cancel`]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Whether workers should stop
    pub fn is_expired(&self) -> bool {
        self.is_cancelled() || Instant::now() >= self.inner.expires_at
    }

    /// Sleep for `duration`, waking early on expiry or cancellation.
    ///
    /// Returns `true` when the full duration elapsed with the deadline still live.
    pub fn sleep(&self, duration: Duration) -> bool {
        let wake_at = Instant::now() + duration;
        let slice = Duration::from_millis(CANCEL_POLL_INTERVAL_MS);

        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= wake_at {
                return now < self.inner.expires_at;
            }
            if now >= self.inner.expires_at {
                return false;
            }
            let until = wake_at.min(self.inner.expires_at);
            std::thread::sleep(until.saturating_duration_since(now).min(slice));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_budget() {
        let deadline = Deadline::after(Duration::from_millis(30));
        assert!(!deadline.is_expired());
        std::thread::sleep(Duration::from_millis(40));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let deadline = Deadline::after(Duration::from_secs(60));
        let other = deadline.clone();
        other.cancel();
        assert!(deadline.is_expired());
        assert!(deadline.is_cancelled());
    }

    #[test]
    fn test_sleep_wakes_on_cancel() {
        let deadline = Deadline::after(Duration::from_secs(60));
        let canceller = deadline.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        let started = Instant::now();
        assert!(!deadline.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn test_sleep_stops_at_expiry() {
        let deadline = Deadline::after(Duration::from_millis(50));
        let started = Instant::now();
        assert!(!deadline.sleep(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_completes_inside_budget() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(deadline.sleep(Duration::from_millis(10)));
    }
}
