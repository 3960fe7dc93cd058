// src/acquisition/barrier.rs
//! One-shot readiness signal between the live view and the stimulus

use crate::config::constants::timing::CANCEL_POLL_INTERVAL_MS;
use crate::utils::Deadline;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opens once and stays open
#[derive(Clone, Default)]
pub struct ReadyBarrier {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ReadyBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the barrier and wake every waiter; later calls do nothing
    pub fn open(&self) {
        let (opened, cvar) = &*self.inner;
        let mut opened = opened.lock();
        if !*opened {
            *opened = true;
            cvar.notify_all();
        }
    }

    pub fn is_open(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Wait for the barrier to open.
    ///
    /// Returns `false` if the deadline expires or is cancelled first.
    pub fn wait(&self, deadline: &Deadline) -> bool {
        let poll = Duration::from_millis(CANCEL_POLL_INTERVAL_MS);
        let (opened, cvar) = &*self.inner;
        let mut opened = opened.lock();
        loop {
            if *opened {
                return true;
            }
            if deadline.is_expired() {
                return false;
            }
            let wake_at = (Instant::now() + poll).min(deadline.expires_at());
            cvar.wait_until(&mut opened, wake_at);
        }
    }
}
