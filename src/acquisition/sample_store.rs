// src/acquisition/sample_store.rs
//! Append-only three-channel sample store
//!
//! One [`SampleWriter`] appends whole rows; any number of [`SampleReader`]s
//! take snapshot copies. A row lands in all three channel buffers under one
//! write lock and the published length is only bumped afterwards, so readers
//! never see channels of different lengths and never see the length shrink.

use crate::acquisition::sample_log::SampleLog;
use crate::config::constants::acquisition::INITIAL_STORE_CAPACITY;
use crate::config::constants::timing::CANCEL_POLL_INTERVAL_MS;
use crate::hal::{Channel, ChannelSample};
use crate::utils::Deadline;
use parking_lot::{Condvar, Mutex, RwLock};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ordered samples of one channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelBuffer {
    samples: Vec<f64>,
}

impl ChannelBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }
}

struct Shared {
    buffers: RwLock<[ChannelBuffer; 3]>,
    len: AtomicUsize,
    growth: Mutex<()>,
    grown: Condvar,
}

/// Shared store constructor
pub struct SampleStore;

impl SampleStore {
    /// Create a store expecting `capacity` rows
    ///
    /// At most [`INITIAL_STORE_CAPACITY`] rows are reserved up front.
    pub fn new(capacity: usize) -> (SampleWriter, SampleReader) {
        let capacity = capacity.min(INITIAL_STORE_CAPACITY);
        let shared = Arc::new(Shared {
            buffers: RwLock::new([
                ChannelBuffer::with_capacity(capacity),
                ChannelBuffer::with_capacity(capacity),
                ChannelBuffer::with_capacity(capacity),
            ]),
            len: AtomicUsize::new(0),
            growth: Mutex::new(()),
            grown: Condvar::new(),
        });
        (
            SampleWriter {
                shared: Arc::clone(&shared),
            },
            SampleReader { shared },
        )
    }
}

/// Sole writer of a store
pub struct SampleWriter {
    shared: Arc<Shared>,
}

impl SampleWriter {
    /// Append one row to every channel
    pub fn push_row(&mut self, row: ChannelSample) {
        self.push_batch(std::slice::from_ref(&row));
    }

    /// Append rows in order; readers see the whole batch at once
    pub fn push_batch(&mut self, rows: &[ChannelSample]) {
        if rows.is_empty() {
            return;
        }
        {
            let mut buffers = self.shared.buffers.write();
            for row in rows {
                for channel in Channel::ALL {
                    buffers[channel.index()].samples.push(row.get(channel));
                }
            }
            self.shared.len.store(buffers[0].len(), Ordering::Release);
        }

        let _guard = self.shared.growth.lock();
        self.shared.grown.notify_all();
    }

    pub fn len(&self) -> usize {
        self.shared.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reader handle over the same store
    pub fn reader(&self) -> SampleReader {
        SampleReader {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Read-only handle to a store
#[derive(Clone)]
pub struct SampleReader {
    shared: Arc<Shared>,
}

impl SampleReader {
    /// Published row count
    pub fn len(&self) -> usize {
        self.shared.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until at least `min_len` rows exist.
    ///
    /// Returns `false` if the deadline expires first.
    pub fn wait_for_len(&self, min_len: usize, deadline: &Deadline) -> bool {
        let poll = Duration::from_millis(CANCEL_POLL_INTERVAL_MS);
        let mut guard = self.shared.growth.lock();
        loop {
            if self.len() >= min_len {
                return true;
            }
            if deadline.is_expired() {
                return false;
            }
            let wake_at = (Instant::now() + poll).min(deadline.expires_at());
            self.shared.grown.wait_until(&mut guard, wake_at);
        }
    }

    /// Copy rows in `range`, clipped to the published length
    pub fn read_range(&self, range: Range<usize>) -> SampleLog {
        let buffers = self.shared.buffers.read();
        let end = range.end.min(buffers[0].len());
        let start = range.start.min(end);
        let slice = |channel: Channel| buffers[channel.index()].samples[start..end].to_vec();

        SampleLog::from_channels(slice(Channel::Emg), slice(Channel::Ecg), slice(Channel::Eda))
            .unwrap_or_default()
    }

    /// Copy of everything written so far
    pub fn snapshot(&self) -> SampleLog {
        self.read_range(0..usize::MAX)
    }
}
