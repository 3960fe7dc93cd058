// src/acquisition/worker.rs
//! Acquisition worker draining a device session into the sample store

use crate::acquisition::sample_store::SampleWriter;
use crate::config::RecordingConfig;
use crate::hal::{DeviceSession, HalResult};
use crate::utils::Deadline;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// Why the acquisition loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `sample_rate * duration` rows were stored
    TargetReached,
    /// The session's wall-clock budget ran out
    DeadlineElapsed,
    /// Another worker cancelled the session
    Cancelled,
}

/// Acquisition summary
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub samples: usize,
    pub batches: usize,
    pub malformed: u64,
    pub stop_reason: StopReason,
}

/// Moves samples from a connected device into the store
pub struct AcquisitionWorker {
    device: Box<dyn DeviceSession>,
    config: Arc<RecordingConfig>,
    writer: SampleWriter,
    deadline: Deadline,
}

impl AcquisitionWorker {
    /// `device` must already be connected
    pub fn new(
        device: Box<dyn DeviceSession>,
        config: Arc<RecordingConfig>,
        writer: SampleWriter,
        deadline: Deadline,
    ) -> Self {
        Self {
            device,
            config,
            writer,
            deadline,
        }
    }

    /// Run until the target length, the deadline, or a device failure.
    ///
    /// The device is stopped and closed on every exit path.
    pub fn run(mut self) -> HalResult<AcquisitionReport> {
        let _span = info_span!("acquisition").entered();
        let result = self.drain();

        if let Err(e) = self.device.stop() {
            debug!(error = %e, "device stop");
        }
        if let Err(e) = self.device.close() {
            warn!(error = %e, "device close failed");
        }

        match &result {
            Ok(report) => info!(
                samples = report.samples,
                malformed = report.malformed,
                reason = ?report.stop_reason,
                "acquisition finished"
            ),
            Err(e) => warn!(error = %e, "acquisition aborted"),
        }
        result
    }

    fn drain(&mut self) -> HalResult<AcquisitionReport> {
        let rate = self.config.sample_rate;
        let target = self.config.target_samples();
        let channels = self.config.channels;
        let mut batches = 0usize;

        self.device.start(rate)?;
        info!(rate, target, "acquisition started");

        let stop_reason = loop {
            if self.writer.len() >= target {
                break StopReason::TargetReached;
            }
            if self.deadline.is_cancelled() {
                break StopReason::Cancelled;
            }
            if self.deadline.is_expired() {
                break StopReason::DeadlineElapsed;
            }

            let batch = match self.device.read(rate) {
                Ok(batch) => batch,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "skipping unreadable batch");
                    continue;
                }
                Err(e) => return Err(e),
            };
            batches += 1;

            let room = target - self.writer.len();
            let rows: Vec<_> = batch
                .into_iter()
                .take(room)
                .map(|sample| channels.apply(sample))
                .collect();
            self.writer.push_batch(&rows);
        };

        Ok(AcquisitionReport {
            samples: self.writer.len(),
            batches,
            malformed: self.device.malformed_count(),
            stop_reason,
        })
    }
}

