// src/live_view/consumer.rs
//! Live window consumer worker
//!
//! Waits until the store holds enough samples, opens the readiness barrier,
//! then once per tick moves the next `sample_rate` rows into its sliding
//! window and renders it. The shared deadline is its only stop signal.

use crate::acquisition::{ReadyBarrier, SampleReader};
use crate::config::{LiveViewConfig, RecordingConfig};
use crate::live_view::renderer::LiveRenderer;
use crate::live_view::window::SlidingWindow;
use crate::utils::Deadline;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

/// Live view summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveViewReport {
    pub ticks: u64,
    pub max_window_len: usize,
    /// Ticks that found fewer new rows than one second's worth
    pub underruns: u64,
    pub barrier_opened: bool,
}

/// Rendering consumer of the sample store
pub struct LiveWindowConsumer {
    reader: SampleReader,
    barrier: ReadyBarrier,
    deadline: Deadline,
    renderer: Box<dyn LiveRenderer>,
    rows_per_tick: usize,
    readiness: usize,
    tick: Duration,
    window: SlidingWindow,
}

impl LiveWindowConsumer {
    pub fn new(
        reader: SampleReader,
        barrier: ReadyBarrier,
        deadline: Deadline,
        renderer: Box<dyn LiveRenderer>,
        recording: &RecordingConfig,
        live: &LiveViewConfig,
    ) -> Self {
        let rate = recording.sample_rate;
        Self {
            reader,
            barrier,
            deadline,
            renderer,
            rows_per_tick: rate.max(1) as usize,
            readiness: live.readiness_for(recording.target_samples()),
            tick: live.tick_interval(rate),
            window: SlidingWindow::new(live.window_capacity(rate), recording.channels),
        }
    }

    pub fn run(mut self) -> LiveViewReport {
        let _span = info_span!("live_view").entered();
        let mut report = LiveViewReport::default();

        if !self.reader.wait_for_len(self.readiness, &self.deadline) {
            info!(readiness = self.readiness, "session ended before the live view became ready");
            self.renderer.finish();
            return report;
        }
        self.barrier.open();
        report.barrier_opened = true;
        info!(readiness = self.readiness, "live view ready");

        let mut cursor = self.reader.len().saturating_sub(self.window.capacity());
        while !self.deadline.is_expired() {
            let rows = self.reader.read_range(cursor..cursor + self.rows_per_tick);
            if rows.len() < self.rows_per_tick {
                report.underruns += 1;
                debug!(cursor, available = rows.len(), "writer behind live view");
            }
            cursor += rows.len();
            self.window.admit(&rows);
            report.max_window_len = report.max_window_len.max(self.window.len());
            report.ticks += 1;

            let frame = self.window.frame(report.ticks, self.deadline.elapsed());
            if let Err(e) = self.renderer.render(&frame) {
                warn!(error = %e, "renderer failed, live view stopped");
                break;
            }
            if !self.deadline.sleep(self.tick) {
                break;
            }
        }

        self.renderer.finish();
        info!(ticks = report.ticks, underruns = report.underruns, "live view finished");
        report
    }
}
