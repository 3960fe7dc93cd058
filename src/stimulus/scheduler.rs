// src/stimulus/scheduler.rs
//! Stepped-volume stimulus worker
//!
//! Waits for the live view to open the readiness barrier, then plays the
//! configured tone or asset `duration / step_interval` times, raising the
//! volume by `step_db` after each step. The session deadline cuts the last
//! step short if the recording ends first.

use crate::acquisition::ReadyBarrier;
use crate::config::constants::stimulus::ASSET_EXTENSION;
use crate::config::{RecordingConfig, StimulusDescriptor};
use crate::stimulus::audio::{AudioSink, StimulusError, WavAsset};
use crate::utils::Deadline;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// Stimulus summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StimulusReport {
    pub steps_planned: u32,
    pub steps_played: u32,
    /// Level the next step would have used
    pub final_volume_db: f64,
    /// Whether the barrier opened before the session ended
    pub started: bool,
}

/// Resolve an asset name to `<directory>/<name>.wav`
pub fn asset_path(directory: &Path, name: &str) -> PathBuf {
    let path = directory.join(name);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(ASSET_EXTENSION)
    }
}

enum Signal {
    Tone(u32),
    Clip(WavAsset),
}

/// Plays the stimulus for one test phase
pub struct StimulusScheduler {
    recording: Arc<RecordingConfig>,
    asset_directory: PathBuf,
    sink: Box<dyn AudioSink>,
    barrier: ReadyBarrier,
    deadline: Deadline,
}

impl StimulusScheduler {
    pub fn new(
        recording: Arc<RecordingConfig>,
        asset_directory: impl Into<PathBuf>,
        sink: Box<dyn AudioSink>,
        barrier: ReadyBarrier,
        deadline: Deadline,
    ) -> Self {
        Self {
            recording,
            asset_directory: asset_directory.into(),
            sink,
            barrier,
            deadline,
        }
    }

    fn signal(&self) -> Result<Signal, StimulusError> {
        match &self.recording.stimulus {
            StimulusDescriptor::Frequency(hz) => Ok(Signal::Tone(*hz)),
            StimulusDescriptor::Asset(name) => {
                WavAsset::load(asset_path(&self.asset_directory, name)).map(Signal::Clip)
            }
        }
    }

    pub fn run(mut self) -> Result<StimulusReport, StimulusError> {
        let _span = info_span!("stimulus").entered();
        let steps = self.recording.stimulus_steps();
        let step = self.recording.step_duration();
        let mut volume_db = self.recording.starting_volume_db;
        let mut report = StimulusReport {
            steps_planned: steps,
            steps_played: 0,
            final_volume_db: volume_db,
            started: false,
        };

        // Fail on a missing asset before anyone is waiting on the sound
        let signal = self.signal()?;

        if !self.barrier.wait(&self.deadline) {
            info!("session ended before the stimulus started");
            return Ok(report);
        }
        report.started = true;
        info!(steps, step_s = step.as_secs(), volume_db, "stimulus started");

        for index in 0..steps {
            if self.deadline.is_expired() {
                break;
            }
            let played = match &signal {
                Signal::Tone(hz) => self.sink.play_tone(*hz, volume_db, step, &self.deadline)?,
                Signal::Clip(asset) => {
                    self.sink.play_asset(asset, volume_db, step, &self.deadline)?
                }
            };
            report.steps_played += 1;
            if played < step {
                warn!(step = index + 1, played_ms = played.as_millis() as u64, "stimulus step cut short");
            }
            volume_db += self.recording.step_db;
            report.final_volume_db = volume_db;
        }

        info!(
            played = report.steps_played,
            final_volume_db = report.final_volume_db,
            "stimulus finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelSelection;
    use crate::stimulus::audio::{PlaybackKind, TimedSink};
    use std::time::Duration;

    fn recording(stimulus: StimulusDescriptor) -> Arc<RecordingConfig> {
        Arc::new(RecordingConfig {
            sample_rate: 100,
            duration: 15,
            channels: ChannelSelection::ALL,
            stimulus,
            step_interval: 5,
            step_db: 5.0,
            starting_volume_db: -30.0,
        })
    }

    #[test]
    fn test_volume_rises_each_step() {
        let sink = TimedSink::instant();
        let barrier = ReadyBarrier::new();
        barrier.open();
        let scheduler = StimulusScheduler::new(
            recording(StimulusDescriptor::Frequency(1000)),
            "audio_files",
            Box::new(sink.clone()),
            barrier,
            Deadline::after(Duration::from_secs(5)),
        );

        let report = scheduler.run().unwrap();
        assert_eq!(report.steps_planned, 3);
        assert_eq!(report.steps_played, 3);
        assert_eq!(report.final_volume_db, -15.0);

        let volumes: Vec<f64> = sink.events().iter().map(|e| e.volume_db).collect();
        assert_eq!(volumes, vec![-30.0, -25.0, -20.0]);
        assert!(sink
            .events()
            .iter()
            .all(|e| e.kind == PlaybackKind::Tone { frequency_hz: 1000 }
                && e.requested == Duration::from_secs(5)));
    }

    #[test]
    fn test_nothing_plays_before_barrier() {
        let sink = TimedSink::instant();
        let scheduler = StimulusScheduler::new(
            recording(StimulusDescriptor::Frequency(500)),
            "audio_files",
            Box::new(sink.clone()),
            ReadyBarrier::new(),
            Deadline::after(Duration::from_millis(60)),
        );

        let report = scheduler.run().unwrap();
        assert!(!report.started);
        assert_eq!(report.steps_played, 0);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_deadline_truncates_steps() {
        let sink = TimedSink::realtime();
        let barrier = ReadyBarrier::new();
        barrier.open();
        let scheduler = StimulusScheduler::new(
            recording(StimulusDescriptor::Frequency(1000)),
            "audio_files",
            Box::new(sink.clone()),
            barrier,
            Deadline::after(Duration::from_millis(100)),
        );

        let report = scheduler.run().unwrap();
        assert_eq!(report.steps_played, 1);
        assert!(sink.events()[0].played < Duration::from_secs(1));
    }

    #[test]
    fn test_missing_asset_fails_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let barrier = ReadyBarrier::new();
        barrier.open();
        let scheduler = StimulusScheduler::new(
            recording(StimulusDescriptor::Asset("rain".into())),
            dir.path(),
            Box::new(TimedSink::instant()),
            barrier,
            Deadline::after(Duration::from_secs(1)),
        );

        match scheduler.run() {
            Err(StimulusError::AssetNotFound(path)) => {
                assert_eq!(path, dir.path().join("rain.wav"))
            }
            other => panic!("expected missing asset, got {:?}", other.map(|r| r.steps_played)),
        }
    }

    #[test]
    fn test_asset_path_keeps_explicit_extension() {
        let dir = Path::new("audio_files");
        assert_eq!(asset_path(dir, "rain"), dir.join("rain.wav"));
        assert_eq!(asset_path(dir, "rain.wav"), dir.join("rain.wav"));
    }
}
