// src/stimulus/audio.rs
//! Audio sources and output sinks for the acoustic stimulus
//!
//! Levels are given in dB relative to full scale and converted to a linear
//! amplitude with `10^(dB/20)`. A sink plays one source for a bounded time
//! and returns early when the session deadline passes.

use crate::utils::Deadline;
use parking_lot::Mutex;
use serde::Serialize;
use std::f64::consts::TAU;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

/// Stimulus errors
#[derive(Debug, Error)]
pub enum StimulusError {
    #[error("audio asset not found: {0}")]
    AssetNotFound(PathBuf),

    #[error("audio asset {path}: {reason}")]
    InvalidAsset { path: PathBuf, reason: String },

    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("audio output failed: {0}")]
    Output(String),
}

/// Linear amplitude for a dBFS level
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Sine oscillator
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    phase: f64,
    step: f64,
    amplitude: f64,
}

impl ToneGenerator {
    pub fn new(frequency_hz: f64, volume_db: f64, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency_hz / f64::from(sample_rate.max(1)),
            amplitude: db_to_amplitude(volume_db),
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let value = self.phase.sin() * self.amplitude;
        self.phase = (self.phase + self.step) % TAU;
        value as f32
    }
}

/// Decoded mono audio clip
#[derive(Debug, Clone)]
pub struct WavAsset {
    pub name: String,
    pub sample_rate: u32,
    samples: Arc<Vec<f32>>,
}

impl WavAsset {
    /// Load a WAV file, mixing all channels down to mono
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StimulusError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StimulusError::AssetNotFound(path.to_path_buf()));
        }
        let invalid = |reason: String| StimulusError::InvalidAsset {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = hound::WavReader::open(path).map_err(|e| invalid(e.to_string()))?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| invalid(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| invalid(e.to_string()))?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        if samples.is_empty() {
            return Err(invalid("no audio frames".to_string()));
        }

        Ok(Self {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            sample_rate: spec.sample_rate,
            samples: Arc::new(samples),
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    /// Endless looping reader resampled to `output_rate`
    pub fn looped(&self, volume_db: f64, output_rate: u32) -> LoopedClip {
        LoopedClip {
            samples: Arc::clone(&self.samples),
            position: 0.0,
            step: f64::from(self.sample_rate) / f64::from(output_rate.max(1)),
            amplitude: db_to_amplitude(volume_db),
        }
    }
}

/// Looping cursor over a clip
#[derive(Debug, Clone)]
pub struct LoopedClip {
    samples: Arc<Vec<f32>>,
    position: f64,
    step: f64,
    amplitude: f64,
}

impl LoopedClip {
    pub fn next_sample(&mut self) -> f32 {
        let len = self.samples.len();
        let index = (self.position as usize).min(len.saturating_sub(1));
        let value = f64::from(self.samples[index]) * self.amplitude;
        self.position = (self.position + self.step) % len as f64;
        value as f32
    }
}

/// What a sink is asked to play
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PlaybackKind {
    Tone { frequency_hz: u32 },
    Asset { name: String },
}

/// One completed playback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackEvent {
    pub kind: PlaybackKind,
    pub volume_db: f64,
    pub requested: Duration,
    pub played: Duration,
}

/// Audio output
pub trait AudioSink: Send {
    /// Play a sine tone; returns how long it actually played
    fn play_tone(
        &mut self,
        frequency_hz: u32,
        volume_db: f64,
        duration: Duration,
        deadline: &Deadline,
    ) -> Result<Duration, StimulusError>;

    /// Loop a clip for `duration`; returns how long it actually played
    fn play_asset(
        &mut self,
        asset: &WavAsset,
        volume_db: f64,
        duration: Duration,
        deadline: &Deadline,
    ) -> Result<Duration, StimulusError>;
}

/// Sink that keeps time and logs events without producing sound
#[derive(Debug, Clone)]
pub struct TimedSink {
    events: Arc<Mutex<Vec<PlaybackEvent>>>,
    realtime: bool,
}

impl TimedSink {
    /// Waits out each playback like a real device
    pub fn realtime() -> Self {
        Self {
            events: Arc::default(),
            realtime: true,
        }
    }

    /// Returns from each playback immediately
    pub fn instant() -> Self {
        Self {
            events: Arc::default(),
            realtime: false,
        }
    }

    /// Events recorded so far, shared with every clone
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.lock().clone()
    }

    fn record(
        &mut self,
        kind: PlaybackKind,
        volume_db: f64,
        duration: Duration,
        deadline: &Deadline,
    ) -> Duration {
        let started = Instant::now();
        let played = if self.realtime {
            deadline.sleep(duration);
            started.elapsed()
        } else {
            duration
        };
        info!(kind = ?kind, volume_db, played_ms = played.as_millis() as u64, "stimulus played");
        self.events.lock().push(PlaybackEvent {
            kind,
            volume_db,
            requested: duration,
            played,
        });
        played
    }
}

impl AudioSink for TimedSink {
    fn play_tone(
        &mut self,
        frequency_hz: u32,
        volume_db: f64,
        duration: Duration,
        deadline: &Deadline,
    ) -> Result<Duration, StimulusError> {
        Ok(self.record(PlaybackKind::Tone { frequency_hz }, volume_db, duration, deadline))
    }

    fn play_asset(
        &mut self,
        asset: &WavAsset,
        volume_db: f64,
        duration: Duration,
        deadline: &Deadline,
    ) -> Result<Duration, StimulusError> {
        let kind = PlaybackKind::Asset {
            name: asset.name.clone(),
        };
        Ok(self.record(kind, volume_db, duration, deadline))
    }
}

#[cfg(feature = "audio")]
pub use device::CpalSink;

#[cfg(feature = "audio")]
mod device {
    use super::{AudioSink, LoopedClip, StimulusError, ToneGenerator, WavAsset};
    use crate::utils::Deadline;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::time::{Duration, Instant};
    use tracing::{debug, warn};

    enum Source {
        Tone(ToneGenerator),
        Clip(LoopedClip),
    }

    impl Source {
        fn next_sample(&mut self) -> f32 {
            match self {
                Source::Tone(tone) => tone.next_sample(),
                Source::Clip(clip) => clip.next_sample(),
            }
        }
    }

    /// Plays through the host's default output device
    #[derive(Debug, Clone)]
    pub struct CpalSink {
        preferred_sample_rate: u32,
    }

    impl CpalSink {
        pub fn new(preferred_sample_rate: u32) -> Self {
            Self {
                preferred_sample_rate,
            }
        }

        fn stream_config(&self, device: &cpal::Device) -> Result<cpal::StreamConfig, StimulusError> {
            let preferred = cpal::SampleRate(self.preferred_sample_rate);
            if let Ok(mut ranges) = device.supported_output_configs() {
                let matching = ranges.find(|range| {
                    range.sample_format() == cpal::SampleFormat::F32
                        && range.min_sample_rate() <= preferred
                        && preferred <= range.max_sample_rate()
                });
                if let Some(range) = matching {
                    return Ok(range.with_sample_rate(preferred).config());
                }
            }

            let fallback = device
                .default_output_config()
                .map_err(|e| StimulusError::Output(e.to_string()))?;
            if fallback.sample_format() != cpal::SampleFormat::F32 {
                return Err(StimulusError::Output(format!(
                    "output device offers {:?} samples, f32 required",
                    fallback.sample_format()
                )));
            }
            Ok(fallback.config())
        }

        fn play(
            &mut self,
            make_source: impl FnOnce(u32) -> Source,
            duration: Duration,
            deadline: &Deadline,
        ) -> Result<Duration, StimulusError> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(StimulusError::NoOutputDevice)?;
            let config = self.stream_config(&device)?;
            let channels = usize::from(config.channels.max(1));
            let mut source = make_source(config.sample_rate.0);
            debug!(rate = config.sample_rate.0, channels, "opening output stream");

            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let value = source.next_sample();
                            frame.iter_mut().for_each(|out| *out = value);
                        }
                    },
                    |err| warn!(error = %err, "audio stream error"),
                    None,
                )
                .map_err(|e| StimulusError::Output(e.to_string()))?;
            stream
                .play()
                .map_err(|e| StimulusError::Output(e.to_string()))?;

            let started = Instant::now();
            deadline.sleep(duration);
            drop(stream);
            Ok(started.elapsed())
        }
    }

    impl AudioSink for CpalSink {
        fn play_tone(
            &mut self,
            frequency_hz: u32,
            volume_db: f64,
            duration: Duration,
            deadline: &Deadline,
        ) -> Result<Duration, StimulusError> {
            self.play(
                |rate| Source::Tone(ToneGenerator::new(f64::from(frequency_hz), volume_db, rate)),
                duration,
                deadline,
            )
        }

        fn play_asset(
            &mut self,
            asset: &WavAsset,
            volume_db: f64,
            duration: Duration,
            deadline: &Deadline,
        ) -> Result<Duration, StimulusError> {
            self.play(
                |rate| Source::Clip(asset.looped(volume_db, rate)),
                duration,
                deadline,
            )
        }
    }
}
