// src/config/recording.rs
//! Per-session recording parameters
//!
//! A [`RecordingConfig`] arrives once per session from the front end, in the
//! record shape `{sample_rate, duration, channels, audio_option, time_option,
//! di_option}`, and is shared read-only by every worker afterwards.

use crate::config::constants::{acquisition, stimulus};
use crate::config::ConfigError;
use crate::hal::{Channel, ChannelSample};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Enabled flags in EMG, ECG, EDA order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[bool; 3]", into = "[bool; 3]")]
pub struct ChannelSelection {
    pub emg: bool,
    pub ecg: bool,
    pub eda: bool,
}

impl ChannelSelection {
    pub const ALL: ChannelSelection = ChannelSelection {
        emg: true,
        ecg: true,
        eda: true,
    };

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Emg => self.emg,
            Channel::Ecg => self.ecg,
            Channel::Eda => self.eda,
        }
    }

    pub fn enabled(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|&c| self.is_enabled(c))
            .collect()
    }

    pub fn any(&self) -> bool {
        self.emg || self.ecg || self.eda
    }

    /// Keep enabled readings and write the placeholder for the rest
    pub fn apply(&self, sample: ChannelSample) -> ChannelSample {
        let mut out = sample;
        for channel in Channel::ALL {
            if !self.is_enabled(channel) {
                out.set(channel, acquisition::PLACEHOLDER_VALUE);
            }
        }
        out
    }
}

impl From<[bool; 3]> for ChannelSelection {
    fn from([emg, ecg, eda]: [bool; 3]) -> Self {
        Self { emg, ecg, eda }
    }
}

impl From<ChannelSelection> for [bool; 3] {
    fn from(selection: ChannelSelection) -> Self {
        [selection.emg, selection.ecg, selection.eda]
    }
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self::ALL
    }
}

/// What the stimulus plays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StimulusDescriptor {
    /// Pure tone at this frequency in Hz
    Frequency(u32),
    /// Named audio asset
    Asset(String),
}

/// Immutable recording session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Samples per second
    pub sample_rate: u32,
    /// Session length in seconds
    pub duration: u32,
    #[serde(default)]
    pub channels: ChannelSelection,
    #[serde(rename = "audio_option")]
    pub stimulus: StimulusDescriptor,
    /// Seconds between volume steps
    #[serde(rename = "time_option")]
    pub step_interval: u32,
    /// Volume increase per step in dB
    #[serde(rename = "di_option")]
    pub step_db: f64,
    #[serde(default = "default_starting_volume_db")]
    pub starting_volume_db: f64,
}

fn default_starting_volume_db() -> f64 {
    stimulus::DEFAULT_STARTING_VOLUME_DB
}

impl RecordingConfig {
    /// Parse the front end's JSON record and validate it
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: RecordingConfig =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(acquisition::MIN_SAMPLING_RATE_HZ..=acquisition::MAX_SAMPLING_RATE_HZ)
            .contains(&self.sample_rate)
        {
            return Err(ConfigError::invalid(
                "sample_rate",
                format!(
                    "{} Hz is outside {}..={} Hz",
                    self.sample_rate,
                    acquisition::MIN_SAMPLING_RATE_HZ,
                    acquisition::MAX_SAMPLING_RATE_HZ
                ),
            ));
        }
        if self.duration == 0 {
            return Err(ConfigError::invalid("duration", "must be at least one second"));
        }
        if self.duration > acquisition::MAX_DURATION_S {
            return Err(ConfigError::invalid(
                "duration",
                format!("{} s exceeds {} s", self.duration, acquisition::MAX_DURATION_S),
            ));
        }
        let target = u64::from(self.sample_rate) * u64::from(self.duration);
        if target > acquisition::MAX_TARGET_SAMPLES {
            return Err(ConfigError::invalid(
                "duration",
                format!(
                    "{} samples exceed the {} sample limit",
                    target,
                    acquisition::MAX_TARGET_SAMPLES
                ),
            ));
        }
        if self.step_interval == 0 {
            return Err(ConfigError::invalid("time_option", "must be at least one second"));
        }
        if self.step_interval > self.duration {
            return Err(ConfigError::invalid(
                "time_option",
                format!("{} s step exceeds the {} s session", self.step_interval, self.duration),
            ));
        }
        if !self.step_db.is_finite() || !self.starting_volume_db.is_finite() {
            return Err(ConfigError::invalid("di_option", "volume values must be finite"));
        }
        if !self.channels.any() {
            return Err(ConfigError::invalid("channels", "at least one channel must be enabled"));
        }
        if let StimulusDescriptor::Asset(name) = &self.stimulus {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("audio_option", "asset name is empty"));
            }
            // Asset names resolve inside the asset directory only
            if name.contains(|c: char| c == '/' || c == '\\') || name.contains("..") {
                return Err(ConfigError::invalid(
                    "audio_option",
                    format!("asset name {:?} must not contain a path", name),
                ));
            }
        }
        Ok(())
    }

    /// Buffer length at which acquisition stops
    pub fn target_samples(&self) -> usize {
        self.sample_rate as usize * self.duration as usize
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration))
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.step_interval))
    }

    /// Number of whole volume steps that fit in the session
    pub fn stimulus_steps(&self) -> u32 {
        self.duration / self.step_interval.max(1)
    }
}
