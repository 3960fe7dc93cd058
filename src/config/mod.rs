// src/config/mod.rs
//! Configuration management
//!
//! [`SystemConfig`] holds the settings that outlive a session (device
//! backend, live view tuning, stimulus output, analysis parameters) and is
//! loaded through [`ConfigLoader`]. [`RecordingConfig`] is the per-session
//! record handed in by the front end.

pub mod constants;
pub mod device_config;
pub mod loader;
pub mod recording;

pub use device_config::DeviceConfig;
pub use loader::ConfigLoader;
pub use recording::{ChannelSelection, RecordingConfig, StimulusDescriptor};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("configuration parse error: {0}")]
    Parse(String),

    #[error("invalid configuration field `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Complete system configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub live_view: LiveViewConfig,
    #[serde(default)]
    pub stimulus: StimulusConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Live window tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LiveViewConfig {
    /// Samples required before rendering starts
    #[serde(default = "defaults::readiness_threshold")]
    pub readiness_threshold: usize,

    /// Window length in seconds of samples
    #[serde(default = "defaults::window_seconds")]
    pub window_seconds: f64,

    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "defaults::fast_tick_interval_ms")]
    pub fast_tick_interval_ms: u64,

    #[serde(default = "defaults::fast_tick_rate_hz")]
    pub fast_tick_rate_hz: u32,
}

impl LiveViewConfig {
    /// Sliding window capacity per channel
    pub fn window_capacity(&self, sample_rate: u32) -> usize {
        ((self.window_seconds * f64::from(sample_rate)).round() as usize).max(1)
    }

    /// Redraw interval for the given rate
    pub fn tick_interval(&self, sample_rate: u32) -> Duration {
        if sample_rate >= self.fast_tick_rate_hz {
            Duration::from_millis(self.fast_tick_interval_ms)
        } else {
            Duration::from_millis(self.tick_interval_ms)
        }
    }

    /// Readiness threshold clamped to what the session can ever produce
    pub fn readiness_for(&self, target_samples: usize) -> usize {
        self.readiness_threshold.min(target_samples).max(1)
    }
}

/// Where stimulus audio goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioOutput {
    /// Default output device of the host
    Device,
    /// Playback is timed and logged but not audible
    Silent,
}

/// Stimulus output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StimulusConfig {
    #[serde(default = "defaults::asset_directory")]
    pub asset_directory: PathBuf,

    #[serde(default = "defaults::tone_sample_rate_hz")]
    pub tone_sample_rate_hz: u32,

    #[serde(default = "defaults::audio_output")]
    pub output: AudioOutput,
}

/// Offline analysis parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default = "defaults::section_size")]
    pub section_size: usize,

    #[serde(default = "defaults::lms_step_size")]
    pub lms_step_size: f64,

    /// Constant regressor fed to the adaptive filter
    #[serde(default = "defaults::lms_regressor")]
    pub lms_regressor: f64,

    #[serde(default = "defaults::label_section_seconds")]
    pub label_section_seconds: u32,

    /// Wavelet-denoise EMG and EDA before statistics
    #[serde(default = "defaults::denoise")]
    pub denoise: bool,

    #[serde(default = "defaults::denoise_levels")]
    pub denoise_levels: usize,

    #[serde(default = "defaults::peak_window_seconds")]
    pub peak_window_seconds: u32,
}

mod defaults {
    use super::AudioOutput;
    use crate::config::constants::*;
    use std::path::PathBuf;

    pub fn readiness_threshold() -> usize { live_view::READINESS_THRESHOLD_SAMPLES }
    pub fn window_seconds() -> f64 { live_view::WINDOW_SECONDS }
    pub fn tick_interval_ms() -> u64 { live_view::TICK_INTERVAL_MS }
    pub fn fast_tick_interval_ms() -> u64 { live_view::FAST_TICK_INTERVAL_MS }
    pub fn fast_tick_rate_hz() -> u32 { live_view::FAST_TICK_RATE_HZ }

    pub fn asset_directory() -> PathBuf { PathBuf::from(stimulus::ASSET_DIRECTORY) }
    pub fn tone_sample_rate_hz() -> u32 { stimulus::TONE_SAMPLE_RATE_HZ }
    pub fn audio_output() -> AudioOutput { AudioOutput::Device }

    pub fn section_size() -> usize { analysis::DEFAULT_SECTION_SIZE }
    pub fn lms_step_size() -> f64 { analysis::LMS_STEP_SIZE }
    pub fn lms_regressor() -> f64 { analysis::LMS_REGRESSOR }
    pub fn label_section_seconds() -> u32 { analysis::LABEL_SECTION_SECONDS }
    pub fn denoise() -> bool { true }
    pub fn denoise_levels() -> usize { analysis::DENOISE_LEVELS }
    pub fn peak_window_seconds() -> u32 { analysis::PEAK_WINDOW_SECONDS }
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            readiness_threshold: defaults::readiness_threshold(),
            window_seconds: defaults::window_seconds(),
            tick_interval_ms: defaults::tick_interval_ms(),
            fast_tick_interval_ms: defaults::fast_tick_interval_ms(),
            fast_tick_rate_hz: defaults::fast_tick_rate_hz(),
        }
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            asset_directory: defaults::asset_directory(),
            tone_sample_rate_hz: defaults::tone_sample_rate_hz(),
            output: defaults::audio_output(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            section_size: defaults::section_size(),
            lms_step_size: defaults::lms_step_size(),
            lms_regressor: defaults::lms_regressor(),
            label_section_seconds: defaults::label_section_seconds(),
            denoise: defaults::denoise(),
            denoise_levels: defaults::denoise_levels(),
            peak_window_seconds: defaults::peak_window_seconds(),
        }
    }
}

impl SystemConfig {
    /// Check cross-field constraints after merging
    pub fn validate(&self) -> Result<(), ConfigError> {
        let live = &self.live_view;
        if live.readiness_threshold == 0 {
            return Err(ConfigError::invalid("live_view.readiness_threshold", "must be positive"));
        }
        if !(live.window_seconds.is_finite() && live.window_seconds > 0.0) {
            return Err(ConfigError::invalid("live_view.window_seconds", "must be positive"));
        }
        if live.tick_interval_ms == 0 || live.fast_tick_interval_ms == 0 {
            return Err(ConfigError::invalid("live_view.tick_interval_ms", "must be positive"));
        }

        if self.stimulus.tone_sample_rate_hz == 0 {
            return Err(ConfigError::invalid("stimulus.tone_sample_rate_hz", "must be positive"));
        }

        let analysis = &self.analysis;
        if analysis.section_size == 0 {
            return Err(ConfigError::invalid("analysis.section_size", "must be positive"));
        }
        if !(analysis.lms_step_size.is_finite() && analysis.lms_step_size > 0.0) {
            return Err(ConfigError::invalid("analysis.lms_step_size", "must be positive"));
        }
        if !analysis.lms_regressor.is_finite() {
            return Err(ConfigError::invalid("analysis.lms_regressor", "must be finite"));
        }
        if analysis.label_section_seconds == 0 {
            return Err(ConfigError::invalid("analysis.label_section_seconds", "must be positive"));
        }
        if analysis.denoise && analysis.denoise_levels == 0 {
            return Err(ConfigError::invalid("analysis.denoise_levels", "must be positive"));
        }

        if self.device.bitalino.connect_attempts == 0 {
            return Err(ConfigError::invalid("device.bitalino.connect_attempts", "must be positive"));
        }
        Ok(())
    }
}
