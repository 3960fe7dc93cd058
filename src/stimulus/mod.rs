// src/stimulus/mod.rs
//! Acoustic stimulus playback for the test phase

pub mod audio;
pub mod calibration;
pub mod scheduler;

#[cfg(feature = "audio")]
pub use audio::CpalSink;
pub use audio::{
    db_to_amplitude, AudioSink, PlaybackEvent, PlaybackKind, StimulusError, TimedSink,
    ToneGenerator, WavAsset,
};
pub use calibration::{CalibrationInput, VolumeCalibration};
pub use scheduler::{asset_path, StimulusReport, StimulusScheduler};

use crate::config::{AudioOutput, StimulusConfig};

/// Build the sink selected in configuration
pub fn create_sink(config: &StimulusConfig) -> Box<dyn AudioSink> {
    match config.output {
        #[cfg(feature = "audio")]
        AudioOutput::Device => Box::new(CpalSink::new(config.tone_sample_rate_hz)),
        #[cfg(not(feature = "audio"))]
        AudioOutput::Device => {
            tracing::warn!("built without audio output, stimulus will be silent");
            Box::new(TimedSink::realtime())
        }
        AudioOutput::Silent => Box::new(TimedSink::realtime()),
    }
}
