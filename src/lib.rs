//! SoundSense Core: synchronized biosignal recording under acoustic stimulus
//!
//! This library records EMG, ECG and EDA from a serial biosignal board while
//! playing a stepped-volume tone or clip, and grades the physiological
//! response against a stimulus-free baseline. It features:
//!
//! - Hardware abstraction layer over streaming-serial and BITalino boards
//! - Single-writer sample store with snapshot reads and a live rolling view
//! - Stimulus scheduling gated on the live view becoming ready
//! - Offline analysis: sectioned statistics, LMS residual grading, denoising
//! - Layered TOML/environment configuration
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use soundsense_core::config::{RecordingConfig, SystemConfig};
//! use soundsense_core::session::{Phase, RecordingSession};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recording = RecordingConfig::from_json(
//!         r#"{"sample_rate": 100, "duration": 15, "channels": [true, true, true],
//!             "audio_option": 1000, "time_option": 5, "di_option": 5}"#,
//!     )?;
//!
//!     let outcome = RecordingSession::new(recording, SystemConfig::default())?
//!         .run(Phase::Baseline)?;
//!     println!("recorded {} samples", outcome.log.len());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod live_view;
pub mod processing;
pub mod session;
pub mod stimulus;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{SampleLog, SampleStore};
pub use config::{ChannelSelection, ConfigLoader, RecordingConfig, SystemConfig};
pub use error::{CoreError, CoreResult};
pub use hal::{Channel, ChannelSample, DeviceFactory, DeviceSession, HalError};
pub use processing::{AnalysisPipeline, AnalysisReport};
pub use session::{Phase, RecordingSession, SessionOutcome};
pub use utils::Deadline;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Synchronized biosignal acquisition and response grading".to_string(),
        features: vec![
            "Streaming-serial and BITalino device backends".to_string(),
            "Live rolling view".to_string(),
            "Stepped-volume acoustic stimulus".to_string(),
            "Baseline/test response grading".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }
}
