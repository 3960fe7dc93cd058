// src/error.rs
//! Unified error type for SoundSense Core
//!
//! Each subsystem keeps its own error enum close to the code that raises it.
//! [`CoreError`] wraps them so session-level callers handle one type, and
//! [`CoreError::is_fatal`] tells the coordinator whether a recording must be
//! abandoned.

use crate::acquisition::SampleLogError;
use crate::config::ConfigError;
use crate::hal::HalError;
use crate::live_view::RenderError;
use crate::processing::AnalysisError;
use crate::stimulus::StimulusError;
use thiserror::Error;

/// Unified error for the whole crate
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("device: {0}")]
    Hal(#[from] HalError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("stimulus: {0}")]
    Stimulus(#[from] StimulusError),

    #[error("analysis: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("live view: {0}")]
    Render(#[from] RenderError),

    #[error("sample log: {0}")]
    SampleLog(#[from] SampleLogError),

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the session cannot produce a recording after this error
    pub fn is_fatal(&self) -> bool {
        match self {
            CoreError::Hal(e) => !e.is_recoverable(),
            CoreError::Stimulus(_) | CoreError::Render(_) => false,
            _ => true,
        }
    }
}

/// Crate-wide result alias
pub type CoreResult<T> = Result<T, CoreError>;
