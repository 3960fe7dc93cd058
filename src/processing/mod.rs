// src/processing/mod.rs
//! Offline analysis of recorded channels

pub mod adaptive_filter;
pub mod denoise;
pub mod peaks;
pub mod pipeline;
pub mod statistics;

pub use adaptive_filter::{FilterState, LmsPredictor, ResidualBand};
pub use denoise::WaveletDenoiser;
pub use peaks::{peak_locations, peak_rate, simple_threshold, Peak};
pub use pipeline::{
    AnalysisPipeline, AnalysisReport, ChannelAnalysis, ChannelReport, FilterReport, PhaseAnalysis,
};
pub use statistics::{
    assign_flags, calculate_percent_difference, calculate_sectioned_stats, calculate_stats,
    compare_sections, Direction, FeatureSet, SectionComparison, SeverityFlag, SignalStats, StatKey,
};

use thiserror::Error;

/// Analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot analyze an empty sequence")]
    EmptySequence,

    #[error("section size must be at least one sample")]
    InvalidSectionSize,

    #[error("regressor length {actual} does not match {expected} samples")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("invalid feature set: {feature} is {value}")]
    InvalidFeatureSet { feature: String, value: f64 },

    #[error("report export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
