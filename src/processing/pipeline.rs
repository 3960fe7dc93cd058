// src/processing/pipeline.rs
//! Offline analysis of a finished baseline/test pair
//!
//! Each enabled channel is analyzed independently: optional wavelet
//! denoising (EMG and EDA only), whole-run and sectioned statistics, peak
//! rate and an LMS predictor pass. Channels run in parallel on the rayon
//! pool. Comparing two phase analyses yields the per-channel report handed
//! to the reporting layer.

use crate::acquisition::SampleLog;
use crate::config::{AnalysisConfig, ChannelSelection};
use crate::hal::Channel;
use crate::processing::adaptive_filter::{LmsPredictor, ResidualBand};
use crate::processing::denoise::WaveletDenoiser;
use crate::processing::peaks::{peak_locations, peak_rate, simple_threshold};
use crate::processing::statistics::{
    assign_flags, calculate_percent_difference, calculate_sectioned_stats, calculate_stats,
    compare_sections, directions, Direction, FeatureSet, SectionComparison, SeverityFlag,
    SignalStats, StatKey,
};
use crate::processing::AnalysisError;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Predictor output for one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub measured: Vec<f64>,
    pub estimated: Vec<f64>,
    pub residual: Vec<f64>,
    pub severity_labels: Vec<ResidualBand>,
    pub section_labels: Vec<ResidualBand>,
    pub dominant_label: Option<ResidualBand>,
}

/// One channel of one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAnalysis {
    pub channel: Channel,
    pub stats: SignalStats,
    pub sections: BTreeMap<usize, SignalStats>,
    /// Events per minute, when at least two peaks were found
    pub peak_rate: Option<f64>,
    pub filter: FilterReport,
}

/// Every enabled channel of one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseAnalysis {
    pub sample_rate: u32,
    pub samples: usize,
    pub channels: Vec<ChannelAnalysis>,
}

impl PhaseAnalysis {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelAnalysis> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

/// Baseline versus test for one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReport {
    pub channel: Channel,
    pub baseline_stats: SignalStats,
    pub test_stats: SignalStats,
    pub percent_diff: BTreeMap<StatKey, f64>,
    pub flags: BTreeMap<StatKey, SeverityFlag>,
    pub directions: BTreeMap<StatKey, Direction>,
    pub sections: BTreeMap<usize, SectionComparison>,
    pub baseline_peak_rate: Option<f64>,
    pub test_peak_rate: Option<f64>,
    /// Worst flag, present only when every feature is finite
    pub overall: Option<SeverityFlag>,
    /// Why classification was skipped
    pub classification_error: Option<String>,
    pub baseline_filter: FilterReport,
    pub test_filter: FilterReport,
}

/// Full comparison, serialized for the reporting layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub sample_rate: u32,
    pub channels: Vec<ChannelReport>,
}

impl AnalysisReport {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), AnalysisError> {
        let json = self.to_json().map_err(|e| AnalysisError::Export(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Runs the per-channel analysis steps
#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    config: AnalysisConfig,
    sample_rate: u32,
    channels: ChannelSelection,
    predictor: LmsPredictor,
    denoiser: WaveletDenoiser,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig, sample_rate: u32, channels: ChannelSelection) -> Self {
        Self {
            predictor: LmsPredictor::new(config.lms_step_size),
            denoiser: WaveletDenoiser::new(config.denoise_levels),
            config,
            sample_rate,
            channels,
        }
    }

    /// Analyze every enabled channel of one recording
    pub fn analyze_phase(&self, log: &SampleLog) -> Result<PhaseAnalysis, AnalysisError> {
        if log.is_empty() {
            return Err(AnalysisError::EmptySequence);
        }
        let channels = self
            .channels
            .enabled()
            .into_par_iter()
            .map(|channel| self.analyze_channel(channel, log.channel(channel)))
            .collect::<Result<Vec<_>, _>>()?;

        info!(samples = log.len(), channels = channels.len(), "phase analyzed");
        Ok(PhaseAnalysis {
            sample_rate: self.sample_rate,
            samples: log.len(),
            channels,
        })
    }

    fn analyze_channel(&self, channel: Channel, raw: &[f64]) -> Result<ChannelAnalysis, AnalysisError> {
        // ECG keeps its sharp QRS edges
        let signal = if self.config.denoise && channel != Channel::Ecg {
            self.denoiser.denoise(raw)
        } else {
            raw.to_vec()
        };

        let stats = calculate_stats(&signal)?;
        let sections = calculate_sectioned_stats(&signal, self.config.section_size)?;
        let peak_rate = simple_threshold(&signal, self.config.peak_window_seconds, self.sample_rate)
            .map(|threshold| peak_locations(&signal, threshold))
            .and_then(|peaks| peak_rate(&peaks, self.sample_rate));

        let state = self.predictor.run_constant(&signal, self.config.lms_regressor)?;
        let section_labels = state.section_labels(self.config.label_section_seconds, self.sample_rate);
        let dominant_label = state.dominant_label();
        debug!(channel = %channel, sections = sections.len(), ?peak_rate, ?dominant_label, "channel analyzed");

        Ok(ChannelAnalysis {
            channel,
            stats,
            sections,
            peak_rate,
            filter: FilterReport {
                measured: state.measured,
                estimated: state.estimated,
                residual: state.residual,
                severity_labels: state.labels,
                section_labels,
                dominant_label,
            },
        })
    }

    /// Compare the channels analyzed in both phases
    pub fn compare(&self, baseline: &PhaseAnalysis, test: &PhaseAnalysis) -> AnalysisReport {
        let channels = baseline
            .channels
            .iter()
            .filter_map(|b| test.channel(b.channel).map(|t| compare_channel(b, t)))
            .collect();

        AnalysisReport {
            sample_rate: self.sample_rate,
            channels,
        }
    }
}

fn compare_channel(baseline: &ChannelAnalysis, test: &ChannelAnalysis) -> ChannelReport {
    let percent_diff = calculate_percent_difference(&baseline.stats, &test.stats);
    let flags = assign_flags(&percent_diff);

    let features = FeatureSet::from_percent_diff(baseline.channel.name(), &percent_diff);
    let (overall, classification_error) = match features.validate() {
        Ok(()) => (flags.values().copied().max(), None),
        Err(e) => {
            warn!(channel = %baseline.channel, error = %e, "classification skipped");
            (None, Some(e.to_string()))
        }
    };

    ChannelReport {
        channel: baseline.channel,
        baseline_stats: baseline.stats,
        test_stats: test.stats,
        directions: directions(&baseline.stats, &test.stats),
        sections: compare_sections(&baseline.sections, &test.sections),
        percent_diff,
        flags,
        baseline_peak_rate: baseline.peak_rate,
        test_peak_rate: test.peak_rate,
        overall,
        classification_error,
        baseline_filter: baseline.filter.clone(),
        test_filter: test.filter.clone(),
    }
}
