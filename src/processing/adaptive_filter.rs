// src/processing/adaptive_filter.rs
//! Two-coefficient LMS predictor over a finished channel
//!
//! The estimate for sample `i` is `a[i]*x[i-1] + b[i]*y[i-1]`, where `y` is
//! the measured channel and `x` a companion regressor. Coefficients start at
//! zero and follow the LMS update with a fixed step size. Residuals are then
//! sorted into severity bands.

use crate::config::constants::analysis::{LMS_REGRESSOR, LMS_STEP_SIZE, RESIDUAL_BAND_LIMITS};
use crate::processing::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity band of one residual
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualBand {
    Normal,
    Slight,
    Mild,
    Moderate,
    Severe,
    Unknown,
}

impl ResidualBand {
    /// Bands in tie-break order
    pub const ALL: [ResidualBand; 6] = [
        ResidualBand::Normal,
        ResidualBand::Slight,
        ResidualBand::Mild,
        ResidualBand::Moderate,
        ResidualBand::Severe,
        ResidualBand::Unknown,
    ];

    /// Band for residual `e`; anything past the last limit or NaN is unknown
    pub fn classify(e: f64) -> Self {
        let [normal, slight, mild, moderate, severe] = RESIDUAL_BAND_LIMITS;
        if e.is_nan() {
            ResidualBand::Unknown
        } else if e <= normal {
            ResidualBand::Normal
        } else if e <= slight {
            ResidualBand::Slight
        } else if e <= mild {
            ResidualBand::Mild
        } else if e <= moderate {
            ResidualBand::Moderate
        } else if e <= severe {
            ResidualBand::Severe
        } else {
            ResidualBand::Unknown
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResidualBand::Normal => "normal",
            ResidualBand::Slight => "slight response",
            ResidualBand::Mild => "mild response",
            ResidualBand::Moderate => "moderate response",
            ResidualBand::Severe => "severe response",
            ResidualBand::Unknown => "unknown",
        }
    }

    fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResidualBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one predictor pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterState {
    pub measured: Vec<f64>,
    pub estimated: Vec<f64>,
    pub residual: Vec<f64>,
    /// Regressor coefficient trajectory
    pub coeff_a: Vec<f64>,
    /// Autoregressive coefficient trajectory
    pub coeff_b: Vec<f64>,
    /// Band of every residual from index 1 on
    pub labels: Vec<ResidualBand>,
}

impl FilterState {
    /// Majority band of each run of `section_seconds * sample_rate` labels.
    ///
    /// Ties go to the band seen first in the run. A shorter trailing run
    /// still gets a label.
    pub fn section_labels(&self, section_seconds: u32, sample_rate: u32) -> Vec<ResidualBand> {
        let size = (section_seconds as usize * sample_rate as usize).max(1);
        self.labels.chunks(size).filter_map(majority_first_seen).collect()
    }

    /// Most frequent band over the whole pass; ties go to the milder band
    pub fn dominant_label(&self) -> Option<ResidualBand> {
        let mut counts = [0usize; 6];
        for band in &self.labels {
            counts[band.rank()] += 1;
        }
        let (best, count) = counts
            .iter()
            .enumerate()
            .fold((0, 0), |acc, (i, &c)| if c > acc.1 { (i, c) } else { acc });
        (count > 0).then(|| ResidualBand::ALL[best])
    }
}

fn majority_first_seen(run: &[ResidualBand]) -> Option<ResidualBand> {
    let mut counts: Vec<(ResidualBand, usize)> = Vec::new();
    for &band in run {
        match counts.iter_mut().find(|(b, _)| *b == band) {
            Some((_, n)) => *n += 1,
            None => counts.push((band, 1)),
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(ResidualBand, usize)>, (b, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((b, n)),
        })
        .map(|(b, _)| b)
}

/// LMS predictor with a fixed step size
#[derive(Debug, Clone, Copy)]
pub struct LmsPredictor {
    step_size: f64,
}

impl Default for LmsPredictor {
    fn default() -> Self {
        Self::new(LMS_STEP_SIZE)
    }
}

impl LmsPredictor {
    pub fn new(step_size: f64) -> Self {
        Self { step_size }
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Run against a constant regressor
    pub fn run_constant(&self, measured: &[f64], regressor: f64) -> Result<FilterState, AnalysisError> {
        self.run(measured, &vec![regressor; measured.len()])
    }

    /// Run with the default regressor constant
    pub fn run_default(&self, measured: &[f64]) -> Result<FilterState, AnalysisError> {
        self.run_constant(measured, LMS_REGRESSOR)
    }

    /// Single forward pass over `y` with regressor `x`
    pub fn run(&self, y: &[f64], x: &[f64]) -> Result<FilterState, AnalysisError> {
        let n = y.len();
        if n == 0 {
            return Err(AnalysisError::EmptySequence);
        }
        if x.len() != n {
            return Err(AnalysisError::LengthMismatch {
                expected: n,
                actual: x.len(),
            });
        }

        let mu = self.step_size;
        let mut a = vec![0.0; n];
        let mut b = vec![0.0; n];
        let mut estimated = vec![0.0; n];
        let mut residual = vec![0.0; n];
        // Nothing precedes the first sample
        estimated[0] = y[0];

        if n > 1 {
            for i in 1..n - 1 {
                estimated[i] = a[i] * x[i - 1] + b[i] * y[i - 1];
                residual[i] = y[i] - estimated[i];
                a[i + 1] = a[i] + mu * x[i - 1] * residual[i];
                b[i + 1] = b[i] + mu * y[i - 1] * residual[i];
            }
            let last = n - 1;
            estimated[last] = a[last] * x[last - 1] + b[last] * y[last - 1];
            residual[last] = y[last] - estimated[last];
        }

        let labels = residual[1..].iter().map(|&e| ResidualBand::classify(e)).collect();
        Ok(FilterState {
            measured: y.to_vec(),
            estimated,
            residual,
            coeff_a: a,
            coeff_b: b,
            labels,
        })
    }
}
