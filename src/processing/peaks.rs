// src/processing/peaks.rs
//! Threshold peak picking and peak rate

use crate::utils::round_to;
use serde::Serialize;

/// Local maximum of one above-threshold run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub index: usize,
    pub value: f64,
}

/// `max - std` over the first `window_seconds` of `data`
pub fn simple_threshold(data: &[f64], window_seconds: u32, sample_rate: u32) -> Option<f64> {
    let window = (window_seconds as usize * sample_rate as usize).min(data.len());
    let section = &data[..window];
    if section.is_empty() {
        return None;
    }
    let max = section.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = section.iter().sum::<f64>() / section.len() as f64;
    let std = (section.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / section.len() as f64).sqrt();
    Some(max - std.abs())
}

/// Highest sample of every contiguous run strictly above `threshold`.
///
/// A run still open at the end of the data is not reported.
pub fn peak_locations(data: &[f64], threshold: f64) -> Vec<Peak> {
    let mut peaks = Vec::new();
    let mut current: Option<Peak> = None;

    for (index, &value) in data.iter().enumerate() {
        if value > threshold {
            match &mut current {
                Some(best) if value <= best.value => {}
                _ => current = Some(Peak { index, value }),
            }
        } else if let Some(best) = current.take() {
            peaks.push(best);
        }
    }
    peaks
}

/// Events per minute from the mean spacing of `peaks`, to two decimals
pub fn peak_rate(peaks: &[Peak], sample_rate: u32) -> Option<f64> {
    if peaks.len() < 2 || sample_rate == 0 {
        return None;
    }
    let mut indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
    indices.sort_unstable();

    let span = (indices[indices.len() - 1] - indices[0]) as f64 / f64::from(sample_rate);
    let mean_interval = span / (indices.len() - 1) as f64;
    if mean_interval <= 0.0 {
        return None;
    }
    Some(round_to(60.0 / mean_interval, 2))
}
