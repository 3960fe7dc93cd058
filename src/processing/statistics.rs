// src/processing/statistics.rs
//! Summary statistics and baseline/test comparison
//!
//! Every statistic is rounded to three decimals before it is compared, so
//! the percent differences match the values shown in reports.

use crate::config::constants::analysis::{FLAG_LIMITS_PERCENT, STATS_DECIMALS};
use crate::processing::AnalysisError;
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Names of the four statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    Max,
    Min,
    Mean,
    StdDev,
}

impl StatKey {
    pub const ALL: [StatKey; 4] = [StatKey::Max, StatKey::Min, StatKey::Mean, StatKey::StdDev];

    pub fn name(self) -> &'static str {
        match self {
            StatKey::Max => "max",
            StatKey::Min => "min",
            StatKey::Mean => "mean",
            StatKey::StdDev => "std_dev",
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rounded summary of one sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl SignalStats {
    pub fn get(&self, key: StatKey) -> f64 {
        match key {
            StatKey::Max => self.max,
            StatKey::Min => self.min,
            StatKey::Mean => self.mean,
            StatKey::StdDev => self.std_dev,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (StatKey, f64)> + '_ {
        StatKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

/// Qualitative size of a baseline/test change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityFlag {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl SeverityFlag {
    /// Band for a percent difference; only the magnitude counts
    pub fn from_percent(percent: f64) -> Self {
        let magnitude = percent.abs();
        let [normal, mild, moderate] = FLAG_LIMITS_PERCENT;
        if magnitude <= normal {
            SeverityFlag::Normal
        } else if magnitude <= mild {
            SeverityFlag::Mild
        } else if magnitude <= moderate {
            SeverityFlag::Moderate
        } else {
            // Also catches NaN
            SeverityFlag::Severe
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeverityFlag::Normal => "Normal",
            SeverityFlag::Mild => "Mild Response",
            SeverityFlag::Moderate => "Moderate Response",
            SeverityFlag::Severe => "Severe Response",
        }
    }
}

impl fmt::Display for SeverityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sign of a baseline/test change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    Unchanged,
}

impl Direction {
    pub fn between(baseline: f64, test: f64) -> Self {
        if test > baseline {
            Direction::Increase
        } else if test < baseline {
            Direction::Decrease
        } else {
            Direction::Unchanged
        }
    }
}

fn mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

fn population_std(data: &[f64], mean: f64) -> f64 {
    (data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

/// Max, min, mean and standard deviation of `data`, rounded to three decimals
pub fn calculate_stats(data: &[f64]) -> Result<SignalStats, AnalysisError> {
    if data.is_empty() {
        return Err(AnalysisError::EmptySequence);
    }
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let mean = mean(data);
    let std_dev = population_std(data, mean);

    Ok(SignalStats {
        max: round_to(max, STATS_DECIMALS),
        min: round_to(min, STATS_DECIMALS),
        mean: round_to(mean, STATS_DECIMALS),
        std_dev: round_to(std_dev, STATS_DECIMALS),
    })
}

/// Stats for each full section of `section_size` samples, keyed from 1.
///
/// A trailing partial section is dropped; a sequence shorter than one
/// section yields an empty map.
pub fn calculate_sectioned_stats(
    data: &[f64],
    section_size: usize,
) -> Result<BTreeMap<usize, SignalStats>, AnalysisError> {
    if section_size == 0 {
        return Err(AnalysisError::InvalidSectionSize);
    }
    data.chunks_exact(section_size)
        .enumerate()
        .map(|(i, section)| calculate_stats(section).map(|s| (i + 1, s)))
        .collect()
}

/// `|test - baseline| / |baseline| * 100` per statistic; `+inf` when the baseline is zero
pub fn calculate_percent_difference(
    baseline: &SignalStats,
    test: &SignalStats,
) -> BTreeMap<StatKey, f64> {
    StatKey::ALL
        .into_iter()
        .map(|key| (key, percent_change(baseline.get(key), test.get(key))))
        .collect()
}

fn percent_change(baseline: f64, test: f64) -> f64 {
    if baseline == 0.0 {
        f64::INFINITY
    } else {
        (test - baseline).abs() / baseline.abs() * 100.0
    }
}

/// Severity band for every percent difference
pub fn assign_flags<K: Ord + Clone>(percent_diff: &BTreeMap<K, f64>) -> BTreeMap<K, SeverityFlag> {
    percent_diff
        .iter()
        .map(|(k, &v)| (k.clone(), SeverityFlag::from_percent(v)))
        .collect()
}

/// Direction of change for every statistic
pub fn directions(baseline: &SignalStats, test: &SignalStats) -> BTreeMap<StatKey, Direction> {
    StatKey::ALL
        .into_iter()
        .map(|key| (key, Direction::between(baseline.get(key), test.get(key))))
        .collect()
}

/// Comparison of one section present in both phases
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionComparison {
    pub percent_diff: BTreeMap<StatKey, f64>,
    pub flags: BTreeMap<StatKey, SeverityFlag>,
    pub directions: BTreeMap<StatKey, Direction>,
}

/// Compare the sections that exist in both phases
pub fn compare_sections(
    baseline: &BTreeMap<usize, SignalStats>,
    test: &BTreeMap<usize, SignalStats>,
) -> BTreeMap<usize, SectionComparison> {
    baseline
        .iter()
        .filter_map(|(section, b)| {
            let t = test.get(section)?;
            let percent_diff = calculate_percent_difference(b, t);
            let flags = assign_flags(&percent_diff);
            Some((
                *section,
                SectionComparison {
                    flags,
                    directions: directions(b, t),
                    percent_diff,
                },
            ))
        })
        .collect()
}

/// Named numeric features handed to classification
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureSet {
    features: Vec<(String, f64)>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Features from a percent-difference map, named `<prefix>.<stat>`
    pub fn from_percent_diff(prefix: &str, percent_diff: &BTreeMap<StatKey, f64>) -> Self {
        let mut set = Self::new();
        for (key, value) in percent_diff {
            set.push(format!("{}.{}", prefix, key), *value);
        }
        set
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.features.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Fails on the first NaN or infinite feature
    pub fn validate(&self) -> Result<(), AnalysisError> {
        match self.features.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, value)) => Err(AnalysisError::InvalidFeatureSet {
                feature: name.clone(),
                value: *value,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_stats() {
        let stats = calculate_stats(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.std_dev, 1.118);
    }

    #[test]
    fn test_empty_sequence_is_an_error() {
        assert!(matches!(calculate_stats(&[]), Err(AnalysisError::EmptySequence)));
    }

    #[test]
    fn test_sectioned_stats() {
        let sections =
            calculate_sectioned_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).unwrap();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[&1].max, 2.0);
        assert_eq!(sections[&1].min, 1.0);
        assert_eq!(sections[&1].mean, 1.5);
        assert_eq!(sections[&1].std_dev, 0.5);
        assert_eq!(sections[&2].mean, 3.5);
        assert_eq!(sections[&3].mean, 5.5);
    }

    #[test]
    fn test_trailing_partial_section_dropped() {
        let sections = calculate_sectioned_stats(&[1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert_eq!(sections.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        assert!(calculate_sectioned_stats(&[1.0], 2).unwrap().is_empty());
        assert!(matches!(
            calculate_sectioned_stats(&[1.0], 0),
            Err(AnalysisError::InvalidSectionSize)
        ));
    }

    #[test]
    fn test_percent_difference() {
        let baseline = SignalStats { max: 10.0, min: -4.0, mean: 0.0, std_dev: 2.0 };
        let test = SignalStats { max: 12.0, min: -3.0, mean: 1.0, std_dev: 2.0 };
        let diff = calculate_percent_difference(&baseline, &test);

        assert!((diff[&StatKey::Max] - 20.0).abs() < 1e-12);
        assert!((diff[&StatKey::Min] - 25.0).abs() < 1e-12);
        assert_eq!(diff[&StatKey::Mean], f64::INFINITY);
        assert_eq!(diff[&StatKey::StdDev], 0.0);

        let flags = assign_flags(&diff);
        assert_eq!(flags[&StatKey::Max], SeverityFlag::Mild);
        assert_eq!(flags[&StatKey::Min], SeverityFlag::Mild);
        assert_eq!(flags[&StatKey::Mean], SeverityFlag::Severe);
        assert_eq!(flags[&StatKey::StdDev], SeverityFlag::Normal);

        let dirs = directions(&baseline, &test);
        assert_eq!(dirs[&StatKey::Max], Direction::Increase);
        assert_eq!(dirs[&StatKey::StdDev], Direction::Unchanged);
    }

    #[test]
    fn test_flag_bands_are_symmetric() {
        for (percent, flag) in [
            (15.0, SeverityFlag::Normal),
            (15.01, SeverityFlag::Mild),
            (25.0, SeverityFlag::Mild),
            (35.0, SeverityFlag::Moderate),
            (35.5, SeverityFlag::Severe),
            (f64::NAN, SeverityFlag::Severe),
        ] {
            assert_eq!(SeverityFlag::from_percent(percent), flag);
            assert_eq!(SeverityFlag::from_percent(-percent), flag);
        }
    }

    #[test]
    fn test_compare_sections_uses_common_keys() {
        let baseline = calculate_sectioned_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).unwrap();
        let test = calculate_sectioned_stats(&[1.0, 2.0, 6.0, 8.0], 2).unwrap();
        let comparison = compare_sections(&baseline, &test);

        assert_eq!(comparison.len(), 2);
        assert_eq!(comparison[&1].flags[&StatKey::Max], SeverityFlag::Normal);
        assert_eq!(comparison[&2].flags[&StatKey::Max], SeverityFlag::Severe);
        assert_eq!(comparison[&2].directions[&StatKey::Mean], Direction::Increase);
    }

    #[test]
    fn test_feature_set_validation() {
        let mut features = FeatureSet::new();
        features.push("emg.max", 12.5);
        assert!(features.validate().is_ok());

        features.push("emg.mean", f64::INFINITY);
        match features.validate() {
            Err(AnalysisError::InvalidFeatureSet { feature, .. }) => assert_eq!(feature, "emg.mean"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
