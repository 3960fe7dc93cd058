// tests/analysis_pipeline.rs
//! Offline analysis from sample logs on disk

use soundsense_core::acquisition::{read_sample_log, write_sample_log, SampleLog};
use soundsense_core::config::{AnalysisConfig, ChannelSelection};
use soundsense_core::processing::{AnalysisPipeline, ResidualBand, SeverityFlag, StatKey};
use soundsense_core::{Channel, ChannelSample};
use std::f64::consts::TAU;
use tempfile::tempdir;

const RATE: u32 = 200;

/// Ten seconds of a 1.25 Hz pulse on ECG, slow waves on EMG and EDA
fn synthetic_log(emg_gain: f64, eda_offset: f64) -> SampleLog {
    let rows: Vec<ChannelSample> = (0..RATE as usize * 10)
        .map(|i| {
            let t = i as f64 / RATE as f64;
            let pulse = if i % 160 < 4 { 1.0 } else { 0.0 };
            ChannelSample::new(
                emg_gain * (0.5 + 0.2 * (TAU * 0.5 * t).sin()),
                0.1 + pulse,
                eda_offset + 0.01 * t,
            )
        })
        .collect();
    SampleLog::from_rows(&rows)
}

fn pipeline() -> AnalysisPipeline {
    let config = AnalysisConfig {
        section_size: 400,
        ..AnalysisConfig::default()
    };
    AnalysisPipeline::new(config, RATE, ChannelSelection::ALL)
}

#[test]
fn test_logs_survive_disk_and_grade() {
    let dir = tempdir().unwrap();
    let baseline_path = dir.path().join("baseline_sequence.txt");
    let test_path = dir.path().join("test_sequence.txt");
    write_sample_log(&baseline_path, &synthetic_log(1.0, 2.0)).unwrap();
    write_sample_log(&test_path, &synthetic_log(2.0, 2.0)).unwrap();

    let baseline = read_sample_log(&baseline_path).unwrap();
    let test = read_sample_log(&test_path).unwrap();
    assert_eq!(baseline, synthetic_log(1.0, 2.0));

    let pipeline = pipeline();
    let report = pipeline.compare(
        &pipeline.analyze_phase(&baseline).unwrap(),
        &pipeline.analyze_phase(&test).unwrap(),
    );

    let ecg = report.channel(Channel::Ecg).unwrap();
    assert_eq!(ecg.overall, Some(SeverityFlag::Normal));
    assert_eq!(ecg.baseline_peak_rate, Some(75.0));
    assert_eq!(ecg.sections.len(), 5);

    let emg = report.channel(Channel::Emg).unwrap();
    assert_eq!(emg.flags[&StatKey::Mean], SeverityFlag::Severe);
    assert_eq!(emg.overall, Some(SeverityFlag::Severe));

    let eda = report.channel(Channel::Eda).unwrap();
    assert_eq!(eda.flags[&StatKey::Mean], SeverityFlag::Normal);
    assert_eq!(eda.baseline_filter.measured.len(), 2000);
    assert_eq!(eda.baseline_filter.severity_labels.len(), 1999);
    assert_eq!(eda.baseline_filter.section_labels.len(), 10);
    assert_eq!(eda.baseline_filter.dominant_label, Some(ResidualBand::Normal));

    let path = dir.path().join("analysis_report.json");
    report.write_json(&path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["channels"].as_array().unwrap().len(), 3);
    assert_eq!(json["channels"][0]["channel"], "emg");
}

#[test]
fn test_disabled_channels_are_left_out() {
    let config = AnalysisConfig {
        section_size: 400,
        ..AnalysisConfig::default()
    };
    let selection = ChannelSelection { emg: false, ecg: true, eda: false };
    let pipeline = AnalysisPipeline::new(config, RATE, selection);

    let phase = pipeline.analyze_phase(&synthetic_log(1.0, 2.0)).unwrap();
    let report = pipeline.compare(&phase, &phase);
    assert_eq!(report.channels.len(), 1);
    assert_eq!(report.channels[0].channel, Channel::Ecg);
    assert!(report.channels[0].percent_diff.values().all(|&p| p == 0.0));
}
