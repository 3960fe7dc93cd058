// tests/acquisition_integration.rs
//! End-to-end acquisition against the simulated streaming device

use soundsense_core::acquisition::{AcquisitionWorker, SampleStore, StopReason};
use soundsense_core::config::{ChannelSelection, RecordingConfig, StimulusDescriptor};
use soundsense_core::hal::{
    DeviceFactory, DeviceSession, PortMemory, SimulatorConfig,
};
use soundsense_core::{Channel, Deadline, SampleLog};
use std::sync::Arc;

fn recording(channels: [bool; 3]) -> Arc<RecordingConfig> {
    Arc::new(RecordingConfig {
        sample_rate: 100,
        duration: 15,
        channels: channels.into(),
        stimulus: StimulusDescriptor::Frequency(1000),
        step_interval: 5,
        step_db: 5.0,
        starting_volume_db: -30.0,
    })
}

/// 1500 noise-free `ECG,EMG,EDA` lines of `200,100,50`, all available at once
fn device(malformed_every: Option<usize>) -> Box<dyn DeviceSession> {
    let config = SimulatorConfig {
        sample_count: 1500,
        lines_per_second: None,
        ecg_level: 200.0,
        emg_level: 100.0,
        eda_level: 50.0,
        noise_amplitude: 0.0,
        malformed_every,
        ..SimulatorConfig::default()
    };
    let mut device = DeviceFactory::create_simulator(&config, PortMemory::new());
    device.open().expect("simulated device should be found");
    device
}

fn record(config: Arc<RecordingConfig>, device: Box<dyn DeviceSession>) -> (SampleLog, StopReason) {
    let (writer, reader) = SampleStore::new(config.target_samples());
    let deadline = Deadline::after(config.session_duration());
    let report = AcquisitionWorker::new(device, config, writer, deadline)
        .run()
        .expect("acquisition failed");
    (reader.snapshot(), report.stop_reason)
}

#[test]
fn test_all_channels_fill_to_target() {
    let (log, reason) = record(recording([true, true, true]), device(None));

    assert_eq!(reason, StopReason::TargetReached);
    assert_eq!(log.len(), 1500);
    for channel in Channel::ALL {
        assert_eq!(log.channel(channel).len(), 1500);
    }
    assert!(log.channel(Channel::Ecg).iter().all(|&v| v == 200.0));
    assert!(log.channel(Channel::Emg).iter().all(|&v| v == 100.0));
    assert!(log.channel(Channel::Eda).iter().all(|&v| v == 50.0));
}

#[test]
fn test_disabled_channel_holds_placeholder() {
    let (log, _) = record(recording([true, true, false]), device(None));

    assert_eq!(log.channel(Channel::Eda), vec![1.0; 1500].as_slice());
    assert_eq!(log.channel(Channel::Emg).len(), 1500);
    assert_eq!(log.channel(Channel::Ecg).len(), 1500);
    assert!(log.channel(Channel::Emg).iter().all(|&v| v == 100.0));
    assert!(log.channel(Channel::Ecg).iter().all(|&v| v == 200.0));
}

#[test]
fn test_every_selection_keeps_channels_aligned() {
    for mask in 1u8..8 {
        let channels = [mask & 1 != 0, mask & 2 != 0, mask & 4 != 0];
        let config = recording(channels);
        let selection: ChannelSelection = channels.into();
        let (log, _) = record(config, device(None));

        for channel in Channel::ALL {
            let values = log.channel(channel);
            assert_eq!(values.len(), log.len());
            if selection.is_enabled(channel) {
                assert!(values.iter().all(|&v| v != 1.0));
            } else {
                assert!(values.iter().all(|&v| v == 1.0));
            }
        }
    }
}

#[test]
fn test_malformed_lines_are_skipped_for_every_channel() {
    // Every 10th line is garbage, so 1350 of the 1500 lines are usable
    let config = recording([true, true, true]);
    let (writer, reader) = SampleStore::new(config.target_samples());
    let deadline = Deadline::after(std::time::Duration::from_secs(3));
    let report = AcquisitionWorker::new(device(Some(10)), config, writer, deadline)
        .run()
        .expect("acquisition failed");

    let log = reader.snapshot();
    assert_eq!(report.malformed, 150);
    assert_eq!(report.samples, 1350);
    assert_eq!(report.stop_reason, StopReason::DeadlineElapsed);
    for channel in Channel::ALL {
        assert_eq!(log.channel(channel).len(), 1350);
    }
}
