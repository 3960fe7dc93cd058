// tests/session_integration.rs
//! Full baseline/test sessions against the simulator

use soundsense_core::config::{ChannelSelection, RecordingConfig, StimulusDescriptor, SystemConfig};
use soundsense_core::hal::{DeviceFactory, DeviceKind, PortMemory, SimulatorConfig};
use soundsense_core::live_view::ChannelRenderer;
use soundsense_core::processing::AnalysisPipeline;
use soundsense_core::session::{Phase, RecordingSession};
use soundsense_core::stimulus::{PlaybackKind, TimedSink};
use soundsense_core::Channel;
use std::time::{Duration, Instant};

fn recording(duration: u32) -> RecordingConfig {
    RecordingConfig {
        sample_rate: 100,
        duration,
        channels: ChannelSelection::ALL,
        stimulus: StimulusDescriptor::Frequency(1000),
        step_interval: 1,
        step_db: 5.0,
        starting_volume_db: -30.0,
    }
}

fn simulated_system() -> SystemConfig {
    let mut system = SystemConfig::default();
    system.device.backend = DeviceKind::Simulator;
    system.device.simulator = SimulatorConfig {
        sample_count: 10_000,
        lines_per_second: Some(100),
        ..SimulatorConfig::default()
    };
    system.live_view.readiness_threshold = 50;
    system
}

#[test]
fn test_test_phase_runs_all_workers() {
    let sink = TimedSink::realtime();
    let (renderer, frames) = ChannelRenderer::bounded(64);
    let started = Instant::now();

    let outcome = RecordingSession::new(recording(3), simulated_system())
        .unwrap()
        .with_renderer(Box::new(renderer))
        .with_sink(Box::new(sink.clone()))
        .run(Phase::Test)
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(6));

    let len = outcome.log.len();
    assert!(len > 0 && len <= 300);
    for channel in Channel::ALL {
        assert_eq!(outcome.log.channel(channel).len(), len);
    }

    assert!(outcome.live_view.barrier_opened);
    assert!(outcome.live_view.max_window_len <= 150);
    assert!(frames.try_iter().count() > 0);

    // The stimulus waits for the barrier, so the last step may be cut short
    let stimulus = outcome.stimulus.expect("test phase plays the stimulus");
    assert!(stimulus.started);
    assert!(stimulus.steps_played >= 2);
    let events = sink.events();
    assert_eq!(events[0].volume_db, -30.0);
    assert_eq!(events[1].volume_db, -25.0);
    assert!(events.iter().all(|e| e.kind == PlaybackKind::Tone { frequency_hz: 1000 }));
}

#[test]
fn test_baseline_then_test_share_the_port_and_grade() {
    let memory = PortMemory::new();
    let system = simulated_system();

    let baseline = RecordingSession::new(recording(2), system.clone())
        .unwrap()
        .with_port_memory(memory.clone())
        .run(Phase::Baseline)
        .unwrap();
    assert!(baseline.stimulus.is_none());
    assert_eq!(memory.recall().as_deref(), Some("sim0"));

    let test = RecordingSession::new(recording(2), system.clone())
        .unwrap()
        .with_port_memory(memory.clone())
        .with_sink(Box::new(TimedSink::instant()))
        .run(Phase::Test)
        .unwrap();

    let mut analysis = system.analysis.clone();
    analysis.section_size = 50;
    let pipeline = AnalysisPipeline::new(analysis, 100, ChannelSelection::ALL);
    let report = pipeline.compare(
        &pipeline.analyze_phase(&baseline.log).unwrap(),
        &pipeline.analyze_phase(&test.log).unwrap(),
    );
    assert_eq!(report.channels.len(), 3);
    for channel in &report.channels {
        assert_eq!(channel.flags.len(), 4);
        assert!(!channel.sections.is_empty());
    }
}

#[test]
fn test_device_factory_builds_simulator_from_config() {
    let system = simulated_system();
    let mut device = DeviceFactory::create(&system.device, PortMemory::new());
    let candidate = device.open().unwrap();
    assert_eq!(candidate.address, "sim0");
    device.close().unwrap();
}
