// src/hal/tests.rs
//! Unit tests for HAL drivers against simulated ports

use crate::hal::*;
use std::sync::Arc;

fn fast_serial_config() -> StreamingSerialConfig {
    StreamingSerialConfig {
        port_name: None,
        read_timeout_ms: 5,
        probe_timeout_ms: 200,
        ..StreamingSerialConfig::default()
    }
}

fn fast_bitalino_config(attempts: u32) -> BitalinoConfig {
    BitalinoConfig {
        address: Some("bt0".to_string()),
        read_timeout_ms: 5,
        connect_attempts: attempts,
        retry_delay_ms: 1,
        handshake_timeout_ms: 100,
        ..BitalinoConfig::default()
    }
}

fn csv_port(name: &str, lines: usize) -> SimulatedPort {
    SimulatedPort::new(
        name,
        PortBehavior::CsvLines(vec!["200,100,50".to_string(); lines]),
    )
}

#[test]
fn test_discovery_skips_ports_without_protocol() {
    let provider = SimulatedLinkProvider::new(vec![
        SimulatedPort::new("quiet", PortBehavior::Silent),
        SimulatedPort::new("chatty", PortBehavior::CsvLines(vec!["hello".to_string(); 3])),
        csv_port("esp32", 10),
    ]);
    let memory = PortMemory::new();
    let mut device =
        StreamingSerialDevice::new(fast_serial_config(), Arc::new(provider), memory.clone());

    let candidates = device.discover().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].address, "esp32");

    device.connect(&candidates[0]).unwrap();
    assert_eq!(device.state(), DeviceState::Connected);
    assert_eq!(memory.recall().as_deref(), Some("esp32"));
}

#[test]
fn test_remembered_port_is_not_probed_again() {
    let provider = SimulatedLinkProvider::new(vec![csv_port("esp32", 10)]);
    let memory = PortMemory::new();

    let mut first =
        StreamingSerialDevice::new(fast_serial_config(), Arc::new(provider.clone()), memory.clone());
    first.open().unwrap();
    first.close().unwrap();
    let opens_after_first = provider.open_count("esp32");

    let mut second =
        StreamingSerialDevice::new(fast_serial_config(), Arc::new(provider.clone()), memory);
    let candidates = second.discover().unwrap();
    assert_eq!(candidates[0].address, "esp32");
    assert_eq!(provider.open_count("esp32"), opens_after_first);
}

#[test]
fn test_open_without_matching_port_is_device_not_found() {
    let provider =
        SimulatedLinkProvider::new(vec![SimulatedPort::new("quiet", PortBehavior::Silent)]);
    let mut device =
        StreamingSerialDevice::new(fast_serial_config(), Arc::new(provider), PortMemory::new());

    assert!(matches!(device.open(), Err(HalError::DeviceNotFound { .. })));
    assert_eq!(device.state(), DeviceState::Disconnected);
}

#[test]
fn test_streaming_read_returns_one_second_batch() {
    let provider = SimulatedLinkProvider::new(vec![csv_port("esp32", 250)]);
    let mut device =
        StreamingSerialDevice::new(fast_serial_config(), Arc::new(provider), PortMemory::new());
    device.open().unwrap();
    device.start(100).unwrap();

    let batch = device.read(100).unwrap();
    assert_eq!(batch.len(), 100);
    assert!(batch
        .iter()
        .all(|s| *s == ChannelSample::new(100.0, 200.0, 50.0)));
}

#[test]
fn test_malformed_lines_are_dropped_and_counted() {
    let lines = vec![
        "200,100,50".to_string(),
        "200,100".to_string(),
        "x,y,z".to_string(),
        "201,101,51".to_string(),
    ];
    let provider =
        SimulatedLinkProvider::new(vec![SimulatedPort::new("esp32", PortBehavior::CsvLines(lines))]);
    let mut device = StreamingSerialDevice::new(
        StreamingSerialConfig {
            port_name: Some("esp32".to_string()),
            ..fast_serial_config()
        },
        Arc::new(provider),
        PortMemory::new(),
    );
    device.open().unwrap();
    device.start(4).unwrap();

    let batch = device.read(4).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[1], ChannelSample::new(101.0, 201.0, 51.0));
    assert_eq!(device.malformed_count(), 2);
}

#[test]
fn test_read_after_stop_is_an_error() {
    let provider = SimulatedLinkProvider::new(vec![csv_port("esp32", 10)]);
    let mut device =
        StreamingSerialDevice::new(fast_serial_config(), Arc::new(provider), PortMemory::new());
    device.open().unwrap();
    device.start(10).unwrap();
    device.stop().unwrap();

    assert!(matches!(
        device.read(10),
        Err(HalError::InvalidState { operation: "read", .. })
    ));
    device.close().unwrap();
    assert_eq!(device.state(), DeviceState::Disconnected);
}

#[test]
fn test_bitalino_connect_retries_until_board_answers() {
    let provider = SimulatedLinkProvider::new(vec![SimulatedPort::new(
        "bt0",
        PortBehavior::Bitalino { rows: Vec::new() },
    )
    .failing_first(2)]);
    let mut device = BitalinoDevice::new(fast_bitalino_config(5), Arc::new(provider.clone()));

    device.open().unwrap();
    assert_eq!(device.state(), DeviceState::Connected);
    assert_eq!(provider.open_count("bt0"), 3);
    assert_eq!(device.firmware(), Some(simulator::SIMULATED_FIRMWARE));
}

#[test]
fn test_bitalino_gives_up_after_configured_attempts() {
    let provider = SimulatedLinkProvider::new(vec![SimulatedPort::new(
        "bt0",
        PortBehavior::Bitalino { rows: Vec::new() },
    )
    .failing_first(10)]);
    let mut device = BitalinoDevice::new(fast_bitalino_config(5), Arc::new(provider.clone()));

    assert!(matches!(device.open(), Err(HalError::DeviceNotFound { .. })));
    assert_eq!(provider.open_count("bt0"), 5);
    assert_eq!(device.state(), DeviceState::Disconnected);
}

#[test]
fn test_bitalino_handshake_skips_undecodable_noise() {
    let provider = SimulatedLinkProvider::new(vec![SimulatedPort::new(
        "bt0",
        PortBehavior::Bitalino { rows: Vec::new() },
    )
    .with_leading_bytes(&[0xFF, 0xFE, 0x80, b'\n'])]);
    let mut device = BitalinoDevice::new(fast_bitalino_config(1), Arc::new(provider.clone()));

    device.open().unwrap();
    assert_eq!(provider.open_count("bt0"), 1);
    assert_eq!(device.firmware(), Some(simulator::SIMULATED_FIRMWARE));
}

#[test]
fn test_bitalino_streams_a1_a2_a3_after_start() {
    let rows = vec![[100, 200, 50, 7, 8, 9]; 30];
    let provider =
        SimulatedLinkProvider::new(vec![SimulatedPort::new("bt0", PortBehavior::Bitalino { rows })]);
    let mut device = BitalinoDevice::new(fast_bitalino_config(1), Arc::new(provider.clone()));
    device.open().unwrap();
    device.start(10).unwrap();

    let batch = device.read(10).unwrap();
    assert_eq!(batch.len(), 10);
    assert!(batch
        .iter()
        .all(|s| *s == ChannelSample::new(100.0, 200.0, 50.0)));

    device.stop().unwrap();
    assert_eq!(provider.written(), vec![0x07, 0x43, 0xFD, 0x00]);
    assert_eq!(device.device_info().supported_rates_hz, vec![1, 10, 100, 1000]);
}

#[test]
fn test_bitalino_rejects_unsupported_rate() {
    let provider = SimulatedLinkProvider::new(vec![SimulatedPort::new(
        "bt0",
        PortBehavior::Bitalino { rows: Vec::new() },
    )]);
    let mut device = BitalinoDevice::new(fast_bitalino_config(1), Arc::new(provider));
    device.open().unwrap();

    assert!(matches!(device.start(250), Err(HalError::UnsupportedRate(250))));
    assert_eq!(device.state(), DeviceState::Connected);
}

#[test]
fn test_factory_builds_simulated_streamer() {
    let config = crate::config::DeviceConfig {
        backend: DeviceKind::Simulator,
        simulator: SimulatorConfig {
            sample_count: 20,
            lines_per_second: None,
            ..SimulatorConfig::default()
        },
        ..crate::config::DeviceConfig::default()
    };
    let mut device = DeviceFactory::create(&config, PortMemory::new());
    let candidate = device.open().unwrap();
    assert_eq!(candidate.address, simulator::SIMULATED_PORT_NAME);
    assert_eq!(device.device_info().kind, DeviceKind::StreamingSerial);
}
