// src/hal/serial_driver.rs
//! Streaming serial device driver
//!
//! The device firmware prints one `ECG,EMG,EDA` line per sample as soon as the
//! port opens. Discovery probes every port for such a line and remembers the
//! port that answered so later sessions skip the probe.

use crate::config::constants::device::*;
use crate::hal::{
    CandidateConnection, ChannelSample, DeviceInfo, DeviceKind, DeviceSession, DeviceState,
    HalError, HalResult, LinkProvider, ReadBatch, SerialLink,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Streaming serial device configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingSerialConfig {
    /// Fixed port; discovery is skipped when set
    #[serde(default)]
    pub port_name: Option<String>,
    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "defaults::probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

mod defaults {
    use crate::config::constants::device::*;

    pub fn baud_rate() -> u32 { SERIAL_BAUD_RATE }
    pub fn read_timeout_ms() -> u64 { SERIAL_READ_TIMEOUT_MS }
    pub fn probe_timeout_ms() -> u64 { PROBE_TIMEOUT_MS }
}

impl Default for StreamingSerialConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: defaults::baud_rate(),
            read_timeout_ms: defaults::read_timeout_ms(),
            probe_timeout_ms: defaults::probe_timeout_ms(),
        }
    }
}

/// Port confirmed by an earlier discovery, shared across sessions
#[derive(Debug, Clone, Default)]
pub struct PortMemory {
    port: Arc<Mutex<Option<String>>>,
}

impl PortMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, address: &str) {
        *self.port.lock() = Some(address.to_string());
    }

    pub fn recall(&self) -> Option<String> {
        self.port.lock().clone()
    }

    pub fn forget(&self) {
        self.port.lock().take();
    }
}

/// Parse one wire line in `ECG,EMG,EDA` order
pub fn parse_wire_line(line: &str) -> HalResult<ChannelSample> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != WIRE_FIELD_COUNT {
        return Err(HalError::MalformedSample {
            input: line.to_string(),
            reason: format!("expected {} fields, got {}", WIRE_FIELD_COUNT, fields.len()),
        });
    }

    let mut values = [0.0f64; WIRE_FIELD_COUNT];
    for (position, (slot, field)) in values.iter_mut().zip(&fields).enumerate() {
        *slot = field
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| HalError::MalformedSample {
                input: line.to_string(),
                reason: format!("field {} ({:?}) is not numeric", position, field),
            })?;
    }

    Ok(ChannelSample {
        ecg: values[0],
        emg: values[1],
        eda: values[2],
    })
}

/// Buffered link that hands out complete lines and raw bytes
pub struct LinkStream {
    reader: BufReader<Box<dyn SerialLink>>,
    pending: String,
}

impl LinkStream {
    pub fn new(link: Box<dyn SerialLink>) -> Self {
        Self {
            reader: BufReader::new(link),
            pending: String::new(),
        }
    }

    /// Next complete line without its terminator; `None` when the read timed out
    pub fn next_line(&mut self) -> HalResult<Option<String>> {
        match self.reader.read_line(&mut self.pending) {
            Ok(0) => Err(HalError::Link("link closed by device".to_string())),
            Ok(_) if self.pending.ends_with('\n') => {
                let line = std::mem::take(&mut self.pending);
                Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
            }
            Ok(_) => Ok(None),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                self.pending.clear();
                Err(HalError::MalformedSample {
                    input: String::new(),
                    reason: "line is not valid UTF-8".to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Raw read; `Ok(None)` when the read timed out
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> HalResult<Option<usize>> {
        match self.reader.read(buf) {
            Ok(0) => Err(HalError::Link("link closed by device".to_string())),
            Ok(n) => Ok(Some(n)),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn send(&mut self, bytes: &[u8]) -> HalResult<()> {
        let link = self.reader.get_mut();
        link.write_all(bytes)?;
        link.flush()?;
        Ok(())
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// Ports of the host machine
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLinkProvider;

impl LinkProvider for SystemLinkProvider {
    fn list_ports(&self) -> HalResult<Vec<CandidateConnection>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|info| CandidateConnection {
                address: info.port_name,
                description: Some(format!("{:?}", info.port_type)),
            })
            .collect())
    }

    fn open(
        &self,
        address: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> HalResult<Box<dyn SerialLink>> {
        let port = serialport::new(address, baud_rate)
            .timeout(read_timeout)
            .open()?;
        Ok(Box::new(port))
    }
}

/// Device streaming CSV lines over a serial port
pub struct StreamingSerialDevice {
    config: StreamingSerialConfig,
    provider: Arc<dyn LinkProvider>,
    memory: PortMemory,
    stream: Option<LinkStream>,
    state: DeviceState,
    address: Option<String>,
    malformed: u64,
}

impl StreamingSerialDevice {
    pub fn new(
        config: StreamingSerialConfig,
        provider: Arc<dyn LinkProvider>,
        memory: PortMemory,
    ) -> Self {
        Self {
            config,
            provider,
            memory,
            stream: None,
            state: DeviceState::Disconnected,
            address: None,
            malformed: 0,
        }
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.config.read_timeout_ms)
    }

    /// Whether `address` emits a well-formed line within the probe timeout
    fn probe(&self, address: &str) -> bool {
        let link = match self
            .provider
            .open(address, self.config.baud_rate, self.read_timeout())
        {
            Ok(link) => link,
            Err(e) => {
                debug!(address, error = %e, "probe could not open port");
                return false;
            }
        };

        let mut stream = LinkStream::new(link);
        let give_up_at = Instant::now() + Duration::from_millis(self.config.probe_timeout_ms);
        while Instant::now() < give_up_at {
            match stream.next_line() {
                // The first line after opening may be a fragment
                Ok(Some(line)) => match parse_wire_line(&line) {
                    Ok(_) => return true,
                    Err(e) => debug!(address, error = %e, "probe line rejected"),
                },
                Ok(None) => continue,
                Err(e) if e.is_recoverable() => continue,
                Err(e) => {
                    debug!(address, error = %e, "probe failed");
                    return false;
                }
            }
        }
        false
    }

    fn require_state(&self, operation: &'static str, expected: DeviceState) -> HalResult<()> {
        if self.state != expected {
            return Err(HalError::InvalidState {
                operation,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

impl DeviceSession for StreamingSerialDevice {
    fn discover(&mut self) -> HalResult<Vec<CandidateConnection>> {
        if let Some(port) = &self.config.port_name {
            return Ok(vec![CandidateConnection::new(port.clone())]);
        }
        if let Some(port) = self.memory.recall() {
            debug!(port = %port, "reusing remembered port");
            return Ok(vec![CandidateConnection::new(port)]);
        }

        for candidate in self.provider.list_ports()? {
            debug!(address = %candidate.address, "probing port");
            if self.probe(&candidate.address) {
                info!(address = %candidate.address, "streaming device found");
                return Ok(vec![candidate]);
            }
        }
        Ok(Vec::new())
    }

    fn connect(&mut self, candidate: &CandidateConnection) -> HalResult<()> {
        self.state = DeviceState::Connecting;
        match self
            .provider
            .open(&candidate.address, self.config.baud_rate, self.read_timeout())
        {
            Ok(link) => {
                self.memory.remember(&candidate.address);
                self.stream = Some(LinkStream::new(link));
                self.address = Some(candidate.address.clone());
                self.malformed = 0;
                self.state = DeviceState::Connected;
                Ok(())
            }
            Err(e) => {
                if self.memory.recall().as_deref() == Some(candidate.address.as_str()) {
                    self.memory.forget();
                }
                self.state = DeviceState::Disconnected;
                Err(e)
            }
        }
    }

    fn start(&mut self, _rate_hz: u32) -> HalResult<()> {
        if self.state == DeviceState::Stopped {
            self.state = DeviceState::Connected;
        }
        self.require_state("start", DeviceState::Connected)?;
        self.state = DeviceState::Streaming;
        Ok(())
    }

    fn read(&mut self, rate_hz: u32) -> HalResult<ReadBatch> {
        self.require_state("read", DeviceState::Streaming)?;
        let stream = self.stream.as_mut().ok_or(HalError::InvalidState {
            operation: "read",
            expected: DeviceState::Streaming,
            actual: DeviceState::Disconnected,
        })?;

        let wanted = rate_hz.max(1) as usize;
        let give_up_at = Instant::now() + Duration::from_millis(READ_BATCH_TIMEOUT_MS);
        let mut batch = Vec::with_capacity(wanted);

        while batch.len() < wanted && Instant::now() < give_up_at {
            match stream.next_line() {
                Ok(Some(line)) => match parse_wire_line(&line) {
                    Ok(sample) => batch.push(sample),
                    Err(e) => {
                        self.malformed += 1;
                        warn!(error = %e, "dropping malformed sample");
                    }
                },
                Ok(None) => continue,
                Err(e) if e.is_recoverable() => {
                    self.malformed += 1;
                    warn!(error = %e, "dropping malformed sample");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(batch)
    }

    fn stop(&mut self) -> HalResult<()> {
        self.require_state("stop", DeviceState::Streaming)?;
        self.state = DeviceState::Stopped;
        Ok(())
    }

    fn close(&mut self) -> HalResult<()> {
        self.stream = None;
        self.state = DeviceState::Disconnected;
        Ok(())
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial biosignal streamer".to_string(),
            kind: DeviceKind::StreamingSerial,
            address: self.address.clone(),
            supported_rates_hz: Vec::new(),
        }
    }

    fn malformed_count(&self) -> u64 {
        self.malformed
    }
}
