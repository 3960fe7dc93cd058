//! In-memory device links for development and testing
//!
//! [`SimulatedLinkProvider`] stands in for the host's serial ports. Each
//! simulated port replays a script: CSV lines like the streaming firmware,
//! BITalino frames served after a start command, or nothing at all. Reads
//! behave like a real port with a timeout, including the wait when idle.

use crate::hal::bitalino::{encode_frame, STOP_COMMAND, VERSION_COMMAND};
use crate::hal::{CandidateConnection, HalError, HalResult, LinkProvider, SerialLink};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Port name used by the configured simulator device
pub const SIMULATED_PORT_NAME: &str = "sim0";

/// Firmware string the simulated board answers a version request with
pub const SIMULATED_FIRMWARE: &str = "BITalino_v5.2";

/// Simulator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Lines emitted before the simulated device goes quiet
    pub sample_count: usize,
    /// Pace lines in real time; unset emits everything at once
    pub lines_per_second: Option<u32>,
    pub ecg_level: f64,
    pub emg_level: f64,
    pub eda_level: f64,
    /// Uniform noise half-width added to every reading
    pub noise_amplitude: f64,
    /// Replace every n-th line with garbage
    pub malformed_every: Option<usize>,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_count: 60_000,
            lines_per_second: Some(1_000),
            ecg_level: 512.0,
            emg_level: 512.0,
            eda_level: 300.0,
            noise_amplitude: 20.0,
            malformed_every: None,
            seed: 7,
        }
    }
}

impl SimulatorConfig {
    /// Render the configured stream as `ECG,EMG,EDA` wire lines
    pub fn generate_lines(&self) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut noise = |level: f64| {
            if self.noise_amplitude > 0.0 {
                level + rng.gen_range(-self.noise_amplitude..=self.noise_amplitude)
            } else {
                level
            }
        };

        (0..self.sample_count)
            .map(|i| match self.malformed_every {
                Some(n) if n > 0 && (i + 1) % n == 0 => "ERR,,".to_string(),
                _ => {
                    let ecg = noise(self.ecg_level);
                    let emg = noise(self.emg_level);
                    let eda = noise(self.eda_level);
                    format!("{:.1},{:.1},{:.1}", ecg, emg, eda)
                }
            })
            .collect()
    }
}

/// What a simulated port does once opened
#[derive(Debug, Clone)]
pub enum PortBehavior {
    /// Streams newline-terminated lines
    CsvLines(Vec<String>),
    /// Answers BITalino commands and streams frames of `[A1..A6]` once started
    Bitalino { rows: Vec<[u16; 6]> },
    /// Opens but never sends anything
    Silent,
}

/// A simulated port
#[derive(Debug, Clone)]
pub struct SimulatedPort {
    pub name: String,
    pub behavior: PortBehavior,
    pub lines_per_second: Option<u32>,
    /// Opens that fail before the port starts answering
    pub failed_opens: u32,
    /// Bytes already waiting when the port is opened
    pub leading_bytes: Vec<u8>,
}

impl SimulatedPort {
    pub fn new(name: impl Into<String>, behavior: PortBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            lines_per_second: None,
            failed_opens: 0,
            leading_bytes: Vec::new(),
        }
    }

    pub fn paced(mut self, lines_per_second: u32) -> Self {
        self.lines_per_second = Some(lines_per_second);
        self
    }

    pub fn failing_first(mut self, opens: u32) -> Self {
        self.failed_opens = opens;
        self
    }

    /// Line noise the port sends before anything else
    pub fn with_leading_bytes(mut self, bytes: &[u8]) -> Self {
        self.leading_bytes = bytes.to_vec();
        self
    }
}

/// Replacement for the host's port list
#[derive(Debug, Clone, Default)]
pub struct SimulatedLinkProvider {
    ports: Vec<SimulatedPort>,
    opens: Arc<Mutex<HashMap<String, u32>>>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl SimulatedLinkProvider {
    pub fn new(ports: Vec<SimulatedPort>) -> Self {
        Self {
            ports,
            ..Self::default()
        }
    }

    /// Single streaming port driven by a [`SimulatorConfig`]
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let mut port = SimulatedPort::new(
            SIMULATED_PORT_NAME,
            PortBehavior::CsvLines(config.generate_lines()),
        );
        port.lines_per_second = config.lines_per_second;
        Self::new(vec![port])
    }

    /// Times `name` was opened, failed attempts included
    pub fn open_count(&self, name: &str) -> u32 {
        self.opens.lock().get(name).copied().unwrap_or(0)
    }

    /// Every byte written to any link of this provider
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

impl LinkProvider for SimulatedLinkProvider {
    fn list_ports(&self) -> HalResult<Vec<CandidateConnection>> {
        Ok(self
            .ports
            .iter()
            .map(|port| CandidateConnection {
                address: port.name.clone(),
                description: Some("simulated".to_string()),
            })
            .collect())
    }

    fn open(
        &self,
        address: &str,
        _baud_rate: u32,
        read_timeout: Duration,
    ) -> HalResult<Box<dyn SerialLink>> {
        let port = self
            .ports
            .iter()
            .find(|p| p.name == address)
            .ok_or_else(|| HalError::Link(format!("no such port: {}", address)))?;

        let attempt = {
            let mut opens = self.opens.lock();
            let count = opens.entry(address.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if attempt <= port.failed_opens {
            return Err(HalError::Link(format!("{} is busy", address)));
        }

        Ok(Box::new(SimulatedLink::new(
            port,
            read_timeout,
            Arc::clone(&self.written),
        )))
    }
}

/// Open simulated port
pub struct SimulatedLink {
    behavior: PortBehavior,
    inbound: VecDeque<u8>,
    queued_lines: VecDeque<String>,
    pace: Option<(Instant, u32)>,
    released: usize,
    read_timeout: Duration,
    written: Arc<Mutex<Vec<u8>>>,
}

impl SimulatedLink {
    fn new(port: &SimulatedPort, read_timeout: Duration, written: Arc<Mutex<Vec<u8>>>) -> Self {
        let queued_lines = match &port.behavior {
            PortBehavior::CsvLines(lines) => lines.iter().cloned().collect(),
            _ => VecDeque::new(),
        };
        let mut link = Self {
            behavior: port.behavior.clone(),
            inbound: port.leading_bytes.iter().copied().collect(),
            queued_lines,
            pace: port.lines_per_second.map(|rate| (Instant::now(), rate)),
            released: 0,
            read_timeout,
            written,
        };
        link.release_lines();
        link
    }

    fn release_lines(&mut self) {
        let due = match self.pace {
            Some((opened_at, rate)) => (opened_at.elapsed().as_secs_f64() * f64::from(rate)) as usize,
            None => usize::MAX,
        };
        while self.released < due {
            let Some(line) = self.queued_lines.pop_front() else {
                break;
            };
            self.inbound.extend(line.as_bytes());
            self.inbound.push_back(b'\n');
            self.released += 1;
        }
    }

    fn handle_command(&mut self, byte: u8) {
        let PortBehavior::Bitalino { rows } = &self.behavior else {
            return;
        };

        if byte == VERSION_COMMAND {
            self.inbound.extend(SIMULATED_FIRMWARE.as_bytes());
            self.inbound.push_back(b'\n');
        } else if byte == STOP_COMMAND {
            self.inbound.clear();
        } else if byte & 0x03 == 0x01 {
            let frames: Vec<u8> = rows
                .iter()
                .enumerate()
                .flat_map(|(i, analog)| encode_frame((i % 16) as u8, [0; 4], *analog))
                .collect();
            self.inbound.extend(frames);
        }
    }
}

impl Read for SimulatedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.release_lines();
        if self.inbound.is_empty() {
            std::thread::sleep(self.read_timeout);
            self.release_lines();
            if self.inbound.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
            }
        }

        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().extend_from_slice(buf);
        for &byte in buf {
            self.handle_command(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
