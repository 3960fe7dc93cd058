// src/hal/bitalino.rs
//! BITalino polling device driver
//!
//! The board only streams after it is told the sampling rate and the analog
//! channel mask. Every sample arrives as a fixed-size binary frame closed by
//! a 4-bit CRC and sequence number. All six analog inputs are acquired, and
//! A1, A2 and A3 carry the EMG, ECG and EDA sensors.

use crate::config::constants::device::*;
use crate::hal::serial_driver::LinkStream;
use crate::hal::{
    CandidateConnection, ChannelSample, DeviceInfo, DeviceKind, DeviceSession, DeviceState,
    HalError, HalResult, LinkProvider, ReadBatch,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Decoded frame: sequence, four digital inputs, six analog inputs
pub type FrameRow = [u16; 11];

/// Command byte that stops acquisition
pub const STOP_COMMAND: u8 = 0x00;
/// Command byte that asks for the firmware version string
pub const VERSION_COMMAND: u8 = 0x07;

/// BITalino device configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BitalinoConfig {
    /// Serial or RFCOMM address; all ports are tried when unset
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "defaults::connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "defaults::retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "defaults::handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

mod defaults {
    use crate::config::constants::device::*;

    pub fn baud_rate() -> u32 { SERIAL_BAUD_RATE }
    pub fn read_timeout_ms() -> u64 { SERIAL_READ_TIMEOUT_MS }
    pub fn connect_attempts() -> u32 { CONNECT_RETRY_ATTEMPTS }
    pub fn retry_delay_ms() -> u64 { CONNECT_RETRY_DELAY_MS }
    pub fn handshake_timeout_ms() -> u64 { PROBE_TIMEOUT_MS }
}

impl Default for BitalinoConfig {
    fn default() -> Self {
        Self {
            address: None,
            baud_rate: defaults::baud_rate(),
            read_timeout_ms: defaults::read_timeout_ms(),
            connect_attempts: defaults::connect_attempts(),
            retry_delay_ms: defaults::retry_delay_ms(),
            handshake_timeout_ms: defaults::handshake_timeout_ms(),
        }
    }
}

/// Frame length in bytes for `analog_channels` acquired inputs
pub fn frame_size(analog_channels: usize) -> usize {
    let bits = if analog_channels <= 4 {
        12 + 10 * analog_channels
    } else {
        52 + 6 * (analog_channels - 4)
    };
    bits.div_ceil(8)
}

/// Sampling-rate command byte
pub fn rate_command(rate_hz: u32) -> HalResult<u8> {
    let code = BITALINO_SUPPORTED_RATES_HZ
        .iter()
        .position(|&r| r == rate_hz)
        .ok_or(HalError::UnsupportedRate(rate_hz))?;
    Ok(((code as u8) << 6) | 0x03)
}

/// Start command byte for the given zero-based analog inputs
pub fn start_command(analog_inputs: &[u8]) -> u8 {
    analog_inputs
        .iter()
        .fold(0x01, |command, &input| command | (1 << (2 + input)))
}

/// 4-bit CRC over a frame whose own CRC nibble is treated as zero
pub fn crc4(frame: &[u8]) -> u8 {
    let mut x: u8 = 0;
    let last = frame.len().saturating_sub(1);
    for (i, &raw) in frame.iter().enumerate() {
        let byte = if i == last { raw & 0xF0 } else { raw };
        for bit in (0..8).rev() {
            x <<= 1;
            if x & 0x10 != 0 {
                x ^= 0x03;
            }
            x ^= (byte >> bit) & 0x01;
        }
    }
    x & 0x0F
}

/// Decode a six-channel frame into `[seq, D0..D3, A1..A6]`
pub fn decode_frame(frame: &[u8]) -> HalResult<FrameRow> {
    let expected = frame_size(BITALINO_ANALOG_CHANNELS);
    if frame.len() != expected {
        return Err(HalError::MalformedSample {
            input: format!("{:02x?}", frame),
            reason: format!("frame has {} bytes, expected {}", frame.len(), expected),
        });
    }

    let d: Vec<u16> = frame.iter().map(|&b| u16::from(b)).collect();
    if crc4(frame) != frame[7] & 0x0F {
        return Err(HalError::MalformedSample {
            input: format!("{:02x?}", frame),
            reason: "CRC mismatch".to_string(),
        });
    }

    Ok([
        d[7] >> 4,
        (d[6] >> 7) & 0x01,
        (d[6] >> 6) & 0x01,
        (d[6] >> 5) & 0x01,
        (d[6] >> 4) & 0x01,
        ((d[6] & 0x0F) << 6) | (d[5] >> 2),
        ((d[5] & 0x03) << 8) | d[4],
        (d[3] << 2) | (d[2] >> 6),
        ((d[2] & 0x3F) << 4) | (d[1] >> 4),
        ((d[1] & 0x0F) << 2) | (d[0] >> 6),
        d[0] & 0x3F,
    ])
}

/// Encode a six-channel frame, the inverse of [`decode_frame`]
pub fn encode_frame(seq: u8, digital: [u8; 4], analog: [u16; 6]) -> [u8; 8] {
    let [a1, a2, a3, a4, a5, a6] = analog;
    let mut frame = [0u8; 8];
    frame[0] = (((a5 & 0x03) << 6) | (a6 & 0x3F)) as u8;
    frame[1] = (((a4 & 0x0F) << 4) | ((a5 >> 2) & 0x0F)) as u8;
    frame[2] = (((a3 & 0x03) << 6) | ((a4 >> 4) & 0x3F)) as u8;
    frame[3] = ((a3 >> 2) & 0xFF) as u8;
    frame[4] = (a2 & 0xFF) as u8;
    frame[5] = (((a1 & 0x3F) << 2) | ((a2 >> 8) & 0x03)) as u8;
    frame[6] = ((digital[0] & 1) << 7)
        | ((digital[1] & 1) << 6)
        | ((digital[2] & 1) << 5)
        | ((digital[3] & 1) << 4)
        | ((a1 >> 6) & 0x0F) as u8;
    frame[7] = (seq & 0x0F) << 4;
    frame[7] |= crc4(&frame);
    frame
}

/// Map a decoded row onto the three physiological channels
pub fn sample_from_row(row: &FrameRow) -> ChannelSample {
    ChannelSample {
        emg: f64::from(row[BITALINO_EMG_COLUMN]),
        ecg: f64::from(row[BITALINO_ECG_COLUMN]),
        eda: f64::from(row[BITALINO_EDA_COLUMN]),
    }
}

/// BITalino board driven by explicit commands
pub struct BitalinoDevice {
    config: BitalinoConfig,
    provider: Arc<dyn LinkProvider>,
    stream: Option<LinkStream>,
    state: DeviceState,
    address: Option<String>,
    firmware: Option<String>,
    pending: Vec<u8>,
    malformed: u64,
}

impl BitalinoDevice {
    pub fn new(config: BitalinoConfig, provider: Arc<dyn LinkProvider>) -> Self {
        Self {
            config,
            provider,
            stream: None,
            state: DeviceState::Disconnected,
            address: None,
            firmware: None,
            pending: Vec::new(),
            malformed: 0,
        }
    }

    /// Firmware version reported during the handshake
    pub fn firmware(&self) -> Option<&str> {
        self.firmware.as_deref()
    }

    fn handshake(&self, address: &str) -> HalResult<(LinkStream, String)> {
        let link = self.provider.open(
            address,
            self.config.baud_rate,
            Duration::from_millis(self.config.read_timeout_ms),
        )?;
        let mut stream = LinkStream::new(link);
        stream.send(&[VERSION_COMMAND])?;

        let give_up_at = Instant::now() + Duration::from_millis(self.config.handshake_timeout_ms);
        while Instant::now() < give_up_at {
            match stream.next_line() {
                Ok(Some(line)) if line.contains(BITALINO_VERSION_MARKER) => {
                    return Ok((stream, line.trim().to_string()));
                }
                Ok(Some(line)) => debug!(address, line = %line, "ignoring handshake noise"),
                Ok(None) => continue,
                Err(e) if e.is_recoverable() => {
                    debug!(address, error = %e, "ignoring undecodable handshake line")
                }
                Err(e) => return Err(e),
            }
        }

        Err(HalError::DeviceNotFound {
            reason: format!("{} did not answer the version request", address),
        })
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

    fn stream_mut(&mut self, operation: &'static str) -> HalResult<&mut LinkStream> {
        let actual = self.state;
        self.stream.as_mut().ok_or(HalError::InvalidState {
            operation,
            expected: DeviceState::Connected,
            actual,
        })
    }
}

impl DeviceSession for BitalinoDevice {
    fn discover(&mut self) -> HalResult<Vec<CandidateConnection>> {
        match &self.config.address {
            Some(address) => Ok(vec![CandidateConnection::new(address.clone())]),
            None => self.provider.list_ports(),
        }
    }

    fn connect(&mut self, candidate: &CandidateConnection) -> HalResult<()> {
        self.state = DeviceState::Connecting;
        let attempts = self.config.connect_attempts.max(1);

        for attempt in 1..=attempts {
            match self.handshake(&candidate.address) {
                Ok((stream, firmware)) => {
                    info!(address = %candidate.address, firmware = %firmware, "BITalino connected");
                    self.stream = Some(stream);
                    self.address = Some(candidate.address.clone());
                    self.firmware = Some(firmware);
                    self.pending.clear();
                    self.malformed = 0;
                    self.state = DeviceState::Connected;
                    return Ok(());
                }
                Err(e) => {
                    warn!(address = %candidate.address, attempt, attempts, error = %e, "connect attempt failed");
                    if attempt < attempts {
                        std::thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
                    }
                }
            }
        }

        self.state = DeviceState::Disconnected;
        Err(HalError::DeviceNotFound {
            reason: format!(
                "{} did not connect after {} attempts",
                candidate.address, attempts
            ),
        })
    }

    fn start(&mut self, rate_hz: u32) -> HalResult<()> {
        if self.state == DeviceState::Stopped {
            self.state = DeviceState::Connected;
        }
        self.require_state("start", DeviceState::Connected)?;

        let rate = rate_command(rate_hz)?;
        let inputs: Vec<u8> = (0..BITALINO_ANALOG_CHANNELS as u8).collect();
        let stream = self.stream_mut("start")?;
        stream.send(&[rate])?;
        stream.send(&[start_command(&inputs)])?;

        self.pending.clear();
        self.state = DeviceState::Streaming;
        Ok(())
    }

    fn read(&mut self, rate_hz: u32) -> HalResult<ReadBatch> {
        self.require_state("read", DeviceState::Streaming)?;

        let wanted = rate_hz.max(1) as usize;
        let size = frame_size(BITALINO_ANALOG_CHANNELS);
        let give_up_at = Instant::now() + Duration::from_millis(READ_BATCH_TIMEOUT_MS);
        let mut batch = Vec::with_capacity(wanted);
        let mut chunk = [0u8; 512];

        loop {
            while self.pending.len() >= size && batch.len() < wanted {
                let frame: Vec<u8> = self.pending.drain(..size).collect();
                match decode_frame(&frame) {
                    Ok(row) => batch.push(sample_from_row(&row)),
                    Err(e) => {
                        self.malformed += 1;
                        warn!(error = %e, "dropping malformed frame");
                    }
                }
            }
            if batch.len() >= wanted || Instant::now() >= give_up_at {
                break;
            }

            let stream = self.stream_mut("read")?;
            if let Some(n) = stream.read_bytes(&mut chunk)? {
                self.pending.extend_from_slice(&chunk[..n]);
            }
        }

        Ok(batch)
    }

    fn stop(&mut self) -> HalResult<()> {
        self.require_state("stop", DeviceState::Streaming)?;
        self.stream_mut("stop")?.send(&[STOP_COMMAND])?;
        self.pending.clear();
        self.state = DeviceState::Stopped;
        Ok(())
    }

    fn close(&mut self) -> HalResult<()> {
        self.stream = None;
        self.pending.clear();
        self.state = DeviceState::Disconnected;
        Ok(())
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self
                .firmware
                .clone()
                .unwrap_or_else(|| "BITalino".to_string()),
            kind: DeviceKind::PollingApi,
            address: self.address.clone(),
            supported_rates_hz: BITALINO_SUPPORTED_RATES_HZ.to_vec(),
        }
    }

    fn malformed_count(&self) -> u64 {
        self.malformed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_for_six_channels() {
        assert_eq!(frame_size(6), 8);
        assert_eq!(frame_size(4), 7);
        assert_eq!(frame_size(1), 3);
    }

    #[test]
    fn test_rate_commands() {
        assert_eq!(rate_command(1).unwrap(), 0x03);
        assert_eq!(rate_command(10).unwrap(), 0x43);
        assert_eq!(rate_command(100).unwrap(), 0x83);
        assert_eq!(rate_command(1000).unwrap(), 0xC3);
        assert!(matches!(rate_command(250), Err(HalError::UnsupportedRate(250))));
    }

    #[test]
    fn test_start_command_sets_channel_mask() {
        assert_eq!(start_command(&[0, 1, 2, 3, 4, 5]), 0xFD);
        assert_eq!(start_command(&[0]), 0x05);
        assert_eq!(start_command(&[]), 0x01);
    }

    #[test]
    fn test_frame_roundtrip_preserves_full_scale_values() {
        let analog = [1023, 512, 1, 1000, 63, 42];
        let frame = encode_frame(9, [1, 0, 1, 0], analog);
        let row = decode_frame(&frame).unwrap();

        assert_eq!(row[0], 9);
        assert_eq!(&row[1..5], &[1, 0, 1, 0]);
        assert_eq!(&row[5..], &analog);
    }

    #[test]
    fn test_crc_mismatch_is_malformed() {
        let mut frame = encode_frame(3, [0; 4], [100, 200, 300, 400, 50, 60]);
        frame[2] ^= 0x10;
        assert!(matches!(
            decode_frame(&frame),
            Err(HalError::MalformedSample { .. })
        ));
    }

    #[test]
    fn test_short_frame_is_malformed() {
        assert!(decode_frame(&[0u8; 5]).is_err());
    }

    #[test]
    fn test_row_maps_a1_a2_a3() {
        let frame = encode_frame(0, [0; 4], [100, 200, 50, 0, 0, 0]);
        let sample = sample_from_row(&decode_frame(&frame).unwrap());
        assert_eq!(sample, ChannelSample::new(100.0, 200.0, 50.0));
    }
}
