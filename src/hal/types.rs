// src/hal/types.rs
//! Core types for measurement device abstraction

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One of the three physiological measurement streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Emg,
    Ecg,
    Eda,
}

impl Channel {
    /// Channels in sample-log order
    pub const ALL: [Channel; 3] = [Channel::Emg, Channel::Ecg, Channel::Eda];

    /// Position in EMG, ECG, EDA order
    pub fn index(self) -> usize {
        match self {
            Channel::Emg => 0,
            Channel::Ecg => 1,
            Channel::Eda => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Emg => "EMG",
            Channel::Ecg => "ECG",
            Channel::Eda => "EDA",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reading per channel taken at the same instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelSample {
    pub emg: f64,
    pub ecg: f64,
    pub eda: f64,
}

impl ChannelSample {
    pub fn new(emg: f64, ecg: f64, eda: f64) -> Self {
        Self { emg, ecg, eda }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Emg => self.emg,
            Channel::Ecg => self.ecg,
            Channel::Eda => self.eda,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        match channel {
            Channel::Emg => self.emg = value,
            Channel::Ecg => self.ecg = value,
            Channel::Eda => self.eda = value,
        }
    }
}

/// Samples returned by one device read, in temporal order
pub type ReadBatch = Vec<ChannelSample>;

/// Lifecycle of a device connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Disconnected,
    Connecting,
    Connected,
    Streaming,
    Stopped,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Disconnected => "disconnected",
            DeviceState::Connecting => "connecting",
            DeviceState::Connected => "connected",
            DeviceState::Streaming => "streaming",
            DeviceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Device backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Microcontroller streaming CSV lines over a serial port
    StreamingSerial,
    /// BITalino board driven by start/read commands
    PollingApi,
    /// In-memory device fed from a generated script
    Simulator,
}

/// A port or address that may host a supported device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateConnection {
    pub address: String,
    pub description: Option<String>,
}

impl CandidateConnection {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            description: None,
        }
    }
}

/// Device information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
    /// Address of the connected device, if any
    pub address: Option<String>,
    /// Empty when the device accepts any rate
    pub supported_rates_hz: Vec<u32>,
}

/// HAL error types
#[derive(Debug, Error)]
pub enum HalError {
    #[error("device not found: {reason}")]
    DeviceNotFound { reason: String },

    #[error("malformed sample {input:?}: {reason}")]
    MalformedSample { input: String, reason: String },

    #[error("operation `{operation}` requires {expected} state, device is {actual}")]
    InvalidState {
        operation: &'static str,
        expected: DeviceState,
        actual: DeviceState,
    },

    #[error("sampling rate {0} Hz is not supported by this device")]
    UnsupportedRate(u32),

    #[error("link error: {0}")]
    Link(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HalError {
    /// Recoverable errors leave the session running
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HalError::MalformedSample { .. })
    }
}

impl From<serialport::Error> for HalError {
    fn from(err: serialport::Error) -> Self {
        HalError::Link(err.to_string())
    }
}

/// HAL result alias
pub type HalResult<T> = Result<T, HalError>;
