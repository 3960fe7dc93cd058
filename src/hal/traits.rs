// src/hal/traits.rs
//! Core HAL traits for measurement device abstraction

use crate::hal::types::{
    CandidateConnection, DeviceInfo, DeviceState, HalError, HalResult, ReadBatch,
};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

/// Main trait for measurement device backends
///
/// A session owns at most one open connection. The expected call order is
/// `discover`, `connect`, `start`, repeated `read`, `stop`, `close`.
pub trait DeviceSession: Send {
    /// List connections that may host a supported device
    fn discover(&mut self) -> HalResult<Vec<CandidateConnection>>;

    /// Open the given candidate
    fn connect(&mut self, candidate: &CandidateConnection) -> HalResult<()>;

    /// Begin continuous sampling at `rate_hz`
    fn start(&mut self, rate_hz: u32) -> HalResult<()>;

    /// Read up to one second of samples.
    ///
    /// Malformed samples are dropped for every channel alike and never end the read.
    fn read(&mut self, rate_hz: u32) -> HalResult<ReadBatch>;

    /// Stop sampling; further reads fail
    fn stop(&mut self) -> HalResult<()>;

    /// Release the connection
    fn close(&mut self) -> HalResult<()>;

    /// Current connection state
    fn state(&self) -> DeviceState;

    /// Get device information
    fn device_info(&self) -> DeviceInfo;

    /// Samples dropped as malformed since connect
    fn malformed_count(&self) -> u64 {
        0
    }

    /// Discover and connect to the first candidate that accepts
    fn open(&mut self) -> HalResult<CandidateConnection> {
        let candidates = self.discover()?;
        if candidates.is_empty() {
            return Err(HalError::DeviceNotFound {
                reason: "no candidate connection matched the device protocol".to_string(),
            });
        }

        let mut last_error = None;
        for candidate in candidates {
            debug!(address = %candidate.address, "connecting to candidate");
            match self.connect(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) => {
                    warn!(address = %candidate.address, error = %e, "candidate rejected");
                    last_error = Some(e);
                }
            }
        }

        Err(HalError::DeviceNotFound {
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "all candidates rejected".to_string()),
        })
    }
}

/// Byte stream to a device port
pub trait SerialLink: Read + Write + Send {}

impl<T: Read + Write + Send> SerialLink for T {}

/// Source of device ports
///
/// Reads on an opened link time out with [`std::io::ErrorKind::TimedOut`]
/// after `read_timeout` when no data is available.
pub trait LinkProvider: Send + Sync {
    /// Enumerate available ports
    fn list_ports(&self) -> HalResult<Vec<CandidateConnection>>;

    /// Open a port
    fn open(
        &self,
        address: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> HalResult<Box<dyn SerialLink>>;
}
