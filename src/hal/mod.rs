// src/hal/mod.rs
//! Hardware Abstraction Layer for biosignal measurement devices

pub mod bitalino;
pub mod serial_driver;
pub mod simulator;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests;

pub use bitalino::{BitalinoConfig, BitalinoDevice};
pub use serial_driver::{
    parse_wire_line, PortMemory, StreamingSerialConfig, StreamingSerialDevice, SystemLinkProvider,
};
pub use simulator::{PortBehavior, SimulatedLinkProvider, SimulatedPort, SimulatorConfig};
pub use traits::*;
pub use types::*;

use crate::config::DeviceConfig;
use std::sync::Arc;

/// Builds the configured device backend
pub struct DeviceFactory;

impl DeviceFactory {
    /// Create a session for the configured backend.
    ///
    /// `memory` carries the confirmed streaming port across sessions.
    pub fn create(config: &DeviceConfig, memory: PortMemory) -> Box<dyn DeviceSession> {
        match config.backend {
            DeviceKind::StreamingSerial => Box::new(StreamingSerialDevice::new(
                config.serial.clone(),
                Arc::new(SystemLinkProvider),
                memory,
            )),
            DeviceKind::PollingApi => Box::new(BitalinoDevice::new(
                config.bitalino.clone(),
                Arc::new(SystemLinkProvider),
            )),
            DeviceKind::Simulator => Self::create_simulator(&config.simulator, memory),
        }
    }

    /// Streaming device wired to a simulated port
    pub fn create_simulator(config: &SimulatorConfig, memory: PortMemory) -> Box<dyn DeviceSession> {
        let provider = SimulatedLinkProvider::from_config(config);
        Box::new(StreamingSerialDevice::new(
            StreamingSerialConfig::default(),
            Arc::new(provider),
            memory,
        ))
    }
}
