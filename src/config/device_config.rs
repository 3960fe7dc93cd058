// src/config/device_config.rs
//! Device backend selection

use crate::hal::{BitalinoConfig, DeviceKind, SimulatorConfig, StreamingSerialConfig};
use serde::{Deserialize, Serialize};

/// Which device backend to use and how to reach it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_backend")]
    pub backend: DeviceKind,
    #[serde(default)]
    pub serial: StreamingSerialConfig,
    #[serde(default)]
    pub bitalino: BitalinoConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

fn default_backend() -> DeviceKind {
    DeviceKind::StreamingSerial
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            serial: StreamingSerialConfig::default(),
            bitalino: BitalinoConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}
