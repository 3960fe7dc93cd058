//! Common utility functions for the SoundSense core
//!
//! - Shared session deadline with broadcast cancellation
//! - Sensor transfer functions and rounding helpers

pub mod conversion;
pub mod time;

pub use conversion::{adc_to_ecg_mv, adc_to_eda_us, adc_to_emg_mv, round_to};
pub use time::Deadline;
