//! Conversion utilities for raw sensor readings
//!
//! Transfer functions for the 10-bit BITalino sensor boards. Readings coming
//! off the polling backend are raw ADC codes; these map them to the physical
//! units the reports use.

use crate::config::constants::sensor::{
    ADC_RESOLUTION_BITS, ECG_GAIN, EDA_GAIN, EMG_GAIN, VCC_VOLTS,
};

#[inline]
fn adc_fraction(adc: f64) -> f64 {
    adc / f64::from(1u32 << ADC_RESOLUTION_BITS)
}

/// ECG sensor output in millivolts
pub fn adc_to_ecg_mv(adc: f64) -> f64 {
    (adc_fraction(adc) - 0.5) * VCC_VOLTS / ECG_GAIN * 1000.0
}

/// EMG sensor output in millivolts
pub fn adc_to_emg_mv(adc: f64) -> f64 {
    (adc_fraction(adc) - 0.5) * VCC_VOLTS / EMG_GAIN * 1000.0
}

/// EDA sensor output in microsiemens
pub fn adc_to_eda_us(adc: f64) -> f64 {
    adc_fraction(adc) * VCC_VOLTS / EDA_GAIN
}

/// Round half to even at `decimals` places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midscale_is_zero_for_bipolar_sensors() {
        assert_eq!(adc_to_ecg_mv(512.0), 0.0);
        assert_eq!(adc_to_emg_mv(512.0), 0.0);
    }

    #[test]
    fn test_full_scale_ranges() {
        // ECG spans roughly +/-1.5 mV, EMG +/-1.64 mV
        assert!((adc_to_ecg_mv(0.0) + 1.5).abs() < 1e-9);
        assert!((adc_to_emg_mv(0.0) + 1.635282).abs() < 1e-5);
        assert!((adc_to_eda_us(1024.0) - 25.0).abs() < 1e-9);
        assert_eq!(adc_to_eda_us(0.0), 0.0);
    }

    #[test]
    fn test_round_to_uses_bankers_rounding() {
        assert_eq!(round_to(1.2345, 3), 1.234);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(-0.1234, 3), -0.123);
    }
}
