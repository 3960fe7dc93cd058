// src/stimulus/calibration.rs
//! Listener volume calibration
//!
//! Before a session the listener nudges a 1 kHz beep louder or quieter in
//! fixed steps until it is just audible, then confirms. The confirmed level
//! becomes the session's starting volume.

use crate::config::constants::stimulus::{
    CALIBRATION_BEEP_MS, CALIBRATION_FREQUENCY_HZ, CALIBRATION_STEP_DB,
    DEFAULT_STARTING_VOLUME_DB,
};
use crate::stimulus::audio::{AudioSink, StimulusError};
use crate::utils::Deadline;
use std::time::Duration;
use tracing::{debug, info};

/// One listener action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationInput {
    Louder,
    Quieter,
    Reset,
    Confirm,
}

/// Stepwise volume search
#[derive(Debug, Clone)]
pub struct VolumeCalibration {
    start_db: f64,
    volume_db: f64,
    step_db: f64,
    confirmed: Option<f64>,
}

impl Default for VolumeCalibration {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_VOLUME_DB, CALIBRATION_STEP_DB)
    }
}

impl VolumeCalibration {
    pub fn new(start_db: f64, step_db: f64) -> Self {
        Self {
            start_db,
            volume_db: start_db,
            step_db,
            confirmed: None,
        }
    }

    pub fn volume_db(&self) -> f64 {
        self.volume_db
    }

    /// Level the listener settled on, once confirmed
    pub fn confirmed(&self) -> Option<f64> {
        self.confirmed
    }

    /// Apply one input, playing a beep at the new level after a step.
    ///
    /// Returns the confirmed level on [`CalibrationInput::Confirm`].
    pub fn apply(
        &mut self,
        input: CalibrationInput,
        sink: &mut dyn AudioSink,
        deadline: &Deadline,
    ) -> Result<Option<f64>, StimulusError> {
        match input {
            CalibrationInput::Louder | CalibrationInput::Quieter => {
                if input == CalibrationInput::Louder {
                    self.volume_db += self.step_db;
                } else {
                    self.volume_db -= self.step_db;
                }
                debug!(volume_db = self.volume_db, "calibration beep");
                sink.play_tone(
                    CALIBRATION_FREQUENCY_HZ,
                    self.volume_db,
                    Duration::from_millis(CALIBRATION_BEEP_MS),
                    deadline,
                )?;
                Ok(None)
            }
            CalibrationInput::Reset => {
                self.volume_db = self.start_db;
                self.confirmed = None;
                Ok(None)
            }
            CalibrationInput::Confirm => {
                info!(volume_db = self.volume_db, "calibrated volume saved");
                self.confirmed = Some(self.volume_db);
                Ok(self.confirmed)
            }
        }
    }

    /// Feed inputs until one confirms
    pub fn run<I>(
        &mut self,
        inputs: I,
        sink: &mut dyn AudioSink,
        deadline: &Deadline,
    ) -> Result<Option<f64>, StimulusError>
    where
        I: IntoIterator<Item = CalibrationInput>,
    {
        for input in inputs {
            if let Some(level) = self.apply(input, sink, deadline)? {
                return Ok(Some(level));
            }
        }
        Ok(None)
    }
}
