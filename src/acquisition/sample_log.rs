// src/acquisition/sample_log.rs
//! Finished three-channel recordings and their text log format
//!
//! The log holds one line per sample index with `EMG,ECG,EDA` values. That
//! order differs from the device wire order and is what downstream readers
//! expect.

use crate::hal::{Channel, ChannelSample};
use crate::utils::conversion::{adc_to_ecg_mv, adc_to_eda_us, adc_to_emg_mv};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Sample log errors
#[derive(Debug, Error)]
pub enum SampleLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("channel lengths differ: EMG {emg}, ECG {ecg}, EDA {eda}")]
    LengthMismatch { emg: usize, ecg: usize, eda: usize },
}

/// Three index-aligned channel sequences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleLog {
    emg: Vec<f64>,
    ecg: Vec<f64>,
    eda: Vec<f64>,
}

impl SampleLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            emg: Vec::with_capacity(capacity),
            ecg: Vec::with_capacity(capacity),
            eda: Vec::with_capacity(capacity),
        }
    }

    /// Build from separate channels, which must have equal lengths
    pub fn from_channels(
        emg: Vec<f64>,
        ecg: Vec<f64>,
        eda: Vec<f64>,
    ) -> Result<Self, SampleLogError> {
        if emg.len() != ecg.len() || ecg.len() != eda.len() {
            return Err(SampleLogError::LengthMismatch {
                emg: emg.len(),
                ecg: ecg.len(),
                eda: eda.len(),
            });
        }
        Ok(Self { emg, ecg, eda })
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a ChannelSample>) -> Self {
        let mut log = Self::default();
        for row in rows {
            log.push_row(row);
        }
        log
    }

    pub(crate) fn push_row(&mut self, row: &ChannelSample) {
        self.emg.push(row.emg);
        self.ecg.push(row.ecg);
        self.eda.push(row.eda);
    }

    pub fn len(&self) -> usize {
        self.emg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emg.is_empty()
    }

    pub fn channel(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Emg => &self.emg,
            Channel::Ecg => &self.ecg,
            Channel::Eda => &self.eda,
        }
    }

    pub fn row(&self, index: usize) -> Option<ChannelSample> {
        Some(ChannelSample {
            emg: *self.emg.get(index)?,
            ecg: *self.ecg.get(index)?,
            eda: *self.eda.get(index)?,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ChannelSample> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Convert raw BITalino ADC codes to mV (EMG, ECG) and µS (EDA)
    pub fn to_physical_units(&self) -> SampleLog {
        SampleLog {
            emg: self.emg.iter().map(|&v| adc_to_emg_mv(v)).collect(),
            ecg: self.ecg.iter().map(|&v| adc_to_ecg_mv(v)).collect(),
            eda: self.eda.iter().map(|&v| adc_to_eda_us(v)).collect(),
        }
    }
}

/// Write `log` as `EMG,ECG,EDA` lines
pub fn write_sample_log<P: AsRef<Path>>(path: P, log: &SampleLog) -> Result<(), SampleLogError> {
    let mut out = BufWriter::new(File::create(path)?);
    for row in log.rows() {
        writeln!(out, "{},{},{}", row.emg, row.ecg, row.eda)?;
    }
    out.flush()?;
    Ok(())
}

/// Read a log written by [`write_sample_log`]
pub fn read_sample_log<P: AsRef<Path>>(path: P) -> Result<SampleLog, SampleLogError> {
    let reader = BufReader::new(File::open(path)?);
    let mut log = SampleLog::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(SampleLogError::Parse {
                line: line_no,
                reason: format!("expected 3 values, got {}", fields.len()),
            });
        }
        let mut values = [0.0f64; 3];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse().map_err(|_| SampleLogError::Parse {
                line: line_no,
                reason: format!("{:?} is not a number", field),
            })?;
        }
        log.push_row(&ChannelSample::new(values[0], values[1], values[2]));
    }

    Ok(log)
}
