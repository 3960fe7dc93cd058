// src/acquisition/mod.rs
//! Signal acquisition and buffering components

pub mod barrier;
pub mod sample_log;
pub mod sample_store;
pub mod worker;

pub use barrier::ReadyBarrier;
pub use sample_log::{read_sample_log, write_sample_log, SampleLog, SampleLogError};
pub use sample_store::{ChannelBuffer, SampleReader, SampleStore, SampleWriter};
pub use worker::{AcquisitionReport, AcquisitionWorker, StopReason};
