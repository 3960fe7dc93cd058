// src/session.rs
//! Recording session coordinator
//!
//! A session connects the device first and fails cleanly if none answers.
//! It then runs the acquisition worker and the live view (plus the stimulus
//! in the test phase) on their own threads, sharing one [`Deadline`] and one
//! [`ReadyBarrier`]. All workers are joined before the outcome is returned.
//! A fatal worker error or a panic cancels the deadline so the siblings stop
//! within one poll interval.

use crate::acquisition::{
    AcquisitionReport, AcquisitionWorker, ReadyBarrier, SampleLog, SampleStore,
};
use crate::config::{RecordingConfig, SystemConfig};
use crate::error::{CoreError, CoreResult};
use crate::hal::{DeviceFactory, DeviceSession, PortMemory};
use crate::live_view::{LiveRenderer, LiveViewReport, LiveWindowConsumer, TracingRenderer};
use crate::stimulus::{create_sink, AudioSink, StimulusError, StimulusReport, StimulusScheduler};
use crate::utils::Deadline;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, info_span, warn};

/// Which recording of the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No stimulus
    Baseline,
    /// Stimulus plays once the live view is ready
    Test,
}

impl Phase {
    pub fn plays_stimulus(self) -> bool {
        self == Phase::Test
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Baseline => write!(f, "baseline"),
            Phase::Test => write!(f, "test"),
        }
    }
}

/// Everything one session produced
#[derive(Debug)]
pub struct SessionOutcome {
    pub phase: Phase,
    pub log: SampleLog,
    pub acquisition: AcquisitionReport,
    pub live_view: LiveViewReport,
    /// Absent in the baseline phase
    pub stimulus: Option<StimulusReport>,
    /// Stimulus failures never abort the recording
    pub stimulus_error: Option<StimulusError>,
}

/// One baseline or test recording
pub struct RecordingSession {
    recording: Arc<RecordingConfig>,
    system: SystemConfig,
    port_memory: PortMemory,
    device: Option<Box<dyn DeviceSession>>,
    renderer: Option<Box<dyn LiveRenderer>>,
    sink: Option<Box<dyn AudioSink>>,
}

impl RecordingSession {
    pub fn new(recording: RecordingConfig, system: SystemConfig) -> CoreResult<Self> {
        recording.validate()?;
        system.validate()?;
        Ok(Self {
            recording: Arc::new(recording),
            system,
            port_memory: PortMemory::new(),
            device: None,
            renderer: None,
            sink: None,
        })
    }

    /// Share a confirmed port with earlier sessions
    pub fn with_port_memory(mut self, memory: PortMemory) -> Self {
        self.port_memory = memory;
        self
    }

    /// Use this device instead of the configured backend
    pub fn with_device(mut self, device: Box<dyn DeviceSession>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn LiveRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn recording(&self) -> &RecordingConfig {
        &self.recording
    }

    /// Record one phase
    pub fn run(self, phase: Phase) -> CoreResult<SessionOutcome> {
        let _span = info_span!("session", %phase).entered();
        let RecordingSession {
            recording,
            system,
            port_memory,
            device,
            renderer,
            sink,
        } = self;

        let mut device =
            device.unwrap_or_else(|| DeviceFactory::create(&system.device, port_memory));
        match device.open() {
            Ok(candidate) => info!(address = %candidate.address, "device connected"),
            Err(e) => {
                error!(error = %e, "no device, session aborted");
                if let Err(close_err) = device.close() {
                    warn!(error = %close_err, "device close failed");
                }
                return Err(e.into());
            }
        }

        let (writer, reader) = SampleStore::new(recording.target_samples());
        let barrier = ReadyBarrier::new();
        let deadline = Deadline::after(recording.session_duration());
        info!(
            rate = recording.sample_rate,
            duration_s = recording.duration,
            "session started"
        );

        let acquisition = {
            let worker =
                AcquisitionWorker::new(device, Arc::clone(&recording), writer, deadline.clone());
            let deadline = deadline.clone();
            spawn_worker("acquisition", move || {
                let result = worker.run();
                if result.is_err() {
                    deadline.cancel();
                }
                result
            })
        };
        let acquisition = match acquisition {
            Ok(handle) => handle,
            Err(e) => {
                deadline.cancel();
                return Err(e);
            }
        };

        let live_view = {
            let consumer = LiveWindowConsumer::new(
                reader.clone(),
                barrier.clone(),
                deadline.clone(),
                renderer.unwrap_or_else(|| Box::new(TracingRenderer)),
                &recording,
                &system.live_view,
            );
            spawn_worker("live_view", move || consumer.run())
        };
        if live_view.is_err() {
            deadline.cancel();
        }

        let stimulus = if phase.plays_stimulus() {
            let scheduler = StimulusScheduler::new(
                Arc::clone(&recording),
                system.stimulus.asset_directory.clone(),
                sink.unwrap_or_else(|| create_sink(&system.stimulus)),
                barrier.clone(),
                deadline.clone(),
            );
            Some(spawn_worker("stimulus", move || scheduler.run()))
        } else {
            None
        };

        // Join everything before looking at any result
        let acquisition = join_worker("acquisition", acquisition, &deadline);
        let live_view = live_view.and_then(|h| join_worker("live_view", h, &deadline));
        let stimulus = stimulus.map(|spawned| {
            spawned.and_then(|h| join_worker("stimulus", h, &deadline))
        });

        let acquisition = acquisition??;
        let live_view = live_view?;
        let (stimulus, stimulus_error) = match stimulus {
            None => (None, None),
            Some(joined) => match joined? {
                Ok(report) => (Some(report), None),
                Err(e) => {
                    warn!(error = %e, "stimulus failed, recording kept");
                    (None, Some(e))
                }
            },
        };

        let log = reader.snapshot();
        info!(
            samples = log.len(),
            reason = ?acquisition.stop_reason,
            ticks = live_view.ticks,
            "session finished"
        );
        Ok(SessionOutcome {
            phase,
            log,
            acquisition,
            live_view,
            stimulus,
            stimulus_error,
        })
    }
}

fn spawn_worker<T, F>(name: &'static str, body: F) -> CoreResult<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(CoreError::from)
}

fn join_worker<T>(name: &'static str, handle: JoinHandle<T>, deadline: &Deadline) -> CoreResult<T> {
    handle.join().map_err(|_| {
        error!(worker = name, "worker panicked, cancelling session");
        deadline.cancel();
        CoreError::WorkerPanicked(name)
    })
}
