//! SoundSense recorder
//!
//! Runs a baseline and a test recording, writes both sample logs and grades
//! the response.
//!
//! # Usage
//!
//! ```bash
//! # Record with the configured device, then analyze
//! soundsense-record record --recording session.json
//!
//! # Same against the built-in simulator
//! soundsense-record record --recording session.toml --simulate
//!
//! # Re-grade existing logs
//! soundsense-record analyze --recording session.json
//!
//! # Find a just-audible starting volume (h quieter, k louder, r reset, t confirm)
//! soundsense-record calibrate
//! ```

use clap::{Parser, Subcommand};
use soundsense_core::acquisition::{read_sample_log, write_sample_log, SampleLog};
use soundsense_core::config::constants::paths::{BASELINE_LOG_FILE, REPORT_FILE, TEST_LOG_FILE};
use soundsense_core::config::{ConfigLoader, RecordingConfig, SystemConfig};
use soundsense_core::hal::{DeviceKind, PortMemory};
use soundsense_core::processing::AnalysisPipeline;
use soundsense_core::session::{Phase, RecordingSession};
use soundsense_core::stimulus::{create_sink, CalibrationInput, VolumeCalibration};
use soundsense_core::Deadline;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "soundsense-record")]
#[command(author, version, about = "Biosignal recording under acoustic stimulus", long_about = None)]
struct Cli {
    /// System configuration file; defaults to the standard search path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record baseline and test, then analyze
    Record {
        /// Recording parameters (JSON or TOML)
        #[arg(short, long)]
        recording: PathBuf,

        /// Directory for logs and the report
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Use the simulated device
        #[arg(long)]
        simulate: bool,

        /// Override the stimulus starting volume in dB
        #[arg(long, allow_hyphen_values = true)]
        starting_volume_db: Option<f64>,
    },

    /// Analyze logs written by an earlier recording
    Analyze {
        #[arg(short, long)]
        recording: PathBuf,

        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Adjust a 1 kHz beep from stdin commands and print the chosen level
    Calibrate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soundsense_core=info,soundsense_record=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("SoundSense recorder v{}", soundsense_core::VERSION);
    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::with_paths(vec![path.clone()]),
        None => ConfigLoader::new(),
    };
    let mut system = loader.load_system_config()?;

    match cli.command {
        Commands::Record {
            recording,
            output_dir,
            simulate,
            starting_volume_db,
        } => {
            if simulate {
                system.device.backend = DeviceKind::Simulator;
            }
            let mut recording = load_recording(&recording)?;
            if let Some(volume) = starting_volume_db {
                recording.starting_volume_db = volume;
            }
            run_record(recording, system, &output_dir)
        }
        Commands::Analyze {
            recording,
            output_dir,
        } => {
            let recording = load_recording(&recording)?;
            let baseline = read_sample_log(output_dir.join(BASELINE_LOG_FILE))?;
            let test = read_sample_log(output_dir.join(TEST_LOG_FILE))?;
            analyze(&recording, &system, &baseline, &test, &output_dir)
        }
        Commands::Calibrate => run_calibration(&system),
    }
}

fn load_recording(path: &Path) -> Result<RecordingConfig, Box<dyn std::error::Error>> {
    let config = if path.extension().is_some_and(|ext| ext == "json") {
        RecordingConfig::from_json(&std::fs::read_to_string(path)?)?
    } else {
        ConfigLoader::load_recording_config(path)?
    };
    Ok(config)
}

fn run_record(
    recording: RecordingConfig,
    system: SystemConfig,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output_dir)?;
    let memory = PortMemory::new();
    // BITalino boards report raw ADC codes
    let convert = system.device.backend == DeviceKind::PollingApi;

    let mut logs = Vec::with_capacity(2);
    for (phase, file) in [(Phase::Baseline, BASELINE_LOG_FILE), (Phase::Test, TEST_LOG_FILE)] {
        let outcome = RecordingSession::new(recording.clone(), system.clone())?
            .with_port_memory(memory.clone())
            .run(phase)?;
        if let Some(e) = &outcome.stimulus_error {
            warn!(error = %e, "stimulus did not play as configured");
        }

        let log = if convert {
            outcome.log.to_physical_units()
        } else {
            outcome.log
        };
        let path = output_dir.join(file);
        write_sample_log(&path, &log)?;
        info!(%phase, samples = log.len(), path = %path.display(), "sample log written");
        logs.push(log);
    }

    analyze(&recording, &system, &logs[0], &logs[1], output_dir)
}

fn analyze(
    recording: &RecordingConfig,
    system: &SystemConfig,
    baseline: &SampleLog,
    test: &SampleLog,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = AnalysisPipeline::new(
        system.analysis.clone(),
        recording.sample_rate,
        recording.channels,
    );
    let report = pipeline.compare(
        &pipeline.analyze_phase(baseline)?,
        &pipeline.analyze_phase(test)?,
    );

    for channel in &report.channels {
        info!(
            channel = %channel.channel,
            overall = ?channel.overall,
            baseline_rate = ?channel.baseline_peak_rate,
            test_rate = ?channel.test_peak_rate,
            "channel graded"
        );
    }
    let path = output_dir.join(REPORT_FILE);
    report.write_json(&path)?;
    info!(path = %path.display(), "analysis report written");
    Ok(())
}

fn run_calibration(system: &SystemConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut sink = create_sink(&system.stimulus);
    let deadline = Deadline::after(Duration::from_secs(24 * 60 * 60));
    let mut calibration = VolumeCalibration::default();

    println!("h: quieter, k: louder, r: reset, t: confirm");
    let inputs = std::io::stdin().lock().lines().map_while(Result::ok).filter_map(|line| {
        match line.trim() {
            "h" => Some(CalibrationInput::Quieter),
            "k" => Some(CalibrationInput::Louder),
            "r" => Some(CalibrationInput::Reset),
            "t" => Some(CalibrationInput::Confirm),
            _ => None,
        }
    });

    match calibration.run(inputs, sink.as_mut(), &deadline)? {
        Some(level) => println!("{}", level),
        None => warn!(volume_db = calibration.volume_db(), "input ended before a level was confirmed"),
    }
    Ok(())
}
