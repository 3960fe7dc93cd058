// src/config/constants.rs
//! System-wide configuration constants

/// Acquisition constants
pub mod acquisition {
    /// Number of physiological channels carried per sample
    pub const CHANNEL_COUNT: usize = 3;
    /// Value written for a disabled channel
    pub const PLACEHOLDER_VALUE: f64 = 1.0;
    pub const MIN_SAMPLING_RATE_HZ: u32 = 1;
    pub const MAX_SAMPLING_RATE_HZ: u32 = 10_000;
    pub const MAX_DURATION_S: u32 = 3_600;
    /// Upper bound on `sample_rate * duration`
    pub const MAX_TARGET_SAMPLES: u64 = 10_000_000;
    /// Rows reserved up front by a sample store; the buffers grow past it
    pub const INITIAL_STORE_CAPACITY: usize = 1 << 20;
}

/// Device link constants
pub mod device {
    pub const SERIAL_BAUD_RATE: u32 = 115_200;
    pub const SERIAL_READ_TIMEOUT_MS: u64 = 100;
    pub const PROBE_TIMEOUT_MS: u64 = 1_000;
    /// Wall-clock cap on a single read batch
    pub const READ_BATCH_TIMEOUT_MS: u64 = 1_000;
    pub const WIRE_FIELD_COUNT: usize = 3;

    pub const CONNECT_RETRY_ATTEMPTS: u32 = 5;
    pub const CONNECT_RETRY_DELAY_MS: u64 = 2_000;

    pub const BITALINO_SUPPORTED_RATES_HZ: [u32; 4] = [1, 10, 100, 1000];
    pub const BITALINO_ANALOG_CHANNELS: usize = 6;
    pub const BITALINO_VERSION_MARKER: &str = "BITalino";

    /// Columns of a decoded BITalino row holding A1..A3
    pub const BITALINO_EMG_COLUMN: usize = 5;
    pub const BITALINO_ECG_COLUMN: usize = 6;
    pub const BITALINO_EDA_COLUMN: usize = 7;
}

/// Live view constants
pub mod live_view {
    pub const READINESS_THRESHOLD_SAMPLES: usize = 1_000;
    /// Window length as a multiple of the sampling rate
    pub const WINDOW_SECONDS: f64 = 1.5;
    pub const TICK_INTERVAL_MS: u64 = 1_000;
    pub const FAST_TICK_INTERVAL_MS: u64 = 750;
    /// Rates at or above this use the fast tick
    pub const FAST_TICK_RATE_HZ: u32 = 1_000;
    /// Fraction of the data span added above and below when autoscaling
    pub const AXIS_MARGIN_RATIO: f64 = 0.05;
    pub const SNAPSHOT_QUEUE_DEPTH: usize = 8;
}

/// Stimulus constants
pub mod stimulus {
    pub const DEFAULT_STARTING_VOLUME_DB: f64 = -30.0;
    pub const TONE_SAMPLE_RATE_HZ: u32 = 44_100;
    pub const ASSET_DIRECTORY: &str = "audio_files";
    pub const ASSET_EXTENSION: &str = "wav";
    pub const CALIBRATION_STEP_DB: f64 = 3.0;
    pub const CALIBRATION_FREQUENCY_HZ: u32 = 1_000;
    pub const CALIBRATION_BEEP_MS: u64 = 1_000;
}

/// Offline analysis constants
pub mod analysis {
    pub const DEFAULT_SECTION_SIZE: usize = 2_000;
    pub const STATS_DECIMALS: u32 = 3;
    pub const LMS_STEP_SIZE: f64 = 0.001;
    pub const LMS_REGRESSOR: f64 = 5.0;
    /// Upper bounds of the normal, slight, mild, moderate and severe residual bands
    pub const RESIDUAL_BAND_LIMITS: [f64; 5] = [15.0, 25.0, 35.0, 45.0, 55.0];
    /// Upper bounds of the normal, mild and moderate percent-difference flags
    pub const FLAG_LIMITS_PERCENT: [f64; 3] = [15.0, 25.0, 35.0];
    pub const LABEL_SECTION_SECONDS: u32 = 1;
    pub const DENOISE_LEVELS: usize = 7;
    pub const PEAK_WINDOW_SECONDS: u32 = 2;
}

/// BITalino sensor transfer constants
pub mod sensor {
    pub const ADC_RESOLUTION_BITS: u32 = 10;
    pub const VCC_VOLTS: f64 = 3.3;
    pub const ECG_GAIN: f64 = 1100.0;
    pub const EMG_GAIN: f64 = 1009.0;
    pub const EDA_GAIN: f64 = 0.132;
}

/// Worker timing constants
pub mod timing {
    /// Longest a sleeping worker goes without checking for cancellation
    pub const CANCEL_POLL_INTERVAL_MS: u64 = 50;
}

/// File and environment locations
pub mod paths {
    pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["soundsense.toml", "config/soundsense.toml"];
    pub const ENV_PREFIX: &str = "SOUNDSENSE_";
    /// Separates nested keys in environment overrides
    pub const ENV_NESTING_SEPARATOR: &str = "__";
    pub const BASELINE_LOG_FILE: &str = "baseline_sequence.txt";
    pub const TEST_LOG_FILE: &str = "test_sequence.txt";
    pub const REPORT_FILE: &str = "analysis_report.json";
}
