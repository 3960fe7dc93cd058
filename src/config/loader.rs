// src/config/loader.rs
//! Configuration loader
//!
//! Layers, lowest first: built-in defaults, each existing TOML file in the
//! search path, then `SOUNDSENSE_*` environment variables. Nested keys in
//! variables are separated by a double underscore, so
//! `SOUNDSENSE_LIVE_VIEW__TICK_INTERVAL_MS=500` sets `live_view.tick_interval_ms`.

use crate::config::constants::paths;
use crate::config::{ConfigError, RecordingConfig, SystemConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    current_config: Arc<RwLock<SystemConfig>>,
}

impl ConfigLoader {
    /// Create new configuration loader over the default search path
    pub fn new() -> Self {
        Self::with_paths(
            paths::DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .collect(),
        )
    }

    /// Create loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            current_config: Arc::new(RwLock::new(SystemConfig::default())),
        }
    }

    /// Load system configuration with validation
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        info!(backend = ?config.device.backend, "system configuration loaded");
        Ok(config)
    }

    /// Get current configuration
    pub fn get_current_config(&self) -> SystemConfig {
        self.current_config.read().clone()
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = self.get_current_config();
        let toml_content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load a recording record from a TOML file
    pub fn load_recording_config<P: AsRef<Path>>(path: P) -> Result<RecordingConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: RecordingConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn load_and_merge_configs(&self) -> Result<SystemConfig, ConfigError> {
        let mut merged_config = toml::Value::try_from(SystemConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        for config_path in &self.config_paths {
            if !config_path.exists() {
                debug!(path = %config_path.display(), "skipping missing config file");
                continue;
            }
            let file_config = self.load_config_file(config_path)?;
            merge_toml_values(&mut merged_config, file_config);
        }

        apply_environment_overrides(&mut merged_config, std::env::vars());

        let config: SystemConfig = merged_config
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<toml::Value, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_toml_values(base_value, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn apply_environment_overrides(
    config: &mut toml::Value,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(paths::ENV_PREFIX) else {
            continue;
        };
        let config_key = stripped
            .to_lowercase()
            .split(paths::ENV_NESTING_SEPARATOR)
            .collect::<Vec<_>>()
            .join(".");
        debug!(key = %config_key, "applying environment override");
        set_nested_value(config, &config_key, parse_env_value(&value));
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}

fn set_nested_value(config: &mut toml::Value, path: &str, value: toml::Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = config;
    for part in parents {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }
    if let toml::Value::Table(table) = current {
        table.insert(last.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::DeviceKind;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_env_override_uses_double_underscore_nesting() {
        let mut value = toml::Value::try_from(SystemConfig::default()).unwrap();
        apply_environment_overrides(
            &mut value,
            vec![
                ("SOUNDSENSE_LIVE_VIEW__TICK_INTERVAL_MS".to_string(), "500".to_string()),
                ("SOUNDSENSE_DEVICE__BACKEND".to_string(), "simulator".to_string()),
                ("UNRELATED".to_string(), "1".to_string()),
            ],
        );
        let config: SystemConfig = value.try_into().unwrap();
        assert_eq!(config.live_view.tick_interval_ms, 500);
        assert_eq!(config.device.backend, DeviceKind::Simulator);
    }

    #[test]
    #[serial]
    fn test_file_values_override_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[analysis]\nsection_size = 500\n\n[device]\nbackend = \"polling_api\"").unwrap();

        let mut loader = ConfigLoader::with_paths(vec![file.path().to_path_buf()]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config.analysis.section_size, 500);
        assert_eq!(config.analysis.lms_step_size, 0.001);
        assert_eq!(config.device.backend, DeviceKind::PollingApi);
        assert_eq!(loader.get_current_config().analysis.section_size, 500);
    }

    #[test]
    #[serial]
    fn test_invalid_merged_config_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[analysis]\nsection_size = 0").unwrap();

        let mut loader = ConfigLoader::with_paths(vec![file.path().to_path_buf()]);
        assert!(matches!(
            loader.load_system_config(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_process_environment_is_applied() {
        std::env::set_var("SOUNDSENSE_ANALYSIS__DENOISE", "false");
        let mut loader = ConfigLoader::with_paths(Vec::new());
        let result = loader.load_system_config();
        std::env::remove_var("SOUNDSENSE_ANALYSIS__DENOISE");

        assert!(!result.unwrap().analysis.denoise);
    }

    #[test]
    fn test_recording_config_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "sample_rate = 1000\nduration = 30\nchannels = [true, false, true]\n\
             audio_option = \"rain\"\ntime_option = 10\ndi_option = 3"
        )
        .unwrap();

        let config = ConfigLoader::load_recording_config(file.path()).unwrap();
        assert_eq!(config.target_samples(), 30_000);
        assert!(!config.channels.ecg);
    }

    #[test]
    fn test_missing_recording_file() {
        assert!(matches!(
            ConfigLoader::load_recording_config("/nonexistent/recording.toml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
