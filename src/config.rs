//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values fall back to the
//! `default_*` functions below.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{GamepadEventsError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub gamepad: GamepadConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Per-manager gamepad behaviour, captured by every gamepad the manager creates
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadConfig {
    /// Repeat `ButtonDown` on every refresh while a button is held
    #[serde(default)]
    pub multiple: bool,

    /// Report buttons already held at attach time on the first refresh
    #[serde(default)]
    pub report_held_on_attach: bool,
}

/// Poll loop timing (used by the binary; the engine never schedules itself)
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PollConfig {
    #[serde(default = "default_refresh_rate_hz")]
    pub refresh_rate_hz: u32,

    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

/// Input device configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InputConfig {
    #[serde(default = "default_device_dir")]
    pub device_dir: String,
}

/// Event log configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_refresh_rate_hz() -> u32 { 60 }
fn default_scan_interval_ms() -> u64 { 1000 }

fn default_device_dir() -> String { crate::source::evdev::DEFAULT_DEVICE_DIR.to_string() }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: default_refresh_rate_hz(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_dir: default_device_dir(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

impl PollConfig {
    /// Period between refreshes.
    pub fn refresh_period(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / u64::from(self.refresh_rate_hz.max(1)))
    }

    /// Period between hotplug scans.
    pub fn scan_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gamepad_events::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.poll.refresh_rate_hz == 0 || self.poll.refresh_rate_hz > 1000 {
            return Err(invalid("refresh_rate_hz must be between 1 and 1000"));
        }

        if self.poll.scan_interval_ms == 0 || self.poll.scan_interval_ms > 60000 {
            return Err(invalid("scan_interval_ms must be between 1 and 60000"));
        }

        if self.input.device_dir.is_empty() {
            return Err(invalid("device_dir cannot be empty"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> GamepadEventsError {
    GamepadEventsError::Config(toml::de::Error::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.gamepad.multiple);
        assert!(!config.gamepad.report_held_on_attach);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml(
            r#"
[gamepad]
multiple = true

[poll]
refresh_rate_hz = 120
"#,
        )
        .unwrap();

        assert!(config.gamepad.multiple);
        assert!(!config.gamepad.report_held_on_attach);
        assert_eq!(config.poll.refresh_rate_hz, 120);
        assert_eq!(config.poll.scan_interval_ms, 1000);
        assert_eq!(config.input.device_dir, "/dev/input");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("[gamepad\nmultiple = true");
        assert!(matches!(result, Err(GamepadEventsError::Config(_))));
    }

    #[test]
    fn test_wrong_type() {
        let result = Config::from_toml("[gamepad]\nmultiple = \"yes\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[gamepad]
multiple = true

[input]
device_dir = "/tmp/input"

[telemetry]
enabled = true
log_dir = "/tmp/gamepad-logs"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert!(config.gamepad.multiple);
        assert_eq!(config.input.device_dir, "/tmp/input");
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/gamepad-events.toml");
        assert!(matches!(result, Err(GamepadEventsError::Io(_))));
    }

    #[test]
    fn test_refresh_rate_zero() {
        let mut config = Config::default();
        config.poll.refresh_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_rate_too_high() {
        let mut config = Config::default();
        config.poll.refresh_rate_hz = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scan_interval_zero() {
        let mut config = Config::default();
        config.poll.scan_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scan_interval_too_high() {
        let mut config = Config::default();
        config.poll.scan_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_device_dir() {
        let mut config = Config::default();
        config.input.device_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = Config::default();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_periods() {
        let poll = PollConfig {
            refresh_rate_hz: 250,
            scan_interval_ms: 500,
        };
        assert_eq!(poll.refresh_period(), std::time::Duration::from_millis(4));
        assert_eq!(poll.scan_period(), std::time::Duration::from_millis(500));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_refresh_rate_hz(), 60);
        assert_eq!(default_scan_interval_ms(), 1000);
        assert_eq!(default_device_dir(), "/dev/input");
        assert_eq!(default_telemetry_enabled(), false);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_format(), "jsonl");
    }
}
