//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so a missing section or key falls back to the
//! values the console ships with. Control settings given here are used only
//! until settings are saved to the configuration sector.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::controls::types::ControlSettings;
use crate::error::{Result, TankError};
use crate::storage::record::RECORD_SIZE;
use crate::tasks::{InputOptions, KeyboardOptions};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub keyboard: KeyboardConfig,

    #[serde(default)]
    pub controls: ControlSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input task configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_input_period_ms")]
    pub period_ms: u64,

    #[serde(default = "default_switch_debounce_ms")]
    pub switch_debounce_ms: u64,

    #[serde(default = "default_reset_calibration_on_entry")]
    pub reset_calibration_on_entry: bool,

    #[serde(default)]
    pub log_reports: bool,
}

/// Keyboard task configuration
#[derive(Debug, Deserialize, Clone)]
pub struct KeyboardConfig {
    #[serde(default = "default_keyboard_period_ms")]
    pub period_ms: u64,

    #[serde(default = "default_pwm_period_ms")]
    pub pwm_period_ms: u64,

    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    #[serde(default = "default_stuck_key_reset_interval")]
    pub stuck_key_reset_interval: u32,

    #[serde(default = "default_kill_switch_release_reads")]
    pub kill_switch_release_reads: u32,
}

/// Configuration sector backing
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_flash_path")]
    pub flash_path: String,

    #[serde(default = "default_sector_size")]
    pub sector_size: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files. Empty logs to stdout only.
    #[serde(default)]
    pub directory: String,
}

// Default value functions
fn default_input_period_ms() -> u64 { 25 }
fn default_switch_debounce_ms() -> u64 { 200 }
fn default_reset_calibration_on_entry() -> bool { true }

fn default_keyboard_period_ms() -> u64 { 5 }
fn default_pwm_period_ms() -> u64 { 100 }
fn default_startup_delay_ms() -> u64 { 1000 }
fn default_stuck_key_reset_interval() -> u32 { 1000 }
fn default_kill_switch_release_reads() -> u32 { 3 }

fn default_flash_path() -> String { "./tank-controls.flash".to_string() }
fn default_sector_size() -> usize { 4096 }

fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            period_ms: default_input_period_ms(),
            switch_debounce_ms: default_switch_debounce_ms(),
            reset_calibration_on_entry: default_reset_calibration_on_entry(),
            log_reports: false,
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            period_ms: default_keyboard_period_ms(),
            pwm_period_ms: default_pwm_period_ms(),
            startup_delay_ms: default_startup_delay_ms(),
            stuck_key_reset_interval: default_stuck_key_reset_interval(),
            kill_switch_release_reads: default_kill_switch_release_reads(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            flash_path: default_flash_path(),
            sector_size: default_sector_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

fn invalid(message: impl Into<String>) -> TankError {
    TankError::InvalidConfig(message.into())
}

impl Config {
    /// Load configuration from a TOML file
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
    /// use tank_controls::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Task timing
        if self.input.period_ms == 0 || self.input.period_ms > 1000 {
            return Err(invalid("input period_ms must be between 1 and 1000"));
        }

        if self.input.switch_debounce_ms > 10_000 {
            return Err(invalid("switch_debounce_ms must be at most 10000"));
        }

        if self.keyboard.period_ms == 0 || self.keyboard.period_ms > 1000 {
            return Err(invalid("keyboard period_ms must be between 1 and 1000"));
        }

        if self.keyboard.pwm_period_ms < self.keyboard.period_ms
            || self.keyboard.pwm_period_ms > 10_000
        {
            return Err(invalid(
                "pwm_period_ms must be between the keyboard period_ms and 10000",
            ));
        }

        if self.keyboard.startup_delay_ms > 60_000 {
            return Err(invalid("startup_delay_ms must be at most 60000"));
        }

        if self.keyboard.stuck_key_reset_interval == 0 {
            return Err(invalid("stuck_key_reset_interval must be greater than 0"));
        }

        if self.keyboard.kill_switch_release_reads == 0
            || self.keyboard.kill_switch_release_reads > 100
        {
            return Err(invalid("kill_switch_release_reads must be between 1 and 100"));
        }

        // Control shaping
        self.controls.check().map_err(invalid)?;

        // Storage
        if self.storage.flash_path.is_empty() {
            return Err(invalid("flash_path cannot be empty"));
        }

        if self.storage.sector_size < RECORD_SIZE || self.storage.sector_size > 1 << 20 {
            return Err(invalid(format!(
                "sector_size must be between {} and {}",
                RECORD_SIZE,
                1 << 20
            )));
        }

        // Logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Input task options derived from this configuration.
    #[must_use]
    pub fn input_options(&self) -> InputOptions {
        InputOptions {
            period: Duration::from_millis(self.input.period_ms),
            settings: self.controls,
            reset_calibration_on_entry: self.input.reset_calibration_on_entry,
            log_reports: self.input.log_reports,
        }
    }

    /// Calibration switch debounce interval.
    #[must_use]
    pub fn switch_debounce(&self) -> Duration {
        Duration::from_millis(self.input.switch_debounce_ms)
    }

    /// Keyboard task options derived from this configuration.
    #[must_use]
    pub fn keyboard_options(&self) -> KeyboardOptions {
        KeyboardOptions {
            period: Duration::from_millis(self.keyboard.period_ms),
            pwm_period: Duration::from_millis(self.keyboard.pwm_period_ms),
            startup_delay: Duration::from_millis(self.keyboard.startup_delay_ms),
            stuck_key_reset_interval: self.keyboard.stuck_key_reset_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load_str(toml_content: &str) -> Result<Config> {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        Config::load(temp_file.path())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.input.period_ms, 25);
        assert_eq!(config.keyboard.period_ms, 5);
        assert_eq!(config.keyboard.pwm_period_ms, 100);
        assert_eq!(config.keyboard.stuck_key_reset_interval, 1000);
        assert_eq!(config.controls, ControlSettings::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[input]
period_ms = 20

[keyboard]
pwm_period_ms = 200

[controls]
pedal_deadzone = 0.1

[storage]
flash_path = "/tmp/sector.bin"

[logging]
level = "debug"
"#;

        let config = load_str(toml_content).unwrap();
        assert_eq!(config.input.period_ms, 20);
        assert_eq!(config.keyboard.pwm_period_ms, 200);
        assert_eq!(config.controls.pedal_deadzone, 0.1);
        assert_eq!(config.controls.tiller_deadzone, 0.07);
        assert_eq!(config.storage.flash_path, "/tmp/sector.bin");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = load_str("").unwrap();
        assert_eq!(config.storage.sector_size, 4096);
        assert!(config.input.reset_calibration_on_entry);
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        assert!(Config::load(path).is_ok());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(load_str("[input\nperiod_ms = 3"), Err(TankError::Config(_))));
    }

    #[test]
    fn test_wrong_type() {
        assert!(matches!(
            load_str("[keyboard]\nperiod_ms = \"fast\""),
            Err(TankError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/tank-controls.toml"),
            Err(TankError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_input_period() {
        let mut config = Config::default();
        config.input.period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pwm_period_shorter_than_tick() {
        let mut config = Config::default();
        config.keyboard.pwm_period_ms = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_reset_interval() {
        let mut config = Config::default();
        config.keyboard.stuck_key_reset_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_kill_switch_reads() {
        let mut config = Config::default();
        config.keyboard.kill_switch_release_reads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_controls() {
        let mut config = Config::default();
        config.controls.tiller_handbrake_threshold_begin = 0.95;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tiller_handbrake_threshold_begin"));
    }

    #[test]
    fn test_sector_too_small() {
        let mut config = Config::default();
        config.storage.sector_size = RECORD_SIZE - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_flash_path() {
        let mut config = Config::default();
        config.storage.flash_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_options_conversion() {
        let config = Config::default();
        let input = config.input_options();
        let keyboard = config.keyboard_options();

        assert_eq!(input.period, Duration::from_millis(25));
        assert!(input.reset_calibration_on_entry);
        assert_eq!(keyboard.period, Duration::from_millis(5));
        assert_eq!(keyboard.pwm_period, Duration::from_millis(100));
        assert_eq!(keyboard.startup_delay, Duration::from_secs(1));
        assert_eq!(config.switch_debounce(), Duration::from_millis(200));
    }
}
