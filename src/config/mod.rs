//! # Configuration Management Module
//!
//! TOML-backed configuration for the firmlink CLI, with serde defaults for
//! every optional field so a minimal file stays minimal.
//!
//! ## Configuration File Format
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 57600
//! settle_ms = 3000
//!
//! [logging]
//! level = "info"
//! # file = "firmlink.log"
//!
//! [cadence]
//! pin = 8
//! debounce_ticks = 1
//! zero_timeout_ms = 1500
//! smoothing_window = 50
//! ```
//!
//! Values can be overridden per-run with CLI flags; precedence is
//! CLI args > config file > defaults.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub serial: SerialConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
}

/// Serial link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. /dev/ttyUSB0 or COM4. Empty means guess at runtime.
    #[serde(default)]
    pub port: String,
    /// Stock Firmata sketches default to 57600.
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Wait after the version handshake before declaring the link ready,
    /// covering the board's post-open reboot.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

/// Settings for the cadence subcommand (reed switch on a digital pin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_cadence_pin")]
    pub pin: u8,
    /// Pump ticks to skip after each detected edge (contact debounce).
    #[serde(default = "default_debounce_ticks")]
    pub debounce_ticks: u32,
    /// With no revolution for this long, cadence reads zero.
    #[serde(default = "default_zero_timeout_ms")]
    pub zero_timeout_ms: u64,
    /// Trailing-average window for the smoothed readout.
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
}

fn default_baud() -> u32 {
    57600
}

fn default_settle_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cadence_pin() -> u8 {
    8
}

fn default_debounce_ticks() -> u32 {
    1
}

fn default_zero_timeout_ms() -> u64 {
    1500
}

fn default_smoothing_window() -> usize {
    50
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            pin: default_cadence_pin(),
            debounce_ticks: default_debounce_ticks(),
            zero_timeout_ms: default_zero_timeout_ms(),
            smoothing_window: default_smoothing_window(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            logging: LoggingConfig::default(),
            cadence: CadenceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("serial.baud_rate must be nonzero"));
        }
        if self.cadence.smoothing_window == 0 {
            return Err(anyhow!("cadence.smoothing_window must be at least 1"));
        }
        Ok(())
    }
}
