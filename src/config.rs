//! Channel configuration.
//!
//! Boot flags are startup parameters: a channel armed here collects from
//! the first sample until its ring has been filled once.

use crate::channel::{BootMode, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid ring capacity {0} (must be a non-zero power of two)")]
    InvalidCapacity(usize),
    #[error("invalid boot flag {value} for {channel} (must be 0 or 1)")]
    InvalidBootFlag { channel: &'static str, value: u8 },
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Ring sizing shared by all channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Ring capacity in samples.
    pub capacity: usize,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Per-channel boot flags: 0 normal, 1 armed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootConfig {
    /// Raw entropy samples.
    #[serde(default)]
    pub raw_entropy: u8,
    /// Raw structured-array samples.
    #[serde(default)]
    pub raw_array: u8,
    /// Interrupt handling time.
    #[serde(default)]
    pub irq_perf: u8,
}

impl BootConfig {
    /// Parses one flag. `Completed` can only be reached by the engine.
    fn parse(channel: &'static str, value: u8) -> Result<BootMode, ConfigError> {
        match BootMode::try_from(value) {
            Ok(mode @ (BootMode::Off | BootMode::Armed)) => Ok(mode),
            _ => Err(ConfigError::InvalidBootFlag { channel, value }),
        }
    }

    /// Boot mode for the raw entropy channel.
    pub fn raw_entropy_mode(&self) -> Result<BootMode, ConfigError> {
        Self::parse("raw_entropy", self.raw_entropy)
    }

    /// Boot mode for the raw array channel.
    pub fn raw_array_mode(&self) -> Result<BootMode, ConfigError> {
        Self::parse("raw_array", self.raw_array)
    }

    /// Boot mode for the interrupt performance channel.
    pub fn irq_perf_mode(&self) -> Result<BootMode, ConfigError> {
        Self::parse("irq_perf", self.irq_perf)
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { metrics_port: 0 }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestingConfig {
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub boot: BootConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl TestingConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TestingConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacity = self.channels.capacity;
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(ConfigError::InvalidCapacity(capacity));
        }
        self.boot.raw_entropy_mode()?;
        self.boot.raw_array_mode()?;
        self.boot.irq_perf_mode()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = TestingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels.capacity, 1024);
    }

    #[test]
    fn test_non_power_of_two_capacity_invalid() {
        let mut config = TestingConfig::default();
        config.channels.capacity = 1000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCapacity(1000))
        ));
    }

    #[test]
    fn test_parse_boot_flags() {
        let config = TestingConfig::from_toml(
            r#"
            [channels]
            capacity = 64

            [boot]
            raw_array = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.channels.capacity, 64);
        assert_eq!(config.boot.raw_entropy_mode().unwrap(), BootMode::Off);
        assert_eq!(config.boot.raw_array_mode().unwrap(), BootMode::Armed);
        assert_eq!(config.output.metrics_port, 0);
    }

    #[test]
    fn test_completed_boot_flag_rejected() {
        let result = TestingConfig::from_toml("[boot]\nirq_perf = 2\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidBootFlag {
                channel: "irq_perf",
                value: 2
            })
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            TestingConfig::from_toml("[channels\ncapacity = 4"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
