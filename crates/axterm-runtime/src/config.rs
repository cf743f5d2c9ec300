//! Runtime Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! 1. Default values
//! 2. `axterm.toml` in the working directory (if present)
//! 3. An explicitly supplied file
//! 4. Environment variables prefixed `AXTERM_`, nested with `__`
//!    (e.g. `AXTERM_PACING__CAPACITY=4096`)

use std::path::Path;

use axterm_core::{RateLimitConfig, SequencerConfig};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Runtime Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the link reliability runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Token bucket defaults for every destination
    pub pacing: RateLimitConfig,
    /// Received-packet retention
    pub sequencer: SequencerConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`, `axterm_runtime=debug`)
    pub level: String,
    /// Include module targets in log lines
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl RuntimeConfig {
    const DEFAULT_FILE: &'static str = "axterm.toml";
    const ENV_PREFIX: &'static str = "AXTERM_";

    fn base_figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(Self::DEFAULT_FILE))
    }

    /// Load from defaults, `axterm.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let figment = Self::base_figment().merge(Env::prefixed(Self::ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    /// Load with an explicit file layered above `axterm.toml`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Loading(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        let figment = Self::base_figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pacing
            .validate()
            .map_err(|e| ConfigError::Validation(format!("pacing: {}", e)))?;
        self.sequencer
            .validate()
            .map_err(|e| ConfigError::Validation(format!("sequencer: {}", e)))?;
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML, suitable for writing out a starter `axterm.toml`
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))
    }
}

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pacing, RateLimitConfig::vhf_1200());
        assert_eq!(config.sequencer.max_items, None);
    }

    #[test]
    fn test_load_layers_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "axterm.toml",
                r#"
                [pacing]
                rate_per_second = 2.0
                capacity = 10.0

                [sequencer]
                max_items = 500
                "#,
            )?;
            jail.set_env("AXTERM_PACING__CAPACITY", "20.0");

            let config = RuntimeConfig::load().expect("config should load");
            assert_eq!(config.pacing.rate_per_second, 2.0);
            assert_eq!(config.pacing.capacity, 20.0);
            assert_eq!(config.sequencer.max_items, Some(500));
            assert_eq!(config.logging.level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[pacing]\nrate_per_second = 0.0\n")?;

            let err = RuntimeConfig::load_from_file("bad.toml").unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = RuntimeConfig::load_from_file("/nonexistent/axterm.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Loading(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RuntimeConfig {
            pacing: RateLimitConfig::uhf_9600(),
            ..Default::default()
        };
        let rendered = config.to_toml_string().unwrap();
        let parsed: RuntimeConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
