//! Configuration types for reqtape

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fingerprint::{FingerprintConfig, MAX_LENGTH, MIN_LENGTH};
use crate::recorder::{LabelStrategy, Mode};
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Operating mode
    pub mode: Mode,
    /// Directory holding the fixtures
    pub fixture_dir: PathBuf,
    /// Fingerprint settings
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    /// Label written in front of new fixture names
    #[serde(default)]
    pub label: LabelStrategy,
    /// Delegate network settings
    #[serde(default)]
    pub network: NetworkConfig,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Network settings for the default delegate transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Timeout for one exchange, including reading the body
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long idle pooled connections are kept
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
    /// Idle connections kept per host
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

fn default_pool_max_idle_per_host() -> usize {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}

/// Resource limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Maximum response body size in bytes
    pub max_response_size: usize,
    /// Maximum headers accepted when parsing a snapshot
    pub max_headers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 16 * 1024 * 1024,   // 16 MB
            max_response_size: 256 * 1024 * 1024, // 256 MB
            max_headers: 128,
        }
    }
}

impl Config {
    /// Configuration with defaults for everything but mode and directory
    #[must_use]
    pub fn new(mode: Mode, fixture_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            fixture_dir: fixture_dir.into(),
            fingerprint: FingerprintConfig::default(),
            label: LabelStrategy::default(),
            network: NetworkConfig::default(),
            limits: LimitsConfig::default(),
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    ///
    /// # Panics
    ///
    /// Panics if resource limits are zero (programming error)
    pub fn validate(&self) -> Result<()> {
        if self.fixture_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError(
                "fixture_dir cannot be empty".to_string(),
            ));
        }

        // Replay never creates the directory, so a typo would only show up
        // as a wall of "not found" errors
        if self.mode == Mode::Replay && !self.fixture_dir.is_dir() {
            return Err(Error::ConfigError(format!(
                "Fixture directory does not exist: {}",
                self.fixture_dir.display()
            )));
        }

        let length = self.fingerprint.length;
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
            return Err(Error::ConfigError(format!(
                "fingerprint.length must be in {MIN_LENGTH}..={MAX_LENGTH}, got {length}"
            )));
        }

        if let LabelStrategy::Fixed(label) = &self.label {
            if label.trim().is_empty() {
                return Err(Error::ConfigError(
                    "fixed label cannot be empty".to_string(),
                ));
            }
        }

        if self.network.timeout_ms == 0 {
            return Err(Error::ConfigError(
                "network.timeout_ms cannot be 0".to_string(),
            ));
        }

        assert!(
            self.limits.max_request_size > 0,
            "max_request_size must be > 0"
        );
        assert!(
            self.limits.max_response_size > 0,
            "max_response_size must be > 0"
        );
        assert!(self.limits.max_headers > 0, "max_headers must be > 0");

        Ok(())
    }
}
