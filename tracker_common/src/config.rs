//! Configuration loading traits and types.
//!
//! The firmware image reads one TOML file, `tracker.toml`. Every section is
//! optional and falls back to the values in [`crate::consts`].
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "asset-tracker"
//!
//! [runtime]
//! mailbox_capacity = 10
//! event_pool_capacity = 64
//!
//! [cloud]
//! connect_retries = 10
//!
//! [shutdown]
//! reboot_delay_s = 5
//! fallback_timeout_s = 30
//!
//! [sampling]
//! default_timeout_s = 10
//! location_margin_s = 5
//! location_floor_s = 30
//!
//! [storage]
//! settings_dir = "settings"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    CLOUD_CONNECT_RETRIES, DATA_GET_TIMEOUT_S, EVENT_POOL_CAPACITY, LOCATION_TIMEOUT_FLOOR_S,
    LOCATION_TIMEOUT_MARGIN_S, MAILBOX_CAPACITY, REBOOT_DELAY_S, REBOOT_FALLBACK_S,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Fields every tracker binary shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance identifier, shows up in log lines.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "asset-tracker".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Sections ───────────────────────────────────────────────────────

/// Queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    pub mailbox_capacity: usize,
    pub event_pool_capacity: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            mailbox_capacity: MAILBOX_CAPACITY,
            event_pool_capacity: EVENT_POOL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSection {
    /// Reconnect attempts before `NetworkUnreachable` is raised.
    pub connect_retries: u32,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            connect_retries: CLOUD_CONNECT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownSection {
    /// Reboot delay once every module acknowledged.
    pub reboot_delay_s: u64,
    /// Unconditional reboot after the shutdown request.
    pub fallback_timeout_s: u64,
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            reboot_delay_s: REBOOT_DELAY_S,
            fallback_timeout_s: REBOOT_FALLBACK_S,
        }
    }
}

impl ShutdownSection {
    pub fn reboot_delay(&self) -> Duration {
        Duration::from_secs(self.reboot_delay_s)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_s)
    }
}

/// Fan-in budget parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSection {
    /// Budget when no location is requested.
    pub default_timeout_s: u64,
    /// Subtracted from the interval, added to the location timeout.
    pub location_margin_s: u64,
    /// Lower bound when location is requested.
    pub location_floor_s: u64,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            default_timeout_s: DATA_GET_TIMEOUT_S,
            location_margin_s: LOCATION_TIMEOUT_MARGIN_S,
            location_floor_s: LOCATION_TIMEOUT_FLOOR_S,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Root directory of the settings store.
    pub settings_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            settings_dir: PathBuf::from("settings"),
        }
    }
}

/// Complete `tracker.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub shared: SharedConfig,
    pub runtime: RuntimeSection,
    pub cloud: CloudSection,
    pub shutdown: ShutdownSection,
    pub sampling: SamplingSection,
    pub storage: StorageSection,
}

impl TrackerConfig {
    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` if a capacity or timeout is zero, or if
    /// the reboot delay is not strictly shorter than the fallback timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));
        if self.runtime.mailbox_capacity == 0 {
            return fail("runtime.mailbox_capacity must be > 0");
        }
        if self.runtime.event_pool_capacity == 0 {
            return fail("runtime.event_pool_capacity must be > 0");
        }
        if self.sampling.default_timeout_s == 0 || self.sampling.location_floor_s == 0 {
            return fail("sampling timeouts must be > 0");
        }
        if self.shutdown.reboot_delay_s >= self.shutdown.fallback_timeout_s {
            return fail("shutdown.reboot_delay_s must be shorter than fallback_timeout_s");
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
