//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/perfmon/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/perfmon/` (~/.config/perfmon/)
//! - State/Logs: `$XDG_STATE_HOME/perfmon/` (~/.local/state/perfmon/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Ingestion endpoint configuration
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Certificate verification policy for the ingestion endpoint
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslVerifyMode {
    /// Only accept certificates that chain to a trusted root
    #[default]
    Peer,
    /// Accept any certificate
    None,
}

/// Collector configuration
///
/// Values are not validated when written. An endpoint that does not parse
/// only surfaces as a failed delivery attempt.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    /// Ingestion endpoint, posted to as-is (e.g., `https://perfmon.example.com/requests`)
    pub service_url: Option<String>,

    /// API key sent with every batch
    pub api_key: Option<String>,

    /// TLS certificate verification policy
    #[serde(default)]
    pub ssl_verify_mode: SslVerifyMode,

    /// Reserved; not consulted by delivery
    #[serde(default)]
    pub params_inclusion_threshold: Option<f64>,

    /// Minimum seconds between two delivery attempts
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// HTTP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            api_key: None,
            ssl_verify_mode: SslVerifyMode::default(),
            params_inclusion_threshold: None,
            flush_interval_secs: default_flush_interval(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl CollectorConfig {
    /// Check if both endpoint and API key are set
    ///
    /// A collector is only activated when this holds.
    pub fn is_ready(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.service_url) && present(&self.api_key)
    }

    /// Configured endpoint, or an empty string when unset
    pub fn endpoint(&self) -> &str {
        self.service_url.as_deref().unwrap_or_default()
    }

    /// Configured API key, or an empty string when unset
    pub fn credential(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// Minimum time between two delivery attempts
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// HTTP connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_flush_interval() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/perfmon/config.toml` (~/.config/perfmon/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("perfmon").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/perfmon/` (~/.local/state/perfmon/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("perfmon")
    }
}
