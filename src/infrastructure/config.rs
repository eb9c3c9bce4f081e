//! Configuration management for the ticket pool
//!
//! Loads configuration from config.toml at startup.
//! Simulation values are kept signed so that negative input reaches
//! validation instead of failing to parse.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Application configuration
///
/// Loaded from config.toml at startup. Every section falls back to
/// its defaults when absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Simulation parameters
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Record store and transaction log locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Number of vendor workers
    #[serde(default = "default_vendors")]
    pub vendors: i64,

    /// Number of customer workers
    #[serde(default = "default_customers")]
    pub customers: i64,

    /// Pause between vendor batches (ms)
    #[serde(default = "default_release_interval")]
    pub release_interval_ms: i64,

    /// Pause between customer batches (ms)
    #[serde(default = "default_retrieval_interval")]
    pub retrieval_interval_ms: i64,

    /// Total tickets that may be issued in one run
    #[serde(default = "default_max_capacity")]
    pub max_capacity: i64,
}

/// Which ticket record store backs the coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Json,
}

/// Storage settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Record file, used by the json backend
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Transaction log file, overwritten on every stop
    #[serde(default = "default_transaction_log_path")]
    pub transaction_log_path: PathBuf,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// EnvFilter directive, e.g. "info" or "ticket_pool=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            vendors: default_vendors(),
            customers: default_customers(),
            release_interval_ms: default_release_interval(),
            retrieval_interval_ms: default_retrieval_interval(),
            max_capacity: default_max_capacity(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            store_path: default_store_path(),
            transaction_log_path: default_transaction_log_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

fn default_vendors() -> i64 {
    2
}

fn default_customers() -> i64 {
    2
}

fn default_release_interval() -> i64 {
    1000
}

fn default_retrieval_interval() -> i64 {
    1200
}

fn default_max_capacity() -> i64 {
    50
}

fn default_store_path() -> PathBuf {
    PathBuf::from("tickets.json")
}

fn default_transaction_log_path() -> PathBuf {
    PathBuf::from("transaction_logs.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// The path can be overridden with `CONFIG_PATH`.
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
