//! Infrastructure - everything around the pool itself
//!
//! This module contains:
//! - Configuration management
//! - Logging setup
//! - Pool metrics

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{Config, ConfigError, LoggingConfig, SimulationConfig, StorageConfig, StoreBackend};
pub use metrics::{MetricsSnapshot, PoolMetrics};
