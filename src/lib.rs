//! Bounded ticket pool simulation
//!
//! Vendor workers issue tickets into a capacity-limited pool while customer
//! workers take them out, until capacity is spent and the pool is empty.

pub mod core;
pub mod infrastructure;
pub mod manager;
pub mod pool;
pub mod storage;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use infrastructure::config::{Config, SimulationConfig, StorageConfig};
pub use manager::{SimulationManager, SimulationStatus};
pub use pool::PoolCoordinator;

use infrastructure::config::ConfigError;
use storage::{LogSinkError, StoreError};
use thiserror::Error;

/// Main error type for the ticket pool
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Simulation already running")]
    AlreadyRunning,

    #[error("Ticket store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transaction log error: {0}")]
    LogSink(#[from] LogSinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SimError>;
