//! Centralized file-based logging system
//!
//! Writes logs to files under the configured directory, separated by log type:
//! - main/  - All application logs (JSON lines)
//! - error/ - Error and warning logs only
//! - pool/  - Coordinator, worker and store activity
//!
//! A console layer is always installed as well.

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TYPES: [&str; 3] = ["main", "error", "pool"];

/// Initialize centralized file logging
///
/// Creates the log directory tree and sets up one appender per log type.
/// Returns the WorkerGuards, which must be kept alive for the duration of the program.
pub fn init_logging(config: &LoggingConfig) -> io::Result<Vec<WorkerGuard>> {
    for log_type in &LOG_TYPES {
        fs::create_dir_all(config.dir.join(log_type))?;
    }

    let mut guards = Vec::new();

    // Main log - all logs
    let (main_appender, main_guard) = create_appender(&config.dir, "main");
    guards.push(main_guard);

    // Error log - ERROR and WARN only
    let (error_appender, error_guard) = create_appender(&config.dir, "error");
    guards.push(error_guard);

    // Pool log - batch activity
    let (pool_appender, pool_guard) = create_appender(&config.dir, "pool");
    guards.push(pool_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let pool_layer = tracing_subscriber::fmt::layer()
        .with_writer(pool_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            is_pool_target(metadata.target())
        }));

    // Console layer for development
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize subscriber with all layers
    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(pool_layer)
        .with(console_layer)
        .init();

    tracing::info!(
        "Logging system initialized. Log files in {}",
        config.dir.display()
    );

    Ok(guards)
}

/// Exact targets of the pool macros; the crate's default target is `ticket_pool`
fn is_pool_target(target: &str) -> bool {
    matches!(target, "pool" | "worker" | "store")
}

/// Create a daily rolling file appender under `<dir>/<name>/`
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir.join(name), name);

    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_pool {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "pool", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_worker {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "worker", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_store {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "store", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
