//! Transaction log sinks
//!
//! The coordinator hands the whole pending event sequence to the sink once,
//! at stop time. The JSON sink overwrites its file on every flush.

use crate::core::TransactionEvent;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Transaction log write/read failures
#[derive(Error, Debug)]
pub enum LogSinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append+flush contract for the transaction log
pub trait TransactionLogSink: Send + Sync {
    /// Replace the persisted log with `events`
    fn write_all(&self, events: &[TransactionEvent]) -> Result<(), LogSinkError>;

    /// Read back the last persisted log; empty if nothing was flushed yet
    fn read_all(&self) -> Result<Vec<TransactionEvent>, LogSinkError>;
}

/// Pretty-printed JSON array file
#[derive(Debug, Clone)]
pub struct JsonFileLog {
    path: PathBuf,
}

impl JsonFileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TransactionLogSink for JsonFileLog {
    fn write_all(&self, events: &[TransactionEvent]) -> Result<(), LogSinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // File::create truncates, so each flush fully overwrites the previous run
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, events)?;
        writer.flush()?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<TransactionEvent>, LogSinkError> {
        match File::open(&self.path) {
            Ok(file) => Ok(serde_json::from_reader(BufReader::new(file))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LogSinkError::Io(e)),
        }
    }
}

/// In-memory sink, keeps the last flushed sequence
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<TransactionEvent>>,
    flushes: Mutex<u32>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write_all` calls so far
    pub fn flush_count(&self) -> u32 {
        *self.flushes.lock()
    }
}

impl TransactionLogSink for MemoryLog {
    fn write_all(&self, events: &[TransactionEvent]) -> Result<(), LogSinkError> {
        *self.events.lock() = events.to_vec();
        *self.flushes.lock() += 1;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<TransactionEvent>, LogSinkError> {
        Ok(self.events.lock().clone())
    }
}
