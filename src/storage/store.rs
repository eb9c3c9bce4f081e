//! Ticket record store
//!
//! The coordinator calls the store while holding its own lock, so every
//! backend here is synchronous. Both backends hand out the unassigned record
//! with the lowest id, i.e. retrieval follows creation order.

use crate::core::{TicketId, TicketRecord};
use crate::log_store;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

/// Persistence failures for a single record operation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("ticket {0} not found")]
    NotFound(TicketId),

    #[error("ticket {0} already assigned to a customer")]
    AlreadyAssigned(TicketId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read/write contract of the durable record store
pub trait TicketStore: Send + Sync {
    /// Persist a new record and return its store-assigned id
    fn insert(&self, vendor_id: u32, customer_id: Option<u32>) -> Result<TicketId, StoreError>;

    /// Any one record with a vendor and no customer
    fn find_one_unassigned(&self) -> Result<Option<TicketRecord>, StoreError>;

    /// Set the owning customer of a record. Fails if it already has one.
    fn assign(&self, id: TicketId, customer_id: u32) -> Result<(), StoreError>;

    /// Snapshot of every record, ordered by id
    fn records(&self) -> Result<Vec<TicketRecord>, StoreError>;
}

/// Record set shared by both backends
#[derive(Debug, Default)]
struct RecordTable {
    next_id: u64,
    records: BTreeMap<TicketId, TicketRecord>,
}

impl RecordTable {
    fn from_records(records: Vec<TicketRecord>) -> Self {
        let next_id = records.iter().map(|r| r.id.as_raw()).max().unwrap_or(0);
        Self {
            next_id,
            records: records.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    fn insert(&mut self, vendor_id: u32, customer_id: Option<u32>) -> TicketId {
        self.next_id += 1;
        let id = TicketId::from_raw(self.next_id);
        self.records.insert(
            id,
            TicketRecord {
                id,
                vendor_id,
                customer_id,
            },
        );
        id
    }

    fn find_one_unassigned(&self) -> Option<TicketRecord> {
        self.records.values().find(|r| r.is_unassigned()).cloned()
    }

    fn assign(&mut self, id: TicketId, customer_id: u32) -> Result<(), StoreError> {
        let record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.customer_id.is_some() {
            return Err(StoreError::AlreadyAssigned(id));
        }
        record.customer_id = Some(customer_id);
        Ok(())
    }

    fn snapshot(&self) -> Vec<TicketRecord> {
        self.records.values().cloned().collect()
    }
}

/// Volatile store, used by default and in tests
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    table: Mutex<RecordTable>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TicketStore for InMemoryTicketStore {
    fn insert(&self, vendor_id: u32, customer_id: Option<u32>) -> Result<TicketId, StoreError> {
        Ok(self.table.lock().insert(vendor_id, customer_id))
    }

    fn find_one_unassigned(&self) -> Result<Option<TicketRecord>, StoreError> {
        Ok(self.table.lock().find_one_unassigned())
    }

    fn assign(&self, id: TicketId, customer_id: u32) -> Result<(), StoreError> {
        self.table.lock().assign(id, customer_id)
    }

    fn records(&self) -> Result<Vec<TicketRecord>, StoreError> {
        Ok(self.table.lock().snapshot())
    }
}

/// File-backed store
///
/// Keeps the table in memory and rewrites the whole JSON file after each
/// mutation. Records survive across runs and processes. If the rewrite fails
/// the in-memory change is kept and the error is returned to the caller.
pub struct JsonFileTicketStore {
    path: PathBuf,
    table: Mutex<RecordTable>,
}

impl JsonFileTicketStore {
    /// Open the store at `path`, loading existing records if the file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<TicketRecord> = match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        log_store!(Level::DEBUG, "Opened {} with {} records", path.display(), records.len());

        Ok(Self {
            path,
            table: Mutex::new(RecordTable::from_records(records)),
        })
    }

    fn persist(&self, table: &RecordTable) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(&mut writer, &table.snapshot())?;
        writer.flush()?;
        Ok(())
    }
}

impl TicketStore for JsonFileTicketStore {
    fn insert(&self, vendor_id: u32, customer_id: Option<u32>) -> Result<TicketId, StoreError> {
        let mut table = self.table.lock();
        let id = table.insert(vendor_id, customer_id);
        self.persist(&table)?;
        Ok(id)
    }

    fn find_one_unassigned(&self) -> Result<Option<TicketRecord>, StoreError> {
        Ok(self.table.lock().find_one_unassigned())
    }

    fn assign(&self, id: TicketId, customer_id: u32) -> Result<(), StoreError> {
        let mut table = self.table.lock();
        table.assign(id, customer_id)?;
        self.persist(&table)
    }

    fn records(&self) -> Result<Vec<TicketRecord>, StoreError> {
        Ok(self.table.lock().snapshot())
    }
}
