//! Test utilities shared across modules

use crate::core::{TicketId, TicketRecord, TransactionEvent};
use crate::pool::PoolCoordinator;
use crate::storage::{
    InMemoryTicketStore, LogSinkError, MemoryLog, StoreError, TicketStore, TransactionLogSink,
};
use crossbeam::channel::{self, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Unique path under the system temp dir (nothing is created)
pub fn temp_path(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ticket-pool-{}-{}", prefix, uuid::Uuid::new_v4()))
}

/// Configured coordinator over in-memory collaborators
pub fn memory_coordinator(
    release_ms: i64,
    retrieval_ms: i64,
    max_capacity: i64,
) -> (Arc<PoolCoordinator>, Arc<InMemoryTicketStore>, Arc<MemoryLog>) {
    let store = Arc::new(InMemoryTicketStore::new());
    let log = Arc::new(MemoryLog::new());
    let coordinator = Arc::new(PoolCoordinator::new(store.clone(), log.clone()));
    coordinator
        .configure(release_ms, retrieval_ms, max_capacity)
        .unwrap();
    (coordinator, store, log)
}

/// Poll `condition` every millisecond until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// In-memory store whose every n-th insert fails
pub struct FlakyStore {
    inner: InMemoryTicketStore,
    every: u64,
    inserts: AtomicU64,
}

impl FlakyStore {
    pub fn failing_every(every: u64) -> Self {
        Self {
            inner: InMemoryTicketStore::new(),
            every,
            inserts: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryTicketStore {
        &self.inner
    }
}

impl TicketStore for FlakyStore {
    fn insert(&self, vendor_id: u32, customer_id: Option<u32>) -> Result<TicketId, StoreError> {
        let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if n % self.every == 0 {
            return Err(StoreError::Unavailable(format!("insert #{} rejected", n)));
        }
        self.inner.insert(vendor_id, customer_id)
    }

    fn find_one_unassigned(&self) -> Result<Option<TicketRecord>, StoreError> {
        self.inner.find_one_unassigned()
    }

    fn assign(&self, id: TicketId, customer_id: u32) -> Result<(), StoreError> {
        self.inner.assign(id, customer_id)
    }

    fn records(&self) -> Result<Vec<TicketRecord>, StoreError> {
        self.inner.records()
    }
}

/// Memory sink whose flush blocks until the returned sender is dropped
pub struct GatedLog {
    inner: MemoryLog,
    gate: Receiver<()>,
}

impl GatedLog {
    pub fn new() -> (Self, Sender<()>) {
        let (tx, rx) = channel::bounded(0);
        let log = Self {
            inner: MemoryLog::new(),
            gate: rx,
        };
        (log, tx)
    }
}

impl TransactionLogSink for GatedLog {
    fn write_all(&self, events: &[TransactionEvent]) -> Result<(), LogSinkError> {
        // Disconnect is the release signal
        let _ = self.gate.recv();
        self.inner.write_all(events)
    }

    fn read_all(&self) -> Result<Vec<TransactionEvent>, LogSinkError> {
        self.inner.read_all()
    }
}
