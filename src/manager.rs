//! Simulation manager
//!
//! Thin configuration surface over one PoolCoordinator. Holds the worker
//! totals for the next start and exposes start/stop/status to whatever
//! outer layer drives the simulation (the binary, an API server, tests).

use crate::core::TransactionEvent;
use crate::infrastructure::config::{Config, StoreBackend};
use crate::infrastructure::metrics::MetricsSnapshot;
use crate::log_main;
use crate::pool::PoolCoordinator;
use crate::storage::{
    InMemoryTicketStore, JsonFileLog, JsonFileTicketStore, TicketStore, TransactionLogSink,
};
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

/// Status report for the outer layer
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationStatus {
    pub run_id: Option<Uuid>,
    pub running: bool,
    pub capacity_reached: bool,
    pub issued: u64,
    pub remaining: u64,
    pub max_capacity: u64,
    pub vendors: i64,
    pub customers: i64,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerTotals {
    vendors: i64,
    customers: i64,
}

/// Owns the coordinator and the settings of the next run
pub struct SimulationManager {
    coordinator: Arc<PoolCoordinator>,
    log_sink: Arc<dyn TransactionLogSink>,
    totals: Mutex<WorkerTotals>,
}

impl SimulationManager {
    pub fn new(store: Arc<dyn TicketStore>, log_sink: Arc<dyn TransactionLogSink>) -> Self {
        Self {
            coordinator: Arc::new(PoolCoordinator::new(store, log_sink.clone())),
            log_sink,
            totals: Mutex::new(WorkerTotals::default()),
        }
    }

    /// Build the storage backends from config and apply `[simulation]`
    ///
    /// # Errors
    /// Store open failures, and `InvalidConfiguration` for negative pacing or capacity.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn TicketStore> = match config.storage.backend {
            StoreBackend::Memory => Arc::new(InMemoryTicketStore::new()),
            StoreBackend::Json => Arc::new(JsonFileTicketStore::open(&config.storage.store_path)?),
        };
        let log_sink = Arc::new(JsonFileLog::new(&config.storage.transaction_log_path));

        let manager = Self::new(store, log_sink);
        let sim = &config.simulation;
        manager.set_vendor_total(sim.vendors);
        manager.set_customer_total(sim.customers);
        manager.set_simulation_config(sim.release_interval_ms, sim.retrieval_interval_ms, sim.max_capacity)?;

        log_main!(
            Level::INFO,
            "Manager ready: {:?} store, log at {}",
            config.storage.backend,
            config.storage.transaction_log_path.display()
        );
        Ok(manager)
    }

    /// Vendor count for the next start; validated at start
    pub fn set_vendor_total(&self, count: i64) {
        self.totals.lock().vendors = count;
    }

    /// Customer count for the next start; validated at start
    pub fn set_customer_total(&self, count: i64) {
        self.totals.lock().customers = count;
    }

    pub fn set_simulation_config(&self, release_rate_ms: i64, retrieval_rate_ms: i64, max_capacity: i64) -> Result<()> {
        self.coordinator.configure(release_rate_ms, retrieval_rate_ms, max_capacity)
    }

    /// Start a run with the current totals; returns its id
    pub fn start(&self) -> Result<Uuid> {
        let totals = *self.totals.lock();
        self.coordinator.start(totals.vendors, totals.customers)
    }

    /// Stop the current run. Blocks until workers are joined and the log is
    /// flushed, unless another stop already claimed the shutdown.
    pub fn stop(&self) -> bool {
        self.coordinator.stop()
    }

    pub fn get_remaining_tickets(&self) -> u64 {
        self.coordinator.remaining_tickets()
    }

    /// Contents of the last flushed transaction log
    pub fn get_transaction_log(&self) -> Result<Vec<TransactionEvent>> {
        Ok(self.log_sink.read_all()?)
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// See [`PoolCoordinator::wait_for_shutdown`]
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        self.coordinator.wait_for_shutdown(timeout)
    }

    pub fn status(&self) -> SimulationStatus {
        let snapshot = self.coordinator.snapshot();
        let totals = *self.totals.lock();

        SimulationStatus {
            run_id: snapshot.run_id,
            running: snapshot.running,
            capacity_reached: snapshot.capacity_reached,
            issued: snapshot.issued,
            remaining: snapshot.remaining,
            max_capacity: snapshot.max_capacity,
            vendors: totals.vendors,
            customers: totals.customers,
            metrics: self.coordinator.metrics(),
        }
    }
}
