//! Pool coordinator
//!
//! Owns all shared simulation state behind one mutex and one condition
//! variable. Vendors block while the pool is not running, customers block
//! while it is empty; every mutation wakes all waiters because both sides can
//! depend on the same transition.
//!
//! The record store is called while the lock is held, so every batch is
//! serialized behind store latency. Transaction events are appended in the
//! same critical section as the counter change they describe.
//!
//! Shutdown is single-shot: `stop_requested` is tested and set under the lock,
//! so whichever of an external stop or the automatic stop gets there first
//! runs the sequence and the other one is a no-op.

use crate::core::{ActorId, TransactionEvent};
use crate::infrastructure::metrics::{MetricsSnapshot, PoolMetrics};
use crate::log_pool;
use crate::pool::{Worker, WorkerRegistry};
use crate::storage::{TicketStore, TransactionLogSink};
use crate::{Result, SimError};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use uuid::Uuid;

/// Tickets a vendor adds per call, at most
pub const VENDOR_BATCH_SIZE: u64 = 5;

/// Tickets a customer retrieves per call, at most
pub const CUSTOMER_BATCH_SIZE: u64 = 4;

/// Validated pacing and capacity of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub release_interval: Duration,
    pub retrieval_interval: Duration,
    pub max_capacity: u64,
}

impl PoolSettings {
    /// # Errors
    /// `InvalidConfiguration` if the capacity or either interval is negative.
    pub fn new(release_interval_ms: i64, retrieval_interval_ms: i64, max_capacity: i64) -> Result<Self> {
        Ok(Self {
            release_interval: Duration::from_millis(non_negative(release_interval_ms, "release interval")?),
            retrieval_interval: Duration::from_millis(non_negative(retrieval_interval_ms, "retrieval interval")?),
            max_capacity: non_negative(max_capacity, "max capacity")?,
        })
    }
}

fn non_negative(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| SimError::InvalidConfiguration(format!("{} must be >= 0, got {}", what, value)))
}

/// Worker ids are `u32`, so counts above `u32::MAX` are rejected too
fn worker_count(value: i64, what: &str) -> Result<u32> {
    u32::try_from(non_negative(value, what)?)
        .map_err(|_| SimError::InvalidConfiguration(format!("{} too large: {}", what, value)))
}

/// What triggered the shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop requested from outside (manager, API, signal)
    Requested,
    /// Capacity reached and the pool drained to zero
    Exhausted,
}

/// Point-in-time copy of the pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub run_id: Option<Uuid>,
    pub running: bool,
    pub capacity_reached: bool,
    pub stop_requested: bool,
    pub issued: u64,
    pub remaining: u64,
    pub max_capacity: u64,
    pub pending_events: usize,
}

/// Everything guarded by the coordinator lock
#[derive(Debug)]
struct PoolState {
    settings: Option<PoolSettings>,
    run_id: Option<Uuid>,
    issued: u64,
    remaining: u64,
    running: bool,
    capacity_reached: bool,
    stop_requested: bool,
    /// No run active and no shutdown in progress
    idle: bool,
    events: Vec<TransactionEvent>,
}

impl PoolState {
    fn new() -> Self {
        Self {
            settings: None,
            run_id: None,
            issued: 0,
            remaining: 0,
            running: false,
            capacity_reached: false,
            stop_requested: false,
            idle: true,
            events: Vec::new(),
        }
    }

    fn max_capacity(&self) -> u64 {
        self.settings.map(|s| s.max_capacity).unwrap_or(0)
    }

    /// Neither a run nor a shutdown is in progress
    fn is_quiescent(&self) -> bool {
        !self.running && self.idle
    }

    fn reset_counters(&mut self) {
        self.issued = 0;
        self.remaining = 0;
        self.capacity_reached = false;
    }

    fn reset_for_run(&mut self, run_id: Uuid) {
        self.run_id = Some(run_id);
        self.reset_counters();
        self.stop_requested = false;
        self.running = true;
        self.idle = false;
        self.events.clear();
    }

    /// Capacity is spent and nothing is left to retrieve
    fn is_exhausted(&self) -> bool {
        self.capacity_reached && self.remaining == 0
    }
}

/// Arbiter of ticket supply and demand for one simulation
pub struct PoolCoordinator {
    state: Mutex<PoolState>,
    changed: Condvar,
    registry: Mutex<WorkerRegistry>,
    store: Arc<dyn TicketStore>,
    log_sink: Arc<dyn TransactionLogSink>,
    metrics: PoolMetrics,
}

impl PoolCoordinator {
    pub fn new(store: Arc<dyn TicketStore>, log_sink: Arc<dyn TransactionLogSink>) -> Self {
        Self {
            state: Mutex::new(PoolState::new()),
            changed: Condvar::new(),
            registry: Mutex::new(WorkerRegistry::new()),
            store,
            log_sink,
            metrics: PoolMetrics::new(),
        }
    }

    /// Set pacing and capacity for the next run
    ///
    /// Clears the counters left by a stopped run so they always fit the new capacity.
    ///
    /// # Errors
    /// `InvalidConfiguration` for negative values, `AlreadyRunning` during a run
    /// or while its shutdown is still in progress.
    pub fn configure(&self, release_interval_ms: i64, retrieval_interval_ms: i64, max_capacity: i64) -> Result<()> {
        let settings = PoolSettings::new(release_interval_ms, retrieval_interval_ms, max_capacity)?;

        let mut state = self.state.lock();
        if !state.is_quiescent() {
            return Err(SimError::AlreadyRunning);
        }
        state.settings = Some(settings);
        state.reset_counters();
        log_pool!(Level::INFO, "Pool configured: {:?}", settings);
        Ok(())
    }

    /// Reset the pool and spawn `vendors` + `customers` workers
    ///
    /// Returns immediately with the new run id.
    ///
    /// # Errors
    /// `InvalidConfiguration` for negative or oversized counts or a missing `configure`,
    /// `AlreadyRunning` if a run is active or its shutdown is still in progress,
    /// `Io` if a worker thread cannot be spawned.
    pub fn start(self: &Arc<Self>, vendors: i64, customers: i64) -> Result<Uuid> {
        let vendors = worker_count(vendors, "vendor count")?;
        let customers = worker_count(customers, "customer count")?;

        // A shutdown holds the registry while joining; fail fast instead of queueing behind it
        if !self.state.lock().is_quiescent() {
            return Err(SimError::AlreadyRunning);
        }

        // Held for the whole spawn so a racing shutdown sees every handle
        let mut registry = self.registry.lock();
        let run_id = Uuid::new_v4();

        let settings = {
            let mut state = self.state.lock();
            if !state.is_quiescent() {
                return Err(SimError::AlreadyRunning);
            }
            let settings = state.settings.ok_or_else(|| {
                SimError::InvalidConfiguration("configure must be called before start".to_string())
            })?;
            state.reset_for_run(run_id);
            settings
        };
        self.metrics.reset();

        log_pool!(
            Level::INFO,
            "Simulation {} started: {} vendors, {} customers, capacity {}",
            run_id,
            vendors,
            customers,
            settings.max_capacity
        );

        let cancel = registry.open();
        let workers = (1..=vendors)
            .map(|id| Worker::vendor(id, settings.release_interval))
            .chain((1..=customers).map(|id| Worker::customer(id, settings.retrieval_interval)));

        for worker in workers {
            match worker.spawn(Arc::clone(self), cancel.clone()) {
                Ok(handle) => registry.register(handle),
                Err(e) => {
                    log_pool!(Level::ERROR, "Failed to spawn {}: {}", worker.actor(), e);
                    drop(registry);
                    self.stop();
                    return Err(SimError::Io(e));
                }
            }
        }
        drop(registry);

        self.changed.notify_all();
        Ok(run_id)
    }

    /// Blocking vendor call: issue up to `VENDOR_BATCH_SIZE` tickets
    ///
    /// Waits while the pool is not running and returns 0 without effect if the
    /// run stops meanwhile. After capacity is reached every call is a no-op.
    /// Returns the number of tickets counted as issued by this call.
    pub fn add_tickets(&self, vendor_id: u32) -> u64 {
        let actor = ActorId::vendor(vendor_id);
        let mut state = self.state.lock();

        loop {
            if state.stop_requested {
                return 0;
            }
            if state.running {
                break;
            }
            self.changed.wait(&mut state);
        }

        if state.capacity_reached {
            self.metrics.record_noop_add();
            log_pool!(Level::DEBUG, "{} skipped: capacity already reached", actor);
            return 0;
        }

        let max_capacity = state.max_capacity();
        let batch = VENDOR_BATCH_SIZE.min(max_capacity - state.issued);

        for _ in 0..batch {
            // Counted even if persisting fails; no rollback
            state.issued += 1;
            state.remaining += 1;
            match self.store.insert(vendor_id, None) {
                Ok(id) => {
                    let remaining = state.remaining;
                    state.events.push(TransactionEvent::add(actor, remaining));
                    log_pool!(Level::TRACE, "{} issued ticket {}", actor, id);
                }
                Err(e) => {
                    self.metrics.record_persistence_failure();
                    log_pool!(Level::WARN, "{} failed to save ticket: {}", actor, e);
                }
            }
        }
        self.metrics.record_add_batch(batch);
        log_pool!(
            Level::INFO,
            "{} added {} tickets. Current pool: {}",
            actor,
            batch,
            state.remaining
        );

        if state.issued >= max_capacity {
            state.capacity_reached = true;
            log_pool!(Level::INFO, "Max capacity reached. {} stops adding tickets", actor);
        }

        // Only reachable with a zero capacity: nothing can ever be retrieved
        let shutdown = state.is_exhausted() && self.begin_shutdown(&mut state, StopReason::Exhausted);

        self.changed.notify_all();
        drop(state);

        if shutdown {
            self.finish_shutdown();
        }
        batch
    }

    /// Blocking customer call: retrieve up to `CUSTOMER_BATCH_SIZE` tickets
    ///
    /// Waits while the pool is empty and returns 0 without effect if the run
    /// stops meanwhile. If this call drains a pool whose capacity is spent, it
    /// runs the shutdown sequence before returning.
    /// Returns the number of tickets taken out of the pool.
    pub fn retrieve_tickets(&self, customer_id: u32) -> u64 {
        let actor = ActorId::customer(customer_id);
        let mut state = self.state.lock();

        loop {
            if state.stop_requested {
                return 0;
            }
            if state.remaining > 0 {
                break;
            }
            self.changed.wait(&mut state);
        }

        let batch = CUSTOMER_BATCH_SIZE.min(state.remaining);

        for _ in 0..batch {
            state.remaining -= 1;
            let assigned = self.store.find_one_unassigned().and_then(|record| match record {
                Some(record) => self.store.assign(record.id, customer_id).map(|()| Some(record.id)),
                None => Ok(None),
            });
            match assigned {
                Ok(Some(id)) => {
                    let remaining = state.remaining;
                    state.events.push(TransactionEvent::retrieve(actor, remaining));
                    log_pool!(Level::TRACE, "{} took ticket {}", actor, id);
                }
                Ok(None) => {
                    self.metrics.record_persistence_failure();
                    log_pool!(Level::WARN, "{}: no unassigned ticket record in store", actor);
                }
                Err(e) => {
                    self.metrics.record_persistence_failure();
                    log_pool!(Level::WARN, "{} failed to save ticket: {}", actor, e);
                }
            }
        }
        self.metrics.record_retrieve_batch(batch);
        log_pool!(
            Level::INFO,
            "{} retrieved {} tickets. Current pool: {}",
            actor,
            batch,
            state.remaining
        );

        let shutdown = state.is_exhausted() && self.begin_shutdown(&mut state, StopReason::Exhausted);

        self.changed.notify_all();
        drop(state);

        if shutdown {
            self.finish_shutdown();
        }
        batch
    }

    /// Request shutdown from outside
    ///
    /// Returns true if this call ran the shutdown sequence, false if the pool
    /// was not running or another stop already claimed it.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if !self.begin_shutdown(&mut state, StopReason::Requested) {
            return false;
        }
        self.changed.notify_all();
        drop(state);

        self.finish_shutdown();
        true
    }

    /// Test-and-set of `stop_requested`; must be called with the lock held
    fn begin_shutdown(&self, state: &mut PoolState, reason: StopReason) -> bool {
        if state.stop_requested || !state.running {
            return false;
        }
        state.stop_requested = true;
        state.running = false;

        match reason {
            StopReason::Requested => log_pool!(Level::INFO, "User stopped the simulation"),
            StopReason::Exhausted => log_pool!(Level::INFO, "Simulation ended: all tickets sold"),
        }
        true
    }

    /// Cancel, join, flush. Runs without the state lock held.
    fn finish_shutdown(&self) {
        let mut registry = self.registry.lock();
        registry.cancel_all();
        let joined = registry.join_all();

        let (events, run_id) = {
            let mut state = self.state.lock();
            (std::mem::take(&mut state.events), state.run_id)
        };

        match self.log_sink.write_all(&events) {
            Ok(()) => log_pool!(Level::INFO, "Saved {} transaction events", events.len()),
            Err(e) => log_pool!(Level::ERROR, "Failed to write transaction log: {}", e),
        }

        let mut state = self.state.lock();
        state.idle = true;
        self.changed.notify_all();
        drop(state);
        drop(registry);

        log_pool!(
            Level::INFO,
            "Simulation {} stopped, {} workers joined",
            run_id.map(|id| id.to_string()).unwrap_or_default(),
            joined
        );
    }

    /// Wait until no run is active and any shutdown has flushed its log
    ///
    /// Returns false on timeout.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.idle {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.idle;
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn remaining_tickets(&self) -> u64 {
        self.state.lock().remaining
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock();
        PoolSnapshot {
            run_id: state.run_id,
            running: state.running,
            capacity_reached: state.capacity_reached,
            stop_requested: state.stop_requested,
            issued: state.issued,
            remaining: state.remaining,
            max_capacity: state.max_capacity(),
            pending_events: state.events.len(),
        }
    }

    pub fn settings(&self) -> Option<PoolSettings> {
        self.state.lock().settings
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of workers registered for the current run
    pub fn live_workers(&self) -> usize {
        self.registry.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionKind;
    use crate::storage::{InMemoryTicketStore, MemoryLog};
    use crate::test_utils::{memory_coordinator, wait_until, FlakyStore, GatedLog};
    use proptest::prelude::*;
    use std::thread;

    fn sum(events: &[TransactionEvent], action: ActionKind) -> u32 {
        events
            .iter()
            .filter(|e| e.action == action)
            .map(|e| e.ticket_count)
            .sum()
    }

    #[test]
    fn test_configure_rejects_negative_capacity() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 0);
        let err = coordinator.configure(10, 10, -1).unwrap_err();
        assert!(matches!(err, SimError::InvalidConfiguration(_)));
        // Previous settings untouched
        assert_eq!(coordinator.settings().unwrap().max_capacity, 0);
    }

    #[test]
    fn test_start_requires_configure() {
        let coordinator = Arc::new(PoolCoordinator::new(
            Arc::new(InMemoryTicketStore::new()),
            Arc::new(MemoryLog::new()),
        ));
        assert!(matches!(
            coordinator.start(1, 1),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_start_rejects_negative_counts() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 10);
        assert!(matches!(
            coordinator.start(-1, 1),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 10);
        coordinator.start(0, 0).unwrap();
        assert!(matches!(coordinator.start(0, 0), Err(SimError::AlreadyRunning)));
        assert!(matches!(coordinator.configure(1, 1, 1), Err(SimError::AlreadyRunning)));
        assert!(coordinator.stop());
    }

    #[test]
    fn test_start_rejects_counts_beyond_worker_ids() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 10);
        let too_many = i64::from(u32::MAX) + 1;

        assert!(matches!(
            coordinator.start(too_many, 0),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            coordinator.start(0, too_many),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.live_workers(), 0);
    }

    #[test]
    fn test_reconfigure_after_stop_clears_counters() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 10);
        coordinator.start(0, 0).unwrap();
        coordinator.add_tickets(1);
        coordinator.add_tickets(1);
        assert!(coordinator.stop());

        // Stopped run stays visible until the next configure
        let stopped = coordinator.snapshot();
        assert_eq!(stopped.issued, 10);
        assert!(stopped.capacity_reached);

        coordinator.configure(1, 1, 5).unwrap();
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.max_capacity, 5);
        assert_eq!(snapshot.issued, 0);
        assert_eq!(snapshot.remaining, 0);
        assert!(!snapshot.capacity_reached);
        assert_eq!(snapshot.run_id, stopped.run_id);
    }

    #[test]
    fn test_configure_and_start_rejected_while_shutdown_in_progress() {
        let (log, gate) = GatedLog::new();
        let log = Arc::new(log);
        let coordinator = Arc::new(PoolCoordinator::new(
            Arc::new(InMemoryTicketStore::new()),
            log.clone(),
        ));
        coordinator.configure(10, 10, 10).unwrap();
        coordinator.start(0, 0).unwrap();
        coordinator.add_tickets(1);

        let stopper = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.stop())
        };
        assert!(wait_until(Duration::from_secs(5), || coordinator.snapshot().stop_requested));

        // Shutdown is parked in the log flush, holding the registry
        assert!(!coordinator.wait_for_shutdown(Duration::from_millis(20)));
        assert!(!coordinator.is_running());
        assert!(matches!(coordinator.configure(1, 1, 3), Err(SimError::AlreadyRunning)));
        assert!(matches!(coordinator.start(0, 0), Err(SimError::AlreadyRunning)));
        assert_eq!(coordinator.settings().unwrap().max_capacity, 10);

        drop(gate);
        assert!(stopper.join().unwrap());
        assert!(coordinator.wait_for_shutdown(Duration::from_secs(5)));
        assert_eq!(log.read_all().unwrap().len(), 5);

        coordinator.configure(1, 1, 3).unwrap();
        coordinator.start(0, 0).unwrap();
        assert!(coordinator.stop());
    }

    #[test]
    fn test_exact_event_sequence_capacity_ten() {
        let (coordinator, store, log) = memory_coordinator(10, 10, 10);
        coordinator.start(0, 0).unwrap();

        assert_eq!(coordinator.add_tickets(1), 5);
        assert_eq!(coordinator.remaining_tickets(), 5);
        assert!(!coordinator.snapshot().capacity_reached);

        assert_eq!(coordinator.add_tickets(1), 5);
        assert!(coordinator.snapshot().capacity_reached);
        assert_eq!(coordinator.remaining_tickets(), 10);

        assert_eq!(coordinator.retrieve_tickets(1), 4);
        assert_eq!(coordinator.remaining_tickets(), 6);
        assert_eq!(coordinator.retrieve_tickets(1), 4);
        assert_eq!(coordinator.remaining_tickets(), 2);
        assert!(coordinator.is_running());

        // Drains the pool: automatic stop runs inside this call
        assert_eq!(coordinator.retrieve_tickets(1), 2);
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.remaining_tickets(), 0);
        assert_eq!(log.flush_count(), 1);

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 20);
        assert_eq!(sum(&events, ActionKind::Add), 10);
        assert_eq!(sum(&events, ActionKind::Retrieve), 10);

        let remaining: Vec<u64> = events.iter().map(|e| e.remaining_after).collect();
        assert_eq!(remaining[..10], [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(remaining[10..], [9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
        assert!(events[..10].iter().all(|e| e.actor == "Vendor-1"));
        assert!(events[10..].iter().all(|e| e.actor == "Customer-1"));

        // Every ticket ends up owned by the customer
        let records = store.records().unwrap();
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| r.customer_id == Some(1)));

        // Pending buffer cleared by the flush, and nothing is appended afterwards
        assert_eq!(coordinator.snapshot().pending_events, 0);
        assert_eq!(coordinator.add_tickets(1), 0);
        assert_eq!(coordinator.snapshot().pending_events, 0);
    }

    #[test]
    fn test_last_vendor_batch_is_remainder() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 12);
        coordinator.start(0, 0).unwrap();

        assert_eq!(coordinator.add_tickets(1), 5);
        assert_eq!(coordinator.add_tickets(2), 5);
        assert_eq!(coordinator.add_tickets(1), 2);
        assert!(coordinator.snapshot().capacity_reached);

        // No-op, not an error
        assert_eq!(coordinator.add_tickets(2), 0);
        assert_eq!(coordinator.snapshot().issued, 12);
        assert_eq!(coordinator.metrics().noop_adds, 1);
        coordinator.stop();
    }

    #[test]
    fn test_zero_capacity_stops_on_first_add() {
        let (coordinator, store, log) = memory_coordinator(10, 10, 0);
        coordinator.start(0, 0).unwrap();

        assert_eq!(coordinator.add_tickets(1), 0);

        let snapshot = coordinator.snapshot();
        assert!(snapshot.capacity_reached);
        assert!(snapshot.stop_requested);
        assert!(!snapshot.running);
        assert!(store.is_empty());
        assert_eq!(log.flush_count(), 1);
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_no_customers_never_auto_stops() {
        let (coordinator, _, log) = memory_coordinator(10, 10, 5);
        coordinator.start(0, 0).unwrap();

        assert_eq!(coordinator.add_tickets(1), 5);
        assert!(coordinator.snapshot().capacity_reached);
        assert_eq!(coordinator.add_tickets(1), 0);
        assert!(coordinator.is_running());
        assert_eq!(coordinator.remaining_tickets(), 5);
        assert_eq!(log.flush_count(), 0);

        assert!(coordinator.stop());
        assert_eq!(log.read_all().unwrap().len(), 5);
        assert_eq!(coordinator.remaining_tickets(), 5);
    }

    #[test]
    fn test_stop_is_single_shot() {
        let (coordinator, _, log) = memory_coordinator(10, 10, 10);
        coordinator.start(0, 0).unwrap();

        assert!(coordinator.stop());
        assert!(!coordinator.stop());
        assert_eq!(log.flush_count(), 1);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (coordinator, _, log) = memory_coordinator(10, 10, 10);
        assert!(!coordinator.stop());
        assert_eq!(log.flush_count(), 0);
        assert!(coordinator.wait_for_shutdown(Duration::from_millis(1)));
    }

    #[test]
    fn test_concurrent_stops_run_once() {
        let (coordinator, _, log) = memory_coordinator(10, 10, 10);
        coordinator.start(0, 0).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || coordinator.stop())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();

        assert_eq!(winners, 1);
        assert!(coordinator.wait_for_shutdown(Duration::from_secs(5)));
        assert_eq!(log.flush_count(), 1);
    }

    #[test]
    fn test_external_stop_racing_automatic_stop() {
        for _ in 0..20 {
            let (coordinator, _, log) = memory_coordinator(10, 10, 4);
            coordinator.start(0, 0).unwrap();
            coordinator.add_tickets(1);

            let customer = {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || coordinator.retrieve_tickets(1))
            };
            let external = {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || coordinator.stop())
            };
            customer.join().unwrap();
            external.join().unwrap();

            assert!(coordinator.wait_for_shutdown(Duration::from_secs(5)));
            assert_eq!(log.flush_count(), 1);
            assert!(coordinator.snapshot().stop_requested);
        }
    }

    #[test]
    fn test_concurrent_vendors_never_exceed_capacity() {
        let (coordinator, store, _) = memory_coordinator(10, 10, 8);
        coordinator.start(0, 0).unwrap();

        let handles: Vec<_> = (1..=2)
            .map(|id| {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || coordinator.add_tickets(id))
            })
            .collect();
        let mut added: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        added.sort_unstable();

        assert_eq!(added, vec![3, 5]);
        assert_eq!(coordinator.snapshot().issued, 8);
        assert_eq!(store.len(), 8);

        // A third racer gets nothing
        assert_eq!(coordinator.add_tickets(3), 0);
        coordinator.stop();
    }

    #[test]
    fn test_customer_blocks_until_vendor_adds() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 20);
        coordinator.start(0, 0).unwrap();

        let customer = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.retrieve_tickets(1))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!customer.is_finished());

        coordinator.add_tickets(1);
        assert_eq!(customer.join().unwrap(), 4);
        assert_eq!(coordinator.remaining_tickets(), 1);
        coordinator.stop();
    }

    #[test]
    fn test_blocked_customer_released_by_stop() {
        let (coordinator, _, log) = memory_coordinator(10, 10, 20);
        coordinator.start(0, 0).unwrap();

        let customer = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.retrieve_tickets(1))
        };
        thread::sleep(Duration::from_millis(20));

        assert!(coordinator.stop());
        assert_eq!(customer.join().unwrap(), 0);
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_vendor_waits_for_start() {
        let (coordinator, _, _) = memory_coordinator(10, 10, 20);

        let vendor = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.add_tickets(1))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!vendor.is_finished());

        coordinator.start(0, 0).unwrap();
        assert_eq!(vendor.join().unwrap(), 5);
        coordinator.stop();
    }

    #[test]
    fn test_persistence_failure_keeps_counters() {
        // Every second insert fails
        let store = Arc::new(FlakyStore::failing_every(2));
        let log = Arc::new(MemoryLog::new());
        let coordinator = Arc::new(PoolCoordinator::new(store.clone(), log.clone()));
        coordinator.configure(10, 10, 10).unwrap();
        coordinator.start(0, 0).unwrap();

        assert_eq!(coordinator.add_tickets(1), 5);
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.issued, 5);
        assert_eq!(snapshot.remaining, 5);
        assert_eq!(snapshot.pending_events, 3);
        assert_eq!(coordinator.metrics().persistence_failures, 2);
        assert_eq!(store.inner().len(), 3);

        // Only 3 records exist, so the 4th and 5th units find nothing to assign
        assert_eq!(coordinator.retrieve_tickets(1), 4);
        assert_eq!(coordinator.retrieve_tickets(1), 1);
        assert_eq!(coordinator.remaining_tickets(), 0);
        assert_eq!(coordinator.metrics().persistence_failures, 4);
        assert!(coordinator.is_running());
        coordinator.stop();

        let events = log.read_all().unwrap();
        assert_eq!(sum(&events, ActionKind::Add), 3);
        assert_eq!(sum(&events, ActionKind::Retrieve), 3);
    }

    #[test]
    fn test_threaded_run_reaches_automatic_stop() {
        let (coordinator, store, log) = memory_coordinator(2, 2, 23);
        coordinator.start(2, 3).unwrap();
        assert_eq!(coordinator.live_workers(), 5);

        assert!(coordinator.wait_for_shutdown(Duration::from_secs(30)));

        let snapshot = coordinator.snapshot();
        assert!(!snapshot.running);
        assert!(snapshot.capacity_reached);
        assert_eq!(snapshot.issued, 23);
        assert_eq!(snapshot.remaining, 0);
        assert_eq!(coordinator.live_workers(), 0);

        let events = log.read_all().unwrap();
        assert_eq!(sum(&events, ActionKind::Add), 23);
        assert_eq!(sum(&events, ActionKind::Retrieve), 23);
        assert_eq!(events.last().unwrap().remaining_after, 0);
        assert!(store.records().unwrap().iter().all(|r| r.customer_id.is_some()));

        // Running total recomputed from the log never goes negative or above capacity
        let mut pool: i64 = 0;
        for event in &events {
            match event.action {
                ActionKind::Add => pool += 1,
                ActionKind::Retrieve => pool -= 1,
            }
            assert_eq!(pool as u64, event.remaining_after);
            assert!((0..=23).contains(&pool));
        }
    }

    #[test]
    fn test_external_stop_with_sleeping_vendor_and_blocked_customer() {
        let (coordinator, _, log) = memory_coordinator(60_000, 1, 10);
        coordinator.start(1, 1).unwrap();

        // Vendor is asleep for a minute, customer is blocked on an empty pool
        thread::sleep(Duration::from_millis(50));
        assert_eq!(coordinator.metrics().add_calls, 0);

        let started = Instant::now();
        assert!(coordinator.stop());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(coordinator.live_workers(), 0);
        assert!(log.read_all().unwrap().is_empty());
        assert_eq!(coordinator.snapshot().pending_events, 0);
    }

    #[test]
    fn test_restart_resets_state() {
        let (coordinator, _, log) = memory_coordinator(10, 10, 5);
        let first = coordinator.start(0, 0).unwrap();
        coordinator.add_tickets(1);
        coordinator.stop();
        assert_eq!(log.read_all().unwrap().len(), 5);

        let second = coordinator.start(0, 0).unwrap();
        assert_ne!(first, second);
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.issued, 0);
        assert_eq!(snapshot.remaining, 0);
        assert!(!snapshot.capacity_reached);
        assert!(!snapshot.stop_requested);
        assert!(snapshot.running);
        assert_eq!(coordinator.metrics().tickets_added, 0);
        coordinator.stop();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u32),
        Retrieve(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..4).prop_map(Op::Add),
            (1u32..4).prop_map(Op::Retrieve),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_pool_invariants_hold(capacity in 0i64..40, ops in prop::collection::vec(op_strategy(), 0..60)) {
            let (coordinator, _, log) = memory_coordinator(1, 1, capacity);
            coordinator.start(0, 0).unwrap();

            for op in ops {
                let before = coordinator.snapshot();
                if !before.running {
                    break;
                }
                match op {
                    Op::Add(id) => {
                        let added = coordinator.add_tickets(id);
                        prop_assert!(added <= VENDOR_BATCH_SIZE);
                    }
                    // Skip calls that would block on an empty pool
                    Op::Retrieve(_) if before.remaining == 0 => continue,
                    Op::Retrieve(id) => {
                        let taken = coordinator.retrieve_tickets(id);
                        prop_assert_eq!(taken, CUSTOMER_BATCH_SIZE.min(before.remaining));
                    }
                }

                let after = coordinator.snapshot();
                prop_assert!(after.issued <= after.max_capacity);
                prop_assert!(after.remaining <= after.issued);
                prop_assert!(after.issued >= before.issued);
                if after.capacity_reached {
                    prop_assert_eq!(after.issued, after.max_capacity);
                }
                if after.stop_requested {
                    prop_assert!(!after.running);
                    prop_assert!(after.capacity_reached && after.remaining == 0);
                }
            }

            coordinator.stop();
            prop_assert_eq!(log.flush_count(), 1);
        }
    }
}
