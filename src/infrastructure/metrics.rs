//! Metrics collection for the ticket pool
//!
//! Lock-free counters using atomic operations.
//! Updated by the coordinator inside its critical section, read by status queries.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Pool activity counters
///
/// Thread-safe; snapshots are taken for status reporting.
pub struct PoolMetrics {
    /// Tickets issued by vendors
    tickets_added: AtomicU64,
    /// Tickets handed to customers
    tickets_retrieved: AtomicU64,
    /// add_tickets calls that reached the batch step
    add_calls: AtomicU64,
    /// retrieve_tickets calls that reached the batch step
    retrieve_calls: AtomicU64,
    /// add_tickets calls rejected because capacity was reached
    noop_adds: AtomicU64,
    /// Store insert/assign failures
    persistence_failures: AtomicU64,
    /// Last pool mutation timestamp (Unix millis)
    last_activity: AtomicU64,
    /// Start of the current run, for uptime calculation
    start_time: Mutex<Instant>,
}

/// Metrics snapshot for status export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub tickets_added: u64,
    pub tickets_retrieved: u64,
    pub add_calls: u64,
    pub retrieve_calls: u64,
    pub noop_adds: u64,
    pub persistence_failures: u64,
    pub ticket_rate: f64, // tickets moved per second
    pub uptime_seconds: u64,
    pub idle_ms: Option<u64>,
}

impl PoolMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            tickets_added: AtomicU64::new(0),
            tickets_retrieved: AtomicU64::new(0),
            add_calls: AtomicU64::new(0),
            retrieve_calls: AtomicU64::new(0),
            noop_adds: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            last_activity: AtomicU64::new(0),
            start_time: Mutex::new(Instant::now()),
        }
    }

    /// Record one add batch of `count` tickets
    #[inline]
    pub fn record_add_batch(&self, count: u64) {
        self.add_calls.fetch_add(1, Ordering::Relaxed);
        self.tickets_added.fetch_add(count, Ordering::Relaxed);
        self.update_last_activity();
    }

    /// Record one retrieve batch of `count` tickets
    #[inline]
    pub fn record_retrieve_batch(&self, count: u64) {
        self.retrieve_calls.fetch_add(1, Ordering::Relaxed);
        self.tickets_retrieved.fetch_add(count, Ordering::Relaxed);
        self.update_last_activity();
    }

    /// Record an add call made after capacity was reached
    #[inline]
    pub fn record_noop_add(&self) {
        self.noop_adds.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Update last activity timestamp
    #[inline]
    fn update_last_activity(&self) {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_activity.store(now, Ordering::Relaxed);
    }

    /// Zero every counter and restart the uptime clock (new run)
    pub fn reset(&self) {
        *self.start_time.lock() = Instant::now();
        for counter in [
            &self.tickets_added,
            &self.tickets_retrieved,
            &self.add_calls,
            &self.retrieve_calls,
            &self.noop_adds,
            &self.persistence_failures,
            &self.last_activity,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let added = self.tickets_added.load(Ordering::Relaxed);
        let retrieved = self.tickets_retrieved.load(Ordering::Relaxed);

        let uptime = self.start_time.lock().elapsed().as_secs();
        let rate = if uptime > 0 {
            (added + retrieved) as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            tickets_added: added,
            tickets_retrieved: retrieved,
            add_calls: self.add_calls.load(Ordering::Relaxed),
            retrieve_calls: self.retrieve_calls.load(Ordering::Relaxed),
            noop_adds: self.noop_adds.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            ticket_rate: rate,
            uptime_seconds: uptime,
            idle_ms: self.idle_ms(),
        }
    }

    /// Milliseconds since the last add or retrieve, None if nothing happened yet
    pub fn idle_ms(&self) -> Option<u64> {
        let last = self.last_activity.load(Ordering::Relaxed);
        if last == 0 {
            return None;
        }

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Some(now.saturating_sub(last))
    }
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}
