//! Live workers of the current run
//!
//! Cancellation is signalled by dropping the sending half of a zero-capacity
//! channel: every worker holds a receiver and sleeps on it between batches,
//! so a disconnect wakes all sleepers at once.

use crate::log_worker;
use crossbeam::channel::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::Level;

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    cancel: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh cancellation channel for a new run
    pub fn open(&mut self) -> Receiver<()> {
        let (tx, rx) = channel::bounded(0);
        self.cancel = Some(tx);
        rx
    }

    pub fn register(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Number of registered (not yet joined) workers
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal cancellation to every worker holding a receiver
    pub fn cancel_all(&mut self) {
        self.cancel.take();
    }

    /// Join every registered worker and clear the registry
    ///
    /// The calling thread is skipped when it is itself a registered worker
    /// (automatic stop runs on a customer thread); its handle is dropped and
    /// the thread exits once it returns from the coordinator.
    /// Returns the number of workers joined.
    pub fn join_all(&mut self) -> usize {
        let current = thread::current().id();
        let mut joined = 0;

        for handle in self.handles.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("worker").to_string();
            match handle.join() {
                Ok(()) => joined += 1,
                Err(_) => {
                    log_worker!(Level::ERROR, "{} panicked before shutdown", name);
                }
            }
        }

        joined
    }
}
