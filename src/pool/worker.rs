//! Vendor and customer workers
//!
//! Both roles run the same loop: while the pool is running, sleep for the
//! pacing interval, then make one blocking batch call. The sleep is a receive
//! on the run's cancellation channel, so a stop wakes a sleeping worker
//! immediately instead of after the full interval.

use crate::core::{ActorId, ActorKind};
use crate::log_worker;
use crate::pool::PoolCoordinator;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::Level;

/// Why a worker loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Observed `running == false` at the top of the loop
    Stopped,
    /// Cancellation signalled while sleeping
    Cancelled,
}

/// One periodic participant of the pool
#[derive(Debug, Clone, Copy)]
pub struct Worker {
    actor: ActorId,
    interval: Duration,
}

impl Worker {
    pub fn vendor(id: u32, release_interval: Duration) -> Self {
        Self {
            actor: ActorId::vendor(id),
            interval: release_interval,
        }
    }

    pub fn customer(id: u32, retrieval_interval: Duration) -> Self {
        Self {
            actor: ActorId::customer(id),
            interval: retrieval_interval,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Run the loop on a dedicated, named OS thread
    pub fn spawn(
        self,
        coordinator: Arc<PoolCoordinator>,
        cancel: Receiver<()>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(self.actor.label())
            .spawn(move || {
                let exit = self.run(&coordinator, &cancel);
                log_worker!(Level::DEBUG, "{} exited: {:?}", self.actor, exit);
            })
    }

    /// Worker loop. Returns once the run is over or cancelled.
    pub fn run(&self, coordinator: &PoolCoordinator, cancel: &Receiver<()>) -> WorkerExit {
        log_worker!(Level::DEBUG, "{} started, interval {:?}", self.actor, self.interval);

        while coordinator.is_running() {
            match cancel.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return WorkerExit::Cancelled,
            }

            // Returns early without effect if the run stops while we are blocked
            let moved = match self.actor.kind {
                ActorKind::Vendor => coordinator.add_tickets(self.actor.id),
                ActorKind::Customer => coordinator.retrieve_tickets(self.actor.id),
            };
            log_worker!(Level::TRACE, "{} moved {} tickets", self.actor, moved);
        }

        WorkerExit::Stopped
    }
}
