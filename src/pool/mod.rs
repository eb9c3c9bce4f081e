//! Bounded ticket pool
//!
//! - PoolCoordinator: single-lock monitor over the pool state
//! - Worker: vendor/customer loop pacing calls into the coordinator
//! - WorkerRegistry: cancellation channel and join handles of one run

pub mod coordinator;
pub mod registry;
pub mod worker;

pub use coordinator::{
    PoolCoordinator, PoolSettings, PoolSnapshot, StopReason, CUSTOMER_BATCH_SIZE,
    VENDOR_BATCH_SIZE,
};
pub use registry::WorkerRegistry;
pub use worker::{Worker, WorkerExit};
