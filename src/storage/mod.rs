//! External collaborators of the pool coordinator
//!
//! - TicketStore: durable set of ticket ownership records
//! - TransactionLogSink: persists the transaction log as one file per flush

pub mod log;
pub mod store;

pub use log::{JsonFileLog, LogSinkError, MemoryLog, TransactionLogSink};
pub use store::{InMemoryTicketStore, JsonFileTicketStore, StoreError, TicketStore};
