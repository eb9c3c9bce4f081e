//! Core data model for the ticket pool
//!
//! This module contains the plain types shared by the coordinator and storage:
//! - TicketRecord: durable ownership record of one ticket
//! - TransactionEvent: one audit entry per ticket added or retrieved
//! - ActorId / ActorKind: identity of a vendor or customer worker

pub mod event;
pub mod ticket;

pub use event::{ActionKind, TransactionEvent};
pub use ticket::{ActorId, ActorKind, TicketId, TicketRecord};
