//! Transaction log entries
//!
//! One event is appended per ticket unit, inside the same critical section as
//! the pool mutation it describes. Serialized field names match the log file
//! format: `actionType`, `entityName`, `ticketCount`, `remainingTickets`.

use crate::core::ActorId;
use serde::{Deserialize, Serialize};

/// Kind of pool mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Add,
    Retrieve,
}

/// One audit record of a single add or retrieve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    #[serde(rename = "actionType")]
    pub action: ActionKind,
    #[serde(rename = "entityName")]
    pub actor: String,
    pub ticket_count: u32,
    #[serde(rename = "remainingTickets")]
    pub remaining_after: u64,
}

impl TransactionEvent {
    pub fn add(actor: ActorId, remaining_after: u64) -> Self {
        Self::single(ActionKind::Add, actor, remaining_after)
    }

    pub fn retrieve(actor: ActorId, remaining_after: u64) -> Self {
        Self::single(ActionKind::Retrieve, actor, remaining_after)
    }

    fn single(action: ActionKind, actor: ActorId, remaining_after: u64) -> Self {
        Self {
            action,
            actor: actor.label(),
            ticket_count: 1,
            remaining_after,
        }
    }
}
