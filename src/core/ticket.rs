//! Ticket ownership records and worker identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned ticket identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TicketId(u64);

impl TicketId {
    #[inline(always)]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a pool participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Vendor,
    Customer,
}

impl ActorKind {
    /// Label prefix used in logs and transaction events
    pub const fn name(&self) -> &'static str {
        match self {
            ActorKind::Vendor => "Vendor",
            ActorKind::Customer => "Customer",
        }
    }
}

/// Identity of one vendor or customer (1-based, per kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId {
    pub kind: ActorKind,
    pub id: u32,
}

impl ActorId {
    pub const fn vendor(id: u32) -> Self {
        Self { kind: ActorKind::Vendor, id }
    }

    pub const fn customer(id: u32) -> Self {
        Self { kind: ActorKind::Customer, id }
    }

    /// Human-readable label, e.g. "Vendor-3"
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.name(), self.id)
    }
}

/// Durable ownership record of a single ticket
///
/// `customer_id` is set at most once, when a customer retrieves the ticket,
/// and is never cleared afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    pub id: TicketId,
    pub vendor_id: u32,
    pub customer_id: Option<u32>,
}

impl TicketRecord {
    /// A record is available for retrieval while no customer owns it
    #[inline]
    pub fn is_unassigned(&self) -> bool {
        self.customer_id.is_none()
    }
}
