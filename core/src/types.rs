//! Domain types for the ticket market.
//!
//! Tickets are manufactured by vendors, held by the pool while AVAILABLE and
//! handed to customers exactly once, at which point they become SOLD.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a customer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(Uuid);

impl CustomerId {
    /// Creates a new random `CustomerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CustomerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// Ticket lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Held by the pool, waiting for a buyer
    Available,
    /// Allocated to a customer
    Sold,
}

impl TicketStatus {
    /// Convert status to its stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Sold => "SOLD",
        }
    }

    /// Parse status from its stored string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(Self::Available),
            "SOLD" => Some(Self::Sold),
            _ => None,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ticket.
///
/// `sold_at` and `sold_to` are set if and only if the status is
/// [`TicketStatus::Sold`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,
    /// Human-readable label (`{vendor}-TKT-{suffix}`)
    pub name: String,
    /// Vendor that released the ticket
    pub vendor: String,
    /// Current status
    pub status: TicketStatus,
    /// When the vendor released the ticket
    pub created_at: DateTime<Utc>,
    /// When the ticket was sold
    pub sold_at: Option<DateTime<Utc>>,
    /// Name of the buying customer
    pub sold_to: Option<String>,
}

impl Ticket {
    /// Manufacture a fresh AVAILABLE ticket for `vendor`.
    ///
    /// The name carries the vendor name plus eight hex characters of a random
    /// UUID. It is a display label only; identity is the ticket id.
    #[must_use]
    pub fn release(vendor: &str, created_at: DateTime<Utc>) -> Self {
        let id = TicketId::new();
        let simple = id.as_uuid().simple().to_string();
        let suffix = &simple[..8];

        Self {
            id,
            name: format!("{vendor}-TKT-{suffix}"),
            vendor: vendor.to_string(),
            status: TicketStatus::Available,
            created_at,
            sold_at: None,
            sold_to: None,
        }
    }

    /// Returns this ticket transitioned to SOLD.
    ///
    /// Callers only ever sell tickets taken from the pool's available set, so
    /// the AVAILABLE→SOLD transition happens exactly once per ticket.
    #[must_use]
    pub fn sold(mut self, buyer: &str, at: DateTime<Utc>) -> Self {
        self.status = TicketStatus::Sold;
        self.sold_at = Some(at);
        self.sold_to = Some(buyer.to_string());
        self
    }

    /// Whether the ticket is still available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == TicketStatus::Available
    }
}

// ============================================================================
// Actors
// ============================================================================

/// A registered customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier
    pub id: CustomerId,
    /// Name, unique within a run
    pub name: String,
    /// VIP customers are always served before non-VIP customers
    pub vip: bool,
    /// Fixed quota; when present it replaces the retrieval rate
    pub quota: Option<u32>,
    /// Requests per second
    pub retrieval_rate: u32,
}

impl Customer {
    /// Creates a new customer with a fresh identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, vip: bool, quota: Option<u32>, retrieval_rate: u32) -> Self {
        Self {
            id: CustomerId::new(),
            name: name.into(),
            vip,
            quota,
            retrieval_rate,
        }
    }

    /// Requests per second actually used by the customer loop.
    #[must_use]
    pub fn effective_rate(&self) -> u32 {
        self.quota.unwrap_or(self.retrieval_rate)
    }

    /// Time between two consecutive requests.
    #[must_use]
    pub fn request_period(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.effective_rate().max(1)))
    }

    /// Display label, e.g. `alice(VIP)`.
    #[must_use]
    pub fn label(&self) -> String {
        if self.vip {
            format!("{}(VIP)", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A registered vendor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    /// Name, unique within a run
    pub name: String,
    /// Tickets manufactured per tick
    pub release_rate: u32,
}

impl Vendor {
    /// Creates a new vendor.
    #[must_use]
    pub fn new(name: impl Into<String>, release_rate: u32) -> Self {
        Self {
            name: name.into(),
            release_rate,
        }
    }
}

/// Kind of actor held in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Ticket producer
    Vendor,
    /// Ticket consumer
    Customer,
}

impl ActorKind {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
