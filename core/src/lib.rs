//! # Ticket Market Core
//!
//! Core types and traits for the ticket market.
//!
//! The market is a bounded pool of tickets shared by independent producer
//! (vendor) and consumer (customer) actors. This crate holds everything the
//! actors and the pool agree on, with no runtime attached:
//!
//! - **Types**: [`Ticket`], [`Customer`], [`Vendor`] and their identifiers
//! - **Configuration**: [`MarketConfig`], the immutable snapshot a run starts from
//! - **Environment**: injected dependencies ([`Clock`], [`PersistenceSink`], [`Notifier`])
//! - **Errors**: the [`MarketError`] taxonomy surfaced to control layers
//! - **Reporting**: per-second [`SalesBucket`]s shared by every sink
//!
//! ## Environment
//!
//! All external collaborators are abstracted behind traits and bundled into a
//! [`MarketEnvironment`]. Production wires a real clock, a database-backed sink
//! and a broadcast notifier; tests swap in fixed clocks and recording mocks.
//!
//! ```ignore
//! use ticket_market_core::{MarketEnvironment, environment::SystemClock};
//!
//! let env = MarketEnvironment::new(
//!     Arc::new(SystemClock),
//!     Arc::new(ledger),
//!     Arc::new(notifier),
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Market configuration snapshot
pub mod config;

/// Error taxonomy for the control surface
pub mod error;

/// Notifier trait (human-readable event broadcast)
pub mod notifier;

/// Sales-over-time reporting
pub mod report;

/// Persistence sink trait
pub mod sink;

/// Domain entities and identifiers
pub mod types;

pub use config::MarketConfig;
pub use error::{ErrorKind, Failure, MarketError};
pub use notifier::{Notifier, NotifyError};
pub use report::{SalesBucket, sales_per_second};
pub use sink::{PersistenceSink, SinkError, SinkFuture};
pub use types::{ActorKind, Customer, CustomerId, Ticket, TicketId, TicketStatus, Vendor};

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via [`MarketEnvironment`].
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use ticket_market_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

use environment::Clock;
use std::sync::Arc;

/// Injected collaborators shared by the pool, the actors and the orchestrator.
#[derive(Clone)]
pub struct MarketEnvironment {
    /// Clock for ticket and failure timestamps
    pub clock: Arc<dyn Clock>,
    /// Durable record of ticket and customer state transitions
    pub sink: Arc<dyn PersistenceSink>,
    /// Best-effort broadcast of human-readable events
    pub notifier: Arc<dyn Notifier>,
}

impl MarketEnvironment {
    /// Creates a new `MarketEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn PersistenceSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            clock,
            sink,
            notifier,
        }
    }
}

impl std::fmt::Debug for MarketEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketEnvironment").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
