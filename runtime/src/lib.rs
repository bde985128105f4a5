//! # Ticket Market Runtime
//!
//! Runtime for the ticket market: the shared pool, the actors that drive it
//! and the orchestrator that controls a run.
//!
//! ## Core Components
//!
//! - **`TicketPool`**: bounded, concurrency-safe allocator with VIP-first dispatch
//! - **Actors**: vendor and customer loops, one tokio task each
//! - **`Orchestrator`**: start/stop/pause/resume plus the actor registry
//! - **Sinks and notifiers**: in-memory ledger and broadcast notifier
//!
//! ## Example
//!
//! ```ignore
//! use ticket_market_runtime::{InMemoryLedger, BroadcastNotifier, Orchestrator};
//!
//! let env = MarketEnvironment::new(
//!     Arc::new(SystemClock),
//!     Arc::new(InMemoryLedger::new()),
//!     Arc::new(BroadcastNotifier::new()),
//! );
//! let orchestrator = Orchestrator::new(env);
//!
//! orchestrator.start().await?;
//! orchestrator.add_customer("alice", true, None, None).await?;
//! // ...
//! orchestrator.stop().await?;
//! ```

/// Customer actor
pub mod customer;

/// In-memory persistence sink
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Broadcast notifier
pub mod notifier;

/// Lifecycle controller
pub mod orchestrator;

/// Shared ticket pool
pub mod pool;

/// Actor registry
pub mod registry;

/// Actor scheduling intervals
pub mod timing;

/// Vendor actor
pub mod vendor;

pub use customer::{CustomerActor, CustomerReport};
pub use ledger::InMemoryLedger;
pub use notifier::BroadcastNotifier;
pub use orchestrator::{DEFAULT_VENDOR, Orchestrator, ShutdownReport, SystemStatus};
pub use pool::{Allocation, PoolError, PoolSignal, PoolSnapshot, TicketPool};
pub use registry::{ActorHandle, ActorRegistry, ActorReport};
pub use timing::ActorTiming;
pub use vendor::{VendorActor, VendorReport};
