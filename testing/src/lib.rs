//! # Ticket Market Testing
//!
//! Testing utilities and helpers for the ticket market.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`SteppingClock`])
//! - Recording and failing implementations of the sink and notifier traits
//! - A [`TestEnvironment`] bundle that keeps handles to its mocks
//! - proptest strategies for configurations
//!
//! ## Example
//!
//! ```ignore
//! use ticket_market_testing::TestEnvironment;
//! use ticket_market_runtime::TicketPool;
//!
//! #[tokio::test]
//! async fn test_offer_persists() {
//!     let test_env = TestEnvironment::new();
//!     let pool = TicketPool::new(MarketConfig::default(), test_env.env.clone());
//!
//!     pool.offer(batch).await.unwrap();
//!     assert_eq!(test_env.sink.ticket_count(), 3);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use ticket_market_core::MarketEnvironment;
use ticket_market_core::environment::Clock;

mod recording;

pub use recording::{FailingNotifier, FailingSink, RecordingNotifier, RecordingSink};

/// Mock clocks.
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_market_testing::mocks::FixedClock;
    /// use ticket_market_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that advances by a fixed step on every read.
    ///
    /// Handy for spreading sales over distinct seconds without sleeping.
    #[derive(Debug, Clone)]
    pub struct SteppingClock {
        next: Arc<Mutex<DateTime<Utc>>>,
        step: Duration,
    }

    impl SteppingClock {
        /// Start at `start`, advancing by `step` after each read.
        #[must_use]
        pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
            Self {
                next: Arc::new(Mutex::new(start)),
                step,
            }
        }

        /// Time the next call to `now` will return.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn peek(&self) -> DateTime<Utc> {
            *self.next.lock().unwrap()
        }
    }

    impl Clock for SteppingClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap();
            let now = *next;
            *next = now + self.step;
            now
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Environment bundle that keeps typed handles to its mocks.
#[derive(Clone, Debug)]
pub struct TestEnvironment {
    /// Environment to hand to the pool or orchestrator
    pub env: MarketEnvironment,
    /// Sink behind `env.sink`
    pub sink: Arc<RecordingSink>,
    /// Notifier behind `env.notifier`
    pub notifier: Arc<RecordingNotifier>,
}

impl TestEnvironment {
    /// Fixed clock, recording sink and recording notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(mocks::test_clock()))
    }

    /// Same as [`TestEnvironment::new`] with a caller-supplied clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let env = MarketEnvironment::new(clock, sink.clone(), notifier.clone());
        Self {
            env,
            sink,
            notifier,
        }
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a `fmt` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use ticket_market_core::MarketConfig;

    /// Valid configurations with small totals and capacities.
    pub fn arb_config() -> impl Strategy<Value = MarketConfig> {
        (0u32..60, 1u32..10, 1u32..10, 1u32..15).prop_map(
            |(total, release, retrieval, capacity)| {
                MarketConfig::new(total, release, retrieval, capacity)
            },
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, SteppingClock, test_clock};
