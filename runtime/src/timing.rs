//! Actor scheduling intervals.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep intervals used by vendor and customer loops and by `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorTiming {
    /// Vendor release period
    pub tick: Duration,
    /// Idle interval while the pool is paused
    pub pause_poll: Duration,
    /// Vendor idle interval while the pool is at capacity
    pub capacity_backoff: Duration,
    /// How long `stop` waits for each actor
    pub shutdown_grace: Duration,
}

impl Default for ActorTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            pause_poll: Duration::from_millis(100),
            capacity_backoff: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

impl ActorTiming {
    /// Millisecond-scale timings for tests and demos.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            tick: Duration::from_millis(10),
            pause_poll: Duration::from_millis(2),
            capacity_backoff: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(500),
        }
    }

    /// Set vendor tick
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set pause poll interval
    #[must_use]
    pub const fn with_pause_poll(mut self, poll: Duration) -> Self {
        self.pause_poll = poll;
        self
    }

    /// Set capacity backoff
    #[must_use]
    pub const fn with_capacity_backoff(mut self, backoff: Duration) -> Self {
        self.capacity_backoff = backoff;
        self
    }

    /// Set stop grace period
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `false` when cancelled.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_or_cancel_completes() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(&cancel, Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_returns_early_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = std::time::Instant::now();
        assert!(!sleep_or_cancel(&cancel, Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
