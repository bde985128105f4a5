//! Broadcast notifier and event announcement.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use ticket_market_core::{Notifier, NotifyError};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Default number of event lines kept for late subscribers.
pub const DEFAULT_HISTORY: usize = 256;

/// Log an event at `info` and hand it to the notifier.
///
/// Notifier failures are logged and dropped.
pub(crate) fn announce(notifier: &dyn Notifier, event: &str) {
    info!(target: "ticket_market::events", "{event}");
    if let Err(e) = notifier.publish(event) {
        warn!(error = %e, "Notifier rejected event");
    }
}

/// Fans event lines out to any number of subscribers.
///
/// Lines published with no subscribers are not an error; they still land in
/// the bounded history.
#[derive(Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<String>,
    history: Mutex<VecDeque<String>>,
    history_limit: usize,
}

impl BroadcastNotifier {
    /// Create a notifier with the default history size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Create a notifier that keeps the last `limit` lines.
    #[must_use]
    pub fn with_history(limit: usize) -> Self {
        let (sender, _) = broadcast::channel(limit.max(1));
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(limit)),
            history_limit: limit,
        }
    }

    /// Subscribe to lines published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Most recent lines, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, event: &str) -> Result<(), NotifyError> {
        {
            let mut history = self
                .history
                .lock()
                .map_err(|e| NotifyError::Delivery(e.to_string()))?;
            if self.history_limit > 0 {
                if history.len() == self.history_limit {
                    history.pop_front();
                }
                history.push_back(event.to_string());
            }
        }
        // No receivers is fine; the line is still in the history.
        let _ = self.sender.send(event.to_string());
        Ok(())
    }
}
