//! Best-effort broadcast of human-readable event lines.

use thiserror::Error;

/// Errors raised by a notifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Event could not be delivered
    #[error("Notification failed: {0}")]
    Delivery(String),
}

/// Publishes event strings to observers.
///
/// Callers log failures at `warn` and carry on; a notifier can never stall or
/// fail a pool operation.
pub trait Notifier: Send + Sync {
    /// Publish one event line.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the event could not be delivered.
    fn publish(&self, event: &str) -> Result<(), NotifyError>;
}
