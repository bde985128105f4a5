//! Recording and failing collaborators.
//!
//! - [`RecordingSink`]: keeps every saved ticket and customer in memory
//! - [`FailingSink`]: rejects every write
//! - [`RecordingNotifier`]: captures published lines
//! - [`FailingNotifier`]: rejects every line

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use ticket_market_core::{
    Customer, CustomerId, Notifier, NotifyError, PersistenceSink, SinkError, SinkFuture, Ticket,
    TicketId, TicketStatus,
};

/// In-memory sink that records the latest version of every entity.
///
/// Optionally starts failing ticket writes after a set number of successes,
/// which lets tests exercise persistence failures halfway through a batch.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
    ticket_writes: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    /// Sink that accepts every write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose ticket writes fail once `writes` have succeeded.
    #[must_use]
    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
            ..Self::default()
        }
    }

    /// Number of distinct tickets stored.
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.tickets.read().unwrap().len()
    }

    /// Number of stored tickets with the given status.
    #[must_use]
    pub fn count_with_status(&self, status: TicketStatus) -> usize {
        self.tickets
            .read()
            .unwrap()
            .values()
            .filter(|t| t.status == status)
            .count()
    }

    /// Latest stored version of a ticket.
    #[must_use]
    pub fn ticket(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.read().unwrap().get(id).cloned()
    }

    /// All stored tickets, in no particular order.
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.read().unwrap().values().cloned().collect()
    }

    /// Names of stored customers.
    #[must_use]
    pub fn customer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .customers
            .read()
            .unwrap()
            .values()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl PersistenceSink for RecordingSink {
    fn save_ticket<'a>(&'a self, ticket: &'a Ticket) -> SinkFuture<'a> {
        Box::pin(async move {
            let written = self.ticket_writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| written >= limit) {
                return Err(SinkError::WriteFailed(format!(
                    "injected failure saving {}",
                    ticket.name
                )));
            }
            self.tickets
                .write()
                .unwrap()
                .insert(ticket.id, ticket.clone());
            Ok(())
        })
    }

    fn save_customer<'a>(&'a self, customer: &'a Customer) -> SinkFuture<'a> {
        Box::pin(async move {
            self.customers
                .write()
                .unwrap()
                .insert(customer.id, customer.clone());
            Ok(())
        })
    }
}

/// Sink that rejects every write.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingSink;

impl PersistenceSink for FailingSink {
    fn save_ticket<'a>(&'a self, _ticket: &'a Ticket) -> SinkFuture<'a> {
        Box::pin(async { Err(SinkError::Unavailable("sink offline".to_string())) })
    }

    fn save_customer<'a>(&'a self, _customer: &'a Customer) -> SinkFuture<'a> {
        Box::pin(async { Err(SinkError::Unavailable("sink offline".to_string())) })
    }
}

/// Notifier that captures every line.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    lines: Arc<RwLock<Vec<String>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line published so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().unwrap().clone()
    }

    /// Whether any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.read().unwrap().iter().any(|l| l.contains(needle))
    }

    /// Number of lines containing `needle`.
    #[must_use]
    pub fn count(&self, needle: &str) -> usize {
        self.lines
            .read()
            .unwrap()
            .iter()
            .filter(|l| l.contains(needle))
            .count()
    }

    /// Drop recorded lines.
    pub fn clear(&self) {
        self.lines.write().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, event: &str) -> Result<(), NotifyError> {
        self.lines.write().unwrap().push(event.to_string());
        Ok(())
    }
}

/// Notifier that rejects every line.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn publish(&self, _event: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("no subscribers reachable".to_string()))
    }
}
