//! Persistence sink abstraction.
//!
//! The pool awaits the sink at every ticket transition and the orchestrator
//! awaits it when a customer registers. Writes are never retried; a failure
//! propagates to the caller as an unexpected error.

use crate::types::{Customer, Ticket};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by sink operations, keeping the trait dyn-compatible.
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// Errors raised by a persistence sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Backend could not be reached
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected or failed the write
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Backend failed a read or report query
    #[error("Read failed: {0}")]
    ReadFailed(String),
}

/// Durable record of ticket and customer state.
///
/// Saves are upserts keyed by identifier: saving an AVAILABLE ticket and
/// later the same ticket as SOLD leaves one SOLD record.
pub trait PersistenceSink: Send + Sync {
    /// Upsert a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the write does not complete.
    fn save_ticket<'a>(&'a self, ticket: &'a Ticket) -> SinkFuture<'a>;

    /// Upsert a customer.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the write does not complete.
    fn save_customer<'a>(&'a self, customer: &'a Customer) -> SinkFuture<'a>;
}
