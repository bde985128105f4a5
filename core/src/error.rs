//! Error taxonomy surfaced by the orchestrator.
//!
//! Errors fall into three kinds. Invalid-state and invalid-argument errors are
//! user-correctable and raised before anything is mutated. Unexpected errors
//! wrap infrastructure faults (persistence, panicked actors) and are always
//! surfaced.
//!
//! Supply exhaustion, a full pool and an empty queue are ordinary outcomes
//! and never appear here.

use crate::environment::Clock;
use crate::sink::SinkError;
use crate::types::ActorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a [`MarketError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The operation is not allowed in the current lifecycle state
    InvalidState,
    /// A supplied value would make the pool arithmetic ill-defined
    InvalidArgument,
    /// Infrastructure fault
    Unexpected,
}

impl ErrorKind {
    /// Snake-case code used in failure reports.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidState => "invalid_state",
            Self::InvalidArgument => "invalid_argument",
            Self::Unexpected => "unexpected",
        }
    }
}

/// Errors returned by orchestrator operations.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Lifecycle operation called from the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An actor with this kind and name is already registered
    #[error("Duplicate {kind}: {name} already exists")]
    DuplicateActor {
        /// Registry namespace
        kind: ActorKind,
        /// Offending name
        name: String,
    },

    /// Actor registration attempted while the system is stopped
    #[error("System is not running")]
    NotRunning,

    /// A rate or capacity is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The persistence sink rejected a write
    #[error("Persistence error: {0}")]
    Persistence(#[from] SinkError),

    /// An actor task panicked or was aborted
    #[error("Actor {name} failed: {reason}")]
    ActorFailed {
        /// Actor name
        name: String,
        /// Join error description
        reason: String,
    },
}

impl MarketError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState(_) | Self::DuplicateActor { .. } | Self::NotRunning => {
                ErrorKind::InvalidState
            },
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Persistence(_) | Self::ActorFailed { .. } => {
                ErrorKind::Unexpected
            },
        }
    }

    /// Whether the caller can fix this by changing its request.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Unexpected)
    }

    /// Build a timestamped failure report.
    #[must_use]
    pub fn to_failure(&self, clock: &dyn Clock) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
            timestamp: clock.now(),
        }
    }
}

/// Serializable failure report handed to control layers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// When the failure was reported
    pub timestamp: DateTime<Utc>,
}
