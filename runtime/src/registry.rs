//! Actor registry
//!
//! Tracks the running vendor and customer tasks of one run, keyed by name per
//! kind. Owned by the orchestrator and only touched under its lock.

use crate::customer::CustomerReport;
use crate::pool::PoolError;
use crate::vendor::VendorReport;
use std::collections::HashMap;
use ticket_market_core::{ActorKind, MarketError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Final report of an actor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorReport {
    /// A vendor finished
    Vendor(VendorReport),
    /// A customer finished
    Customer(CustomerReport),
}

/// Cancellation and join handles for one actor task.
#[derive(Debug)]
pub struct ActorHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<ActorReport, PoolError>>,
}

impl ActorHandle {
    /// Wrap a spawned actor task.
    #[must_use]
    pub const fn new(
        cancel: CancellationToken,
        join: JoinHandle<Result<ActorReport, PoolError>>,
    ) -> Self {
        Self { cancel, join }
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.join.is_finished()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Split into the join handle.
    #[must_use]
    pub fn into_join(self) -> JoinHandle<Result<ActorReport, PoolError>> {
        self.join
    }
}

/// Registered actor, as returned by [`ActorRegistry::drain`].
#[derive(Debug)]
pub struct RegisteredActor {
    /// Registry namespace
    pub kind: ActorKind,
    /// Actor name
    pub name: String,
    /// Task handles
    pub handle: ActorHandle,
}

/// Vendors and customers of one run.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    vendors: HashMap<String, ActorHandle>,
    customers: HashMap<String, ActorHandle>,
}

impl ActorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn table(&self, kind: ActorKind) -> &HashMap<String, ActorHandle> {
        match kind {
            ActorKind::Vendor => &self.vendors,
            ActorKind::Customer => &self.customers,
        }
    }

    const fn table_mut(&mut self, kind: ActorKind) -> &mut HashMap<String, ActorHandle> {
        match kind {
            ActorKind::Vendor => &mut self.vendors,
            ActorKind::Customer => &mut self.customers,
        }
    }

    /// Whether an actor with this kind and name is registered.
    #[must_use]
    pub fn contains(&self, kind: ActorKind, name: &str) -> bool {
        self.table(kind).contains_key(name)
    }

    /// Fail if the name is taken for this kind.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::DuplicateActor`] if the name is registered.
    pub fn ensure_vacant(&self, kind: ActorKind, name: &str) -> Result<(), MarketError> {
        if self.contains(kind, name) {
            return Err(MarketError::DuplicateActor {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Register a spawned actor.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::DuplicateActor`] if the name is registered; the
    /// handle is cancelled in that case.
    pub fn insert(
        &mut self,
        kind: ActorKind,
        name: &str,
        handle: ActorHandle,
    ) -> Result<(), MarketError> {
        if let Err(e) = self.ensure_vacant(kind, name) {
            handle.cancel();
            return Err(e);
        }
        self.table_mut(kind).insert(name.to_string(), handle);
        Ok(())
    }

    /// Number of registered actors of this kind whose task is still running.
    #[must_use]
    pub fn active_count(&self, kind: ActorKind) -> u32 {
        let active = self.table(kind).values().filter(|h| h.is_active()).count();
        u32::try_from(active).unwrap_or(u32::MAX)
    }

    /// Number of registered actors, finished or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vendors.len() + self.customers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every actor.
    pub fn cancel_all(&self) {
        for handle in self.vendors.values().chain(self.customers.values()) {
            handle.cancel();
        }
    }

    /// Remove every actor, vendors first.
    pub fn drain(&mut self) -> Vec<RegisteredActor> {
        let vendors = self.vendors.drain().map(|(name, handle)| RegisteredActor {
            kind: ActorKind::Vendor,
            name,
            handle,
        });
        let customers = self.customers.drain().map(|(name, handle)| RegisteredActor {
            kind: ActorKind::Customer,
            name,
            handle,
        });
        vendors.chain(customers).collect()
    }
}
