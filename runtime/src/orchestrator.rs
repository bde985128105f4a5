//! Lifecycle controller for the market.
//!
//! The [`Orchestrator`] is a small state machine over
//! `Stopped → Running ⇄ Running+Paused → Stopped`. It owns the configuration,
//! the pool of the current run and the actor registry, all behind one async
//! mutex so state checks and mutations never interleave.
//!
//! Invalid-state requests are rejected before anything changes.

use crate::customer::CustomerActor;
use crate::metrics::ActorMetrics;
use crate::notifier::announce;
use crate::pool::TicketPool;
use crate::registry::{ActorRegistry, ActorReport, RegisteredActor};
use crate::timing::ActorTiming;
use crate::vendor::VendorActor;
use serde::Serialize;
use std::sync::Arc;
use ticket_market_core::{
    ActorKind, Customer, MarketConfig, MarketEnvironment, MarketError, Vendor,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Name of the vendor launched by every `start`.
pub const DEFAULT_VENDOR: &str = "Default-Vendor";

/// Point-in-time system status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    /// A run is in progress
    pub running: bool,
    /// The run is paused
    pub paused: bool,
    /// AVAILABLE tickets in the pool
    pub available_tickets: u32,
    /// Tickets that may still be admitted
    pub remaining_tickets: u32,
    /// Vendor tasks still running
    pub active_vendors: u32,
    /// Customer tasks still running
    pub active_customers: u32,
    /// Tickets sold so far
    pub sold_tickets: u32,
    /// Customers waiting for a ticket
    pub waiting_customers: u32,
    /// The pool stopped on its own (supply exhausted)
    pub pool_stopped: bool,
}

/// Outcome of [`Orchestrator::stop`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Actor reports, by name
    pub finished: Vec<(String, ActorReport)>,
    /// Actors that missed the grace period and were aborted
    pub timed_out: Vec<String>,
    /// Actors that failed or panicked
    pub failures: Vec<MarketError>,
}

#[derive(Debug)]
struct Run {
    pool: Arc<TicketPool>,
    registry: ActorRegistry,
    paused: bool,
}

#[derive(Debug)]
struct Inner {
    config: MarketConfig,
    run: Option<Run>,
}

/// Starts, stops, pauses and resumes runs and registers actors.
#[derive(Debug)]
pub struct Orchestrator {
    env: MarketEnvironment,
    timing: ActorTiming,
    inner: Mutex<Inner>,
}

impl Orchestrator {
    /// Create a stopped orchestrator with the default configuration.
    #[must_use]
    pub fn new(env: MarketEnvironment) -> Self {
        Self {
            env,
            timing: ActorTiming::default(),
            inner: Mutex::new(Inner {
                config: MarketConfig::default(),
                run: None,
            }),
        }
    }

    /// Use different actor timings.
    #[must_use]
    pub const fn with_timing(mut self, timing: ActorTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Replace the configuration. Only allowed while stopped.
    ///
    /// # Errors
    ///
    /// - [`MarketError::InvalidState`] while a run is in progress
    /// - [`MarketError::InvalidArgument`] if the configuration is invalid
    pub async fn configure(&self, config: MarketConfig) -> Result<MarketConfig, MarketError> {
        let mut inner = self.inner.lock().await;
        if inner.run.is_some() {
            return Err(MarketError::InvalidState(
                "Cannot update configuration while running".to_string(),
            ));
        }
        config.validate()?;
        inner.config = config;
        info!(
            total = config.total_tickets,
            release_rate = config.ticket_release_rate,
            retrieval_rate = config.customer_retrieval_rate,
            capacity = config.max_ticket_capacity,
            "Configuration updated"
        );
        Ok(config)
    }

    /// Current configuration.
    pub async fn config(&self) -> MarketConfig {
        self.inner.lock().await.config
    }

    /// Start a run: fresh pool plus the default vendor.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidState`] if a run is already in progress.
    pub async fn start(&self) -> Result<(), MarketError> {
        let mut inner = self.inner.lock().await;
        if inner.run.is_some() {
            return Err(MarketError::InvalidState(
                "Ticket operations are already running.".to_string(),
            ));
        }
        let config = inner.config;
        config.validate()?;

        let pool = Arc::new(TicketPool::new(&config, self.env.clone()));
        let mut registry = ActorRegistry::new();
        let vendor = Vendor::new(DEFAULT_VENDOR, config.ticket_release_rate);
        self.spawn_vendor(&pool, &mut registry, vendor)?;

        inner.run = Some(Run {
            pool,
            registry,
            paused: false,
        });
        info!(total = config.total_tickets, capacity = config.max_ticket_capacity, "Run started");
        self.announce("Ticket operations started");
        Ok(())
    }

    /// Stop the run: stop the pool, cancel every actor and wait for each for
    /// the grace period. Actors that miss it are aborted.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidState`] if no run is in progress.
    pub async fn stop(&self) -> Result<ShutdownReport, MarketError> {
        let mut inner = self.inner.lock().await;
        let Some(mut run) = inner.run.take() else {
            return Err(MarketError::InvalidState(
                "Ticket operations are not running.".to_string(),
            ));
        };

        run.pool.stop().await;
        run.registry.cancel_all();

        let report = self.await_actors(run.registry.drain()).await;
        info!(
            finished = report.finished.len(),
            timed_out = report.timed_out.len(),
            failures = report.failures.len(),
            sold = run.pool.sold_count(),
            "Run stopped"
        );
        self.announce("Ticket Operation Stopped.");
        Ok(report)
    }

    /// Pause the run.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidState`] if no run is in progress or it is
    /// already paused.
    pub async fn pause(&self) -> Result<(), MarketError> {
        let mut inner = self.inner.lock().await;
        let run = running(&mut inner)?;
        if run.paused {
            return Err(MarketError::InvalidState(
                "Ticket operations are already paused.".to_string(),
            ));
        }
        run.pool.set_paused(true).await;
        run.paused = true;
        self.announce("Pausing ticket operations...");
        Ok(())
    }

    /// Resume a paused run and wake every suspended caller.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidState`] if no run is in progress or it is
    /// not paused.
    pub async fn resume(&self) -> Result<(), MarketError> {
        let mut inner = self.inner.lock().await;
        let run = running(&mut inner)?;
        if !run.paused {
            return Err(MarketError::InvalidState(
                "Ticket operations are not paused.".to_string(),
            ));
        }
        run.pool.set_paused(false).await;
        run.pool.wake_all();
        run.paused = false;
        self.announce("Resuming ticket operations...");
        Ok(())
    }

    /// Register and launch a vendor.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotRunning`] if no run is in progress
    /// - [`MarketError::InvalidArgument`] for an empty name or a zero rate
    /// - [`MarketError::DuplicateActor`] if the vendor name is taken
    pub async fn add_vendor(&self, name: &str, release_rate: u32) -> Result<Vendor, MarketError> {
        let mut inner = self.inner.lock().await;
        let Some(run) = inner.run.as_mut() else {
            return Err(MarketError::NotRunning);
        };
        require_name(name)?;
        require_positive("release rate", release_rate)?;
        run.registry.ensure_vacant(ActorKind::Vendor, name)?;

        let vendor = Vendor::new(name, release_rate);
        self.spawn_vendor(&run.pool, &mut run.registry, vendor.clone())?;
        self.announce(&format!("Vendor {name} added with release rate as {release_rate}"));
        Ok(vendor)
    }

    /// Register, persist and launch a customer.
    ///
    /// A missing `retrieval_rate` falls back to the configured rate. A quota,
    /// when given, replaces the rate for the customer's whole life.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotRunning`] if no run is in progress
    /// - [`MarketError::InvalidArgument`] for an empty name or a zero rate/quota
    /// - [`MarketError::DuplicateActor`] if the customer name is taken
    /// - [`MarketError::Persistence`] if the customer record cannot be saved;
    ///   nothing is launched in that case
    pub async fn add_customer(
        &self,
        name: &str,
        vip: bool,
        quota: Option<u32>,
        retrieval_rate: Option<u32>,
    ) -> Result<Customer, MarketError> {
        let mut inner = self.inner.lock().await;
        let default_rate = inner.config.customer_retrieval_rate;
        let Some(run) = inner.run.as_mut() else {
            return Err(MarketError::NotRunning);
        };
        require_name(name)?;
        let rate = retrieval_rate.unwrap_or(default_rate);
        require_positive("retrieval rate", rate)?;
        if let Some(quota) = quota {
            require_positive("ticket quota", quota)?;
        }
        run.registry.ensure_vacant(ActorKind::Customer, name)?;

        let customer = Customer::new(name, vip, quota, rate);
        if let Err(e) = self.env.sink.save_customer(&customer).await {
            error!(customer = %name, error = %e, "Failed to persist customer");
            return Err(e.into());
        }

        let handle = CustomerActor::new(customer.clone(), run.pool.clone(), self.timing).spawn();
        run.registry.insert(ActorKind::Customer, name, handle)?;
        ActorMetrics::record_spawn(ActorKind::Customer);

        self.announce(&format!(
            "Customer {} added with retrieval rate as {}",
            customer.label(),
            customer.effective_rate()
        ));
        Ok(customer)
    }

    /// Current status. Counts are zero while stopped.
    pub async fn status(&self) -> SystemStatus {
        let inner = self.inner.lock().await;
        let Some(run) = inner.run.as_ref() else {
            return SystemStatus::default();
        };
        SystemStatus {
            running: true,
            paused: run.paused,
            available_tickets: run.pool.available_count(),
            remaining_tickets: run.pool.remaining_supply(),
            active_vendors: run.registry.active_count(ActorKind::Vendor),
            active_customers: run.registry.active_count(ActorKind::Customer),
            sold_tickets: run.pool.sold_count(),
            waiting_customers: run.pool.waiting_count(),
            pool_stopped: run.pool.is_stopped(),
        }
    }

    /// Whether a run is in progress.
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.run.is_some()
    }

    /// Pool of the current run, for observers.
    pub async fn pool(&self) -> Option<Arc<TicketPool>> {
        self.inner.lock().await.run.as_ref().map(|run| run.pool.clone())
    }

    fn spawn_vendor(
        &self,
        pool: &Arc<TicketPool>,
        registry: &mut ActorRegistry,
        vendor: Vendor,
    ) -> Result<(), MarketError> {
        let name = vendor.name.clone();
        let handle = VendorActor::new(vendor, pool.clone(), self.timing).spawn();
        registry.insert(ActorKind::Vendor, &name, handle)?;
        ActorMetrics::record_spawn(ActorKind::Vendor);
        Ok(())
    }

    /// Wait for each actor for the grace period.
    async fn await_actors(&self, actors: Vec<RegisteredActor>) -> ShutdownReport {
        let grace = self.timing.shutdown_grace;
        let mut report = ShutdownReport::default();

        for RegisteredActor { kind, name, handle } in actors {
            let mut join = handle.into_join();
            match tokio::time::timeout(grace, &mut join).await {
                Ok(Ok(Ok(actor_report))) => {
                    info!(%kind, actor = %name, "Actor stopped gracefully");
                    report.finished.push((name, actor_report));
                },
                Ok(Ok(Err(e))) => {
                    error!(%kind, actor = %name, error = %e, "Actor ended with an error");
                    report.failures.push(e.into());
                },
                Ok(Err(e)) => {
                    error!(%kind, actor = %name, error = %e, "Actor task failed");
                    report.failures.push(MarketError::ActorFailed {
                        name,
                        reason: e.to_string(),
                    });
                },
                Err(_) => {
                    warn!(%kind, actor = %name, "Actor shutdown timed out");
                    join.abort();
                    report.timed_out.push(name);
                },
            }
        }
        report
    }

    fn announce(&self, event: &str) {
        announce(self.env.notifier.as_ref(), event);
    }
}

fn running(inner: &mut Inner) -> Result<&mut Run, MarketError> {
    inner.run.as_mut().ok_or_else(|| {
        MarketError::InvalidState("Ticket operations are not running.".to_string())
    })
}

fn require_name(name: &str) -> Result<(), MarketError> {
    if name.trim().is_empty() {
        return Err(MarketError::InvalidArgument(
            "name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_positive(what: &str, value: u32) -> Result<(), MarketError> {
    if value == 0 {
        return Err(MarketError::InvalidArgument(format!(
            "{what} must be greater than zero"
        )));
    }
    Ok(())
}
