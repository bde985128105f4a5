//! Scripted market run.
//!
//! A scenario starts the orchestrator, registers extra vendors and a crowd of
//! customers, optionally pauses the market part-way through, and stops once
//! the run time elapses, the pool sells out, or a shutdown signal arrives.

use crate::config::ScenarioConfig;
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use ticket_market_core::{MarketConfig, MarketError};
use ticket_market_runtime::{Orchestrator, ShutdownReport, SystemStatus};
use tokio::time::Instant;
use tracing::{info, warn};

/// Interval between status checks while the run is in progress.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A customer the scenario will register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerPlan {
    /// Customer name
    pub name: String,
    /// Priority customer
    pub vip: bool,
    /// Requests per second
    pub retrieval_rate: u32,
}

/// Build the customer crowd.
///
/// Customers are named `Customer-1..=count`; every `vip_every`-th one is a
/// VIP. Rates are drawn uniformly from `1..=2 * base_rate`.
pub fn plan_customers<R: Rng + ?Sized>(
    count: u32,
    vip_every: u32,
    base_rate: u32,
    rng: &mut R,
) -> Vec<CustomerPlan> {
    let max_rate = base_rate.max(1).saturating_mul(2);
    (1..=count)
        .map(|i| CustomerPlan {
            name: format!("Customer-{i}"),
            vip: vip_every > 0 && i % vip_every == 0,
            retrieval_rate: rng.gen_range(1..=max_rate),
        })
        .collect()
}

/// Names of the vendors added on top of the default vendor.
#[must_use]
pub fn vendor_names(count: u32) -> Vec<String> {
    (1..=count).map(|i| format!("Vendor-{i}")).collect()
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Run time elapsed
    Elapsed,
    /// The pool stopped after the last ticket was sold
    SoldOut,
    /// A shutdown signal arrived
    Interrupted,
}

/// Result of a finished run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Why the run ended
    pub ending: Ending,
    /// Status observed just before stopping
    pub final_status: SystemStatus,
    /// What `stop` collected from the actors
    pub shutdown: ShutdownReport,
}

/// A scripted run.
#[derive(Debug, Clone)]
pub struct Scenario {
    config: ScenarioConfig,
    release_rate: u32,
    customers: Vec<CustomerPlan>,
    poll_interval: Duration,
}

impl Scenario {
    /// Plan a run against `market`.
    pub fn new<R: Rng + ?Sized>(config: ScenarioConfig, market: &MarketConfig, rng: &mut R) -> Self {
        let customers = plan_customers(
            config.customers,
            config.vip_every,
            market.customer_retrieval_rate,
            rng,
        );
        Self {
            config,
            release_rate: market.ticket_release_rate,
            customers,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the status poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Customers this run registers.
    #[must_use]
    pub fn customers(&self) -> &[CustomerPlan] {
        &self.customers
    }

    /// Execute the run and stop the orchestrator.
    ///
    /// `shutdown` ends the run early when it completes.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError`] if the orchestrator cannot be started, an actor
    /// fails to register for a reason other than a user error, or a lifecycle
    /// transition fails. The orchestrator is stopped before the error returns.
    pub async fn run<F>(&self, orchestrator: &Orchestrator, shutdown: F) -> Result<RunOutcome, MarketError>
    where
        F: Future<Output = ()>,
    {
        orchestrator.start().await?;
        if let Err(e) = self.populate(orchestrator).await {
            let _ = orchestrator.stop().await;
            return Err(e);
        }

        tokio::pin!(shutdown);
        let started = Instant::now();
        let ending = match self.timeline(orchestrator, started, &mut shutdown).await {
            Ok(ending) => ending,
            Err(e) => {
                let _ = orchestrator.stop().await;
                return Err(e);
            },
        };

        let final_status = orchestrator.status().await;
        info!(
            ending = ?ending,
            sold = final_status.sold_tickets,
            remaining = final_status.remaining_tickets,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scenario finished"
        );
        let shutdown = orchestrator.stop().await?;
        Ok(RunOutcome {
            ending,
            final_status,
            shutdown,
        })
    }

    async fn populate(&self, orchestrator: &Orchestrator) -> Result<(), MarketError> {
        for name in vendor_names(self.config.vendors) {
            register(orchestrator.add_vendor(&name, self.release_rate).await.map(|_| ()), &name)?;
        }
        for plan in &self.customers {
            let added = orchestrator
                .add_customer(&plan.name, plan.vip, None, Some(plan.retrieval_rate))
                .await
                .map(|_| ());
            register(added, &plan.name)?;
        }
        Ok(())
    }

    async fn timeline<F>(
        &self,
        orchestrator: &Orchestrator,
        started: Instant,
        shutdown: &mut Pin<&mut F>,
    ) -> Result<Ending, MarketError>
    where
        F: Future<Output = ()>,
    {
        if let Some((after, length)) = self.config.pause_window() {
            let ending = self.hold(orchestrator, after, shutdown).await;
            if ending != Ending::Elapsed {
                return Ok(ending);
            }
            orchestrator.pause().await?;
            let ending = self.hold(orchestrator, length, shutdown).await;
            if ending == Ending::Interrupted {
                return Ok(ending);
            }
            orchestrator.resume().await?;
        }

        let remaining = self.config.run_duration().saturating_sub(started.elapsed());
        Ok(self.hold(orchestrator, remaining, shutdown).await)
    }

    /// Wait for `duration`, returning early on sell-out or shutdown.
    async fn hold<F>(
        &self,
        orchestrator: &Orchestrator,
        duration: Duration,
        shutdown: &mut Pin<&mut F>,
    ) -> Ending
    where
        F: Future<Output = ()>,
    {
        let deadline = Instant::now() + duration;
        loop {
            if orchestrator.status().await.pool_stopped {
                return Ending::SoldOut;
            }
            let now = Instant::now();
            if now >= deadline {
                return Ending::Elapsed;
            }
            let step = self.poll_interval.min(deadline - now);
            tokio::select! {
                () = shutdown.as_mut() => return Ending::Interrupted,
                () = tokio::time::sleep(step) => {},
            }
        }
    }
}

/// User errors skip the actor; anything else aborts the run.
fn register(result: Result<(), MarketError>, name: &str) -> Result<(), MarketError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_user_error() => {
            warn!(actor = %name, error = %e, "Skipping actor");
            Ok(())
        },
        Err(e) => Err(e),
    }
}
