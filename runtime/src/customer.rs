//! Customer actor: requests tickets at its effective rate.

use crate::pool::{Allocation, PoolError, TicketPool};
use crate::registry::{ActorHandle, ActorReport};
use crate::timing::{ActorTiming, sleep_or_cancel};
use std::sync::Arc;
use ticket_market_core::Customer;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a customer received before it finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerReport {
    /// Tickets handed back directly by `request`
    pub purchased: u32,
    /// Tickets delivered later by dispatch
    pub delivered: u32,
    /// Feed events dropped because this customer fell behind; `delivered`
    /// may be short by up to this many
    pub missed: u64,
}

impl CustomerReport {
    /// All tickets this customer ended up with.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.purchased + self.delivered
    }
}

/// Consumer loop bound to one pool.
#[derive(Debug)]
pub struct CustomerActor {
    customer: Customer,
    pool: Arc<TicketPool>,
    timing: ActorTiming,
}

impl CustomerActor {
    /// Create a customer actor.
    #[must_use]
    pub const fn new(customer: Customer, pool: Arc<TicketPool>, timing: ActorTiming) -> Self {
        Self {
            customer,
            pool,
            timing,
        }
    }

    /// Run the loop on its own task, cancelled through the returned handle.
    #[must_use]
    pub fn spawn(self) -> ActorHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(token).await.map(ActorReport::Customer) });
        ActorHandle::new(cancel, join)
    }

    /// Request a ticket every period until the pool stops or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] if the pool fails to persist a sale. The loop
    /// ends at the first failure.
    pub async fn run(self, cancel: CancellationToken) -> Result<CustomerReport, PoolError> {
        let label = self.customer.label();
        let period = self.customer.request_period();
        let mut feed = self.pool.subscribe_allocations();
        let mut report = CustomerReport::default();

        info!(
            customer = %self.customer.name,
            vip = self.customer.vip,
            rate = self.customer.effective_rate(),
            "Customer started"
        );

        loop {
            self.drain_deliveries(&mut feed, &mut report);

            if cancel.is_cancelled() {
                break;
            }

            if self.pool.is_stopped() {
                self.pool.announce(&format!(
                    "{} stopped: System has been shut down.",
                    self.customer.name
                ));
                break;
            }

            if self.pool.is_paused() {
                if !sleep_or_cancel(&cancel, self.timing.pause_poll).await {
                    break;
                }
                continue;
            }

            match self.pool.request(&self.customer).await {
                Ok(Some(ticket)) => {
                    report.purchased += 1;
                    self.pool.announce(&format!(
                        "{label} purchased ticket: {} (Tickets in pool: {}, Total remaining: {})",
                        ticket.name,
                        self.pool.available_count(),
                        self.pool.remaining_supply()
                    ));
                },
                Ok(None) => {
                    debug!(customer = %self.customer.name, "No ticket handed back");
                },
                Err(e) => {
                    error!(customer = %self.customer.name, error = %e, "Customer halted by pool failure");
                    return Err(e);
                },
            }

            if !sleep_or_cancel(&cancel, period).await {
                break;
            }
        }

        self.drain_deliveries(&mut feed, &mut report);
        self.pool.announce(&format!(
            "{} stopped purchasing tickets.",
            self.customer.name
        ));
        info!(
            customer = %self.customer.name,
            purchased = report.purchased,
            delivered = report.delivered,
            missed = report.missed,
            "Customer finished"
        );
        Ok(report)
    }

    /// Count tickets dispatch delivered to this customer since the last call.
    fn drain_deliveries(
        &self,
        feed: &mut broadcast::Receiver<Allocation>,
        report: &mut CustomerReport,
    ) {
        loop {
            match feed.try_recv() {
                Ok(allocation) => {
                    if allocation.deferred && allocation.customer == self.customer.name {
                        report.delivered += 1;
                    }
                },
                Err(TryRecvError::Lagged(skipped)) => {
                    report.missed += skipped;
                    warn!(customer = %self.customer.name, skipped, "Allocation feed lagged");
                },
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
