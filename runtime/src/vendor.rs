//! Vendor actor: releases batches of tickets into the pool.

use crate::pool::{PoolError, TicketPool};
use crate::registry::{ActorHandle, ActorReport};
use crate::timing::{ActorTiming, sleep_or_cancel};
use std::sync::Arc;
use ticket_market_core::{Ticket, Vendor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// What a vendor did before it finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VendorReport {
    /// Tickets manufactured
    pub released: u32,
    /// Tickets the pool admitted
    pub admitted: u32,
}

/// Producer loop bound to one pool.
#[derive(Debug)]
pub struct VendorActor {
    vendor: Vendor,
    pool: Arc<TicketPool>,
    timing: ActorTiming,
}

impl VendorActor {
    /// Create a vendor actor.
    #[must_use]
    pub const fn new(vendor: Vendor, pool: Arc<TicketPool>, timing: ActorTiming) -> Self {
        Self {
            vendor,
            pool,
            timing,
        }
    }

    /// Run the loop on its own task, cancelled through the returned handle.
    #[must_use]
    pub fn spawn(self) -> ActorHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(token).await.map(ActorReport::Vendor) });
        ActorHandle::new(cancel, join)
    }

    /// Release tickets every tick until supply runs out, the pool stops or
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] if the pool fails to persist an offered batch.
    /// The loop ends at the first failure.
    pub async fn run(self, cancel: CancellationToken) -> Result<VendorReport, PoolError> {
        let name = self.vendor.name.as_str();
        let mut report = VendorReport::default();
        let mut waiting_for_capacity = false;

        info!(vendor = %name, rate = self.vendor.release_rate, "Vendor started");

        loop {
            if cancel.is_cancelled() || self.pool.is_stopped() {
                break;
            }

            let remaining = self.pool.remaining_supply();
            if remaining == 0 {
                self.pool
                    .announce(&format!("{name} stopping: No more tickets available"));
                break;
            }

            if self.pool.is_paused() {
                if !sleep_or_cancel(&cancel, self.timing.pause_poll).await {
                    break;
                }
                continue;
            }

            if self.pool.is_at_capacity() {
                if !waiting_for_capacity {
                    self.pool
                        .announce(&format!("{name} waiting: Pool is at maximum capacity"));
                    waiting_for_capacity = true;
                }
                if !sleep_or_cancel(&cancel, self.timing.capacity_backoff).await {
                    break;
                }
                continue;
            }
            waiting_for_capacity = false;

            let size = self.vendor.release_rate.min(remaining);
            let now = self.pool.env().clock.now();
            let batch: Vec<Ticket> = (0..size).map(|_| Ticket::release(name, now)).collect();
            self.pool
                .announce(&format!("{name} released {} tickets", batch.len()));
            report.released += size;

            match self.pool.offer(batch).await {
                Ok(admitted) => {
                    report.admitted += admitted;
                    debug!(vendor = %name, released = size, admitted, "Batch offered");
                },
                Err(e) => {
                    error!(vendor = %name, error = %e, "Vendor halted by pool failure");
                    return Err(e);
                },
            }

            if !sleep_or_cancel(&cancel, self.timing.tick).await {
                break;
            }
        }

        self.pool
            .announce(&format!("{name} stopped releasing tickets."));
        info!(
            vendor = %name,
            released = report.released,
            admitted = report.admitted,
            "Vendor finished"
        );
        Ok(report)
    }
}
