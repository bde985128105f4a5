//! The shared ticket pool.
//!
//! [`TicketPool`] is the single allocator every vendor and customer actor
//! talks to. All admission, sale and dispatch decisions happen inside one
//! fair (FIFO) async mutex. Counts are mirrored into atomics after every
//! mutation so observers never contend with the actors.
//!
//! # Invariants
//!
//! - `available <= max_ticket_capacity`
//! - `available + sold + remaining == total_tickets`
//! - `remaining` only decreases, by exactly the number of tickets admitted
//! - once stopped the pool never allocates again
//! - while paused nothing enters or leaves the pool
//!
//! # Waiting customers
//!
//! Customers that cannot be served are queued in a max-heap ordered by VIP
//! flag and then by arrival sequence. Draining the heap therefore serves every
//! waiting VIP before any non-VIP, and each group in arrival order.

use crate::metrics::{PoolMetrics, RejectReason, SalePath};
use crate::notifier::announce;
use serde::Serialize;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use ticket_market_core::{
    Customer, MarketConfig, MarketEnvironment, MarketError, SinkError, Ticket,
};
use tokio::sync::{Mutex, MutexGuard, broadcast, watch};
use tracing::{debug, error, info};

const ALLOCATION_FEED_CAPACITY: usize = 1024;

/// Errors returned by pool operations.
///
/// Exhaustion and a full pool are ordinary return values; only
/// infrastructure faults end up here.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The persistence sink rejected a ticket write
    #[error("Persistence failed: {0}")]
    Persistence(#[from] SinkError),
}

impl From<PoolError> for MarketError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Persistence(e) => Self::Persistence(e),
        }
    }
}

/// Pause and stop flags broadcast to suspended callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSignal {
    /// No ticket may enter or leave
    pub paused: bool,
    /// Terminal; no further allocations
    pub stopped: bool,
}

/// A completed sale, published on the allocation feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    /// The ticket, already SOLD
    pub ticket: Ticket,
    /// Buyer name
    pub customer: String,
    /// Whether the buyer is a VIP
    pub vip: bool,
    /// `true` when the sale happened through dispatch rather than `request`
    pub deferred: bool,
}

/// Consistent view of the pool taken inside the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    /// AVAILABLE tickets held
    pub available: u32,
    /// Tickets that may still be admitted
    pub remaining: u32,
    /// Tickets sold so far
    pub sold: u32,
    /// Customers waiting for a ticket
    pub waiting: u32,
    /// Maximum AVAILABLE tickets
    pub capacity: u32,
    /// Total supply for the run
    pub total: u32,
    /// Pause flag
    pub paused: bool,
    /// Stop flag
    pub stopped: bool,
}

impl PoolSnapshot {
    /// `available + sold + remaining`; always equals `total`.
    #[must_use]
    pub const fn accounted(&self) -> u32 {
        self.available + self.sold + self.remaining
    }
}

// ============================================================================
// Wait queue
// ============================================================================

#[derive(Debug)]
struct Waiter {
    customer: Customer,
    seq: u64,
}

impl Waiter {
    fn key(&self) -> (bool, Reverse<u64>) {
        (self.customer.vip, Reverse(self.seq))
    }
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

#[derive(Debug, Default)]
struct WaitQueue {
    heap: BinaryHeap<Waiter>,
    names: HashSet<String>,
    next_seq: u64,
}

impl WaitQueue {
    /// Returns `false` if the customer is already waiting.
    fn push(&mut self, customer: &Customer) -> bool {
        if !self.names.insert(customer.name.clone()) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Waiter {
            customer: customer.clone(),
            seq,
        });
        true
    }

    fn pop(&mut self) -> Option<Waiter> {
        let waiter = self.heap.pop()?;
        self.names.remove(&waiter.customer.name);
        Some(waiter)
    }

    /// Put a popped waiter back with its original position.
    fn restore(&mut self, waiter: Waiter) {
        self.names.insert(waiter.customer.name.clone());
        self.heap.push(waiter);
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// ============================================================================
// Pool
// ============================================================================

#[derive(Debug)]
struct PoolState {
    available: VecDeque<Ticket>,
    remaining: u32,
    sold: u32,
    waiting: WaitQueue,
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Concurrency-safe bounded ticket allocator.
///
/// Shared between actors as `Arc<TicketPool>`. One pool serves one run.
pub struct TicketPool {
    capacity: u32,
    total: u32,
    env: MarketEnvironment,
    state: Mutex<PoolState>,
    signal: watch::Sender<PoolSignal>,
    allocations: broadcast::Sender<Allocation>,
    available: AtomicU32,
    remaining: AtomicU32,
    sold: AtomicU32,
    waiting: AtomicU32,
}

impl TicketPool {
    /// Create an empty pool for one run.
    #[must_use]
    pub fn new(config: &MarketConfig, env: MarketEnvironment) -> Self {
        let (signal, _) = watch::channel(PoolSignal::default());
        let (allocations, _) = broadcast::channel(ALLOCATION_FEED_CAPACITY);

        Self {
            capacity: config.max_ticket_capacity,
            total: config.total_tickets,
            env,
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                remaining: config.total_tickets,
                sold: 0,
                waiting: WaitQueue::default(),
            }),
            signal,
            allocations,
            available: AtomicU32::new(0),
            remaining: AtomicU32::new(config.total_tickets),
            sold: AtomicU32::new(0),
            waiting: AtomicU32::new(0),
        }
    }

    /// Admit as much of `batch` as capacity and remaining supply allow.
    ///
    /// Suspends while the pool is paused. Each admitted ticket is persisted
    /// before it becomes visible; tickets beyond the admitted count are
    /// discarded. Waiting customers are served before this returns.
    ///
    /// Returns the number of tickets admitted, `0` when the pool is stopped,
    /// exhausted or full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Persistence`] if a ticket or sale cannot be
    /// persisted. Tickets admitted before the failure stay admitted.
    pub async fn offer(&self, batch: Vec<Ticket>) -> Result<u32, PoolError> {
        let offered = count(batch.len());
        let Some(mut state) = self.enter().await else {
            debug!(offered, "Offer ignored: pool is stopped");
            return Ok(0);
        };

        if state.remaining == 0 {
            PoolMetrics::record_rejected(RejectReason::Exhausted);
            self.announce("No more tickets available to add. Total tickets exhausted.");
            return Ok(0);
        }

        let free = self.capacity.saturating_sub(count(state.available.len()));
        if free == 0 {
            PoolMetrics::record_rejected(RejectReason::AtCapacity);
            self.announce("Cannot add tickets. Pool is at maximum capacity.");
            return Ok(0);
        }

        if offered == 0 {
            return Ok(0);
        }

        let admit = free.min(offered).min(state.remaining);
        let mut admitted = 0;
        let mut failure = None;

        for ticket in batch.into_iter().take(admit as usize) {
            if let Err(e) = self.env.sink.save_ticket(&ticket).await {
                error!(ticket = %ticket.name, error = %e, "Failed to persist admitted ticket");
                failure = Some(e);
                break;
            }
            state.available.push_back(ticket);
            state.remaining -= 1;
            admitted += 1;
        }

        if admitted > 0 {
            PoolMetrics::record_admitted(admitted);
        }

        let dispatched = self.dispatch(&mut state).await;
        self.publish_levels(&state);

        if let Some(e) = failure {
            return Err(e.into());
        }
        let served = dispatched?;

        let message = if admitted < offered {
            format!(
                "Only {admitted} of {offered} tickets added. Total tickets: {}. Remaining total tickets: {}",
                state.available.len(),
                state.remaining
            )
        } else {
            format!(
                "{admitted} tickets added. Total tickets: {}. Remaining total tickets: {}",
                state.available.len(),
                state.remaining
            )
        };
        debug!(offered, admitted, served, "Batch processed");
        self.announce(&message);

        Ok(admitted)
    }

    /// Ask for one ticket on behalf of `customer`.
    ///
    /// Returns the SOLD ticket when the customer is served immediately. When
    /// nothing can be handed back the customer is queued (once) and a later
    /// dispatch delivers its ticket through the allocation feed.
    ///
    /// Returns `None` on a stopped pool. When the pool is empty and supply is
    /// exhausted, the pool stops.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Persistence`] if the sale cannot be persisted;
    /// the ticket then stays available.
    pub async fn request(&self, customer: &Customer) -> Result<Option<Ticket>, PoolError> {
        let Some(mut state) = self.enter().await else {
            return Ok(None);
        };

        if state.available.is_empty() {
            if state.remaining == 0 {
                self.signal.send_modify(|s| s.stopped = true);
                info!(sold = state.sold, "Supply exhausted, pool stopped");
                self.announce("All tickets have been sold. System will stop.");
                return Ok(None);
            }
            self.defer(&mut state, customer);
            return Ok(None);
        }

        if customer.vip || state.waiting.is_empty() {
            let sold = self.sell_front(&mut state, customer, false).await?;
            self.publish_levels(&state);
            return Ok(sold);
        }

        self.defer(&mut state, customer);
        Ok(None)
    }

    /// Pause or resume the pool.
    ///
    /// Takes the pool lock, so no offer or request is mid-flight when this
    /// returns.
    pub async fn set_paused(&self, paused: bool) {
        let _state = self.state.lock().await;
        self.signal.send_modify(|s| s.paused = paused);
        info!(paused, "Ticket pool pause flag changed");
    }

    /// Wake every caller suspended on the pause signal so it re-evaluates.
    pub fn wake_all(&self) {
        self.signal.send_modify(|_| {});
    }

    /// Stop the pool. Idempotent and irreversible.
    pub async fn stop(&self) {
        let _state = self.state.lock().await;
        let already = self.signal.borrow().stopped;
        self.signal.send_modify(|s| s.stopped = true);
        if !already {
            info!("Ticket pool stopped");
        }
    }

    /// Whether the pool has stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.signal.borrow().stopped
    }

    /// Whether the pool is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.signal.borrow().paused
    }

    /// Whether the pool holds `max_ticket_capacity` tickets.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.available_count() >= self.capacity
    }

    /// AVAILABLE tickets held.
    #[must_use]
    pub fn available_count(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// Tickets that may still be admitted.
    #[must_use]
    pub fn remaining_supply(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Tickets sold so far.
    #[must_use]
    pub fn sold_count(&self) -> u32 {
        self.sold.load(Ordering::Acquire)
    }

    /// Customers currently waiting.
    #[must_use]
    pub fn waiting_count(&self) -> u32 {
        self.waiting.load(Ordering::Acquire)
    }

    /// Pool capacity.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total supply for the run.
    #[must_use]
    pub const fn total_tickets(&self) -> u32 {
        self.total
    }

    /// Environment shared with the actors.
    #[must_use]
    pub const fn env(&self) -> &MarketEnvironment {
        &self.env
    }

    /// Take a consistent snapshot. Works while paused and after stop.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        let signal = *self.signal.borrow();
        PoolSnapshot {
            available: count(state.available.len()),
            remaining: state.remaining,
            sold: state.sold,
            waiting: count(state.waiting.len()),
            capacity: self.capacity,
            total: self.total,
            paused: signal.paused,
            stopped: signal.stopped,
        }
    }

    /// Subscribe to every sale made from now on.
    #[must_use]
    pub fn subscribe_allocations(&self) -> broadcast::Receiver<Allocation> {
        self.allocations.subscribe()
    }

    /// Subscribe to pause/stop changes.
    #[must_use]
    pub fn subscribe_signal(&self) -> watch::Receiver<PoolSignal> {
        self.signal.subscribe()
    }

    pub(crate) fn announce(&self, event: &str) {
        announce(self.env.notifier.as_ref(), event);
    }

    /// Lock the state once the pool is neither paused nor stopped.
    ///
    /// Returns `None` once stopped. The flags are re-checked after locking
    /// because a pause may land while the caller waits for the lock.
    async fn enter(&self) -> Option<MutexGuard<'_, PoolState>> {
        let mut rx = self.signal.subscribe();
        loop {
            let signal = *rx.wait_for(|s| !s.paused || s.stopped).await.ok()?;
            if signal.stopped {
                return None;
            }

            let state = self.state.lock().await;
            let current = *self.signal.borrow();
            if current.stopped {
                return None;
            }
            if !current.paused {
                return Some(state);
            }
        }
    }

    fn defer(&self, state: &mut PoolState, customer: &Customer) {
        if state.waiting.push(customer) {
            PoolMetrics::record_deferred();
            debug!(
                customer = %customer.name,
                vip = customer.vip,
                waiting = state.waiting.len(),
                "Customer queued for the next batch"
            );
            self.publish_levels(state);
        } else {
            debug!(customer = %customer.name, "Customer already waiting");
        }
    }

    /// Serve waiting customers while tickets remain, VIPs first.
    async fn dispatch(&self, state: &mut PoolState) -> Result<u32, PoolError> {
        let mut served = 0;
        while !state.available.is_empty() {
            let Some(waiter) = state.waiting.pop() else {
                break;
            };
            match self.sell_front(state, &waiter.customer, true).await {
                Ok(Some(ticket)) => {
                    served += 1;
                    let message = format!(
                        "{} received reserved ticket: {}",
                        waiter.customer.label(),
                        ticket.name
                    );
                    self.announce(&message);
                },
                Ok(None) => {
                    state.waiting.restore(waiter);
                    break;
                },
                Err(e) => {
                    state.waiting.restore(waiter);
                    return Err(e);
                },
            }
        }
        Ok(served)
    }

    /// Sell the oldest available ticket. The ticket leaves the pool only
    /// after the SOLD record is persisted.
    async fn sell_front(
        &self,
        state: &mut PoolState,
        customer: &Customer,
        deferred: bool,
    ) -> Result<Option<Ticket>, PoolError> {
        let Some(front) = state.available.front() else {
            return Ok(None);
        };
        let sold = front.clone().sold(&customer.name, self.env.clock.now());

        if let Err(e) = self.env.sink.save_ticket(&sold).await {
            error!(ticket = %sold.name, customer = %customer.name, error = %e, "Failed to persist sale");
            return Err(e.into());
        }

        state.available.pop_front();
        state.sold += 1;
        PoolMetrics::record_sale(if deferred {
            SalePath::Dispatch
        } else {
            SalePath::Direct
        });
        debug!(customer = %customer.name, ticket = %sold.name, deferred, "Ticket sold");

        // No subscribers is fine.
        let _ = self.allocations.send(Allocation {
            ticket: sold.clone(),
            customer: customer.name.clone(),
            vip: customer.vip,
            deferred,
        });
        Ok(Some(sold))
    }

    fn publish_levels(&self, state: &PoolState) {
        let available = count(state.available.len());
        let waiting = count(state.waiting.len());
        self.available.store(available, Ordering::Release);
        self.remaining.store(state.remaining, Ordering::Release);
        self.sold.store(state.sold, Ordering::Release);
        self.waiting.store(waiting, Ordering::Release);
        PoolMetrics::record_levels(available, state.remaining, waiting);
    }
}

impl std::fmt::Debug for TicketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketPool")
            .field("capacity", &self.capacity)
            .field("total", &self.total)
            .field("available", &self.available_count())
            .field("remaining", &self.remaining_supply())
            .field("signal", &*self.signal.borrow())
            .finish_non_exhaustive()
    }
}
