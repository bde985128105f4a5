//! Scenario tests for the ticket pool
//!
//! Drives the pool directly (no actors) through admission, dispatch,
//! exhaustion, pause and failure cases.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use ticket_market_core::environment::Clock;
use ticket_market_core::{Customer, MarketConfig, MarketEnvironment, Ticket, TicketStatus};
use ticket_market_runtime::{PoolError, TicketPool};
use ticket_market_testing::{
    FailingNotifier, RecordingNotifier, RecordingSink, TestEnvironment, test_clock,
};
use tokio_test::{assert_pending, task};

// ============================================================================
// Test Fixtures
// ============================================================================

fn batch(n: usize) -> Vec<Ticket> {
    let now = test_clock().now();
    (0..n).map(|_| Ticket::release("Default-Vendor", now)).collect()
}

fn vip(name: &str) -> Customer {
    Customer::new(name, true, None, 1)
}

fn regular(name: &str) -> Customer {
    Customer::new(name, false, None, 1)
}

fn pool(total: u32, capacity: u32) -> (Arc<TicketPool>, TestEnvironment) {
    let test_env = TestEnvironment::new();
    let config = MarketConfig::default()
        .with_total_tickets(total)
        .with_capacity(capacity);
    (Arc::new(TicketPool::new(&config, test_env.env.clone())), test_env)
}

async fn assert_accounted(pool: &TicketPool) {
    let snapshot = pool.snapshot().await;
    assert!(snapshot.available <= snapshot.capacity);
    assert_eq!(snapshot.accounted(), snapshot.total);
}

// ============================================================================
// Admission and dispatch
// ============================================================================

#[tokio::test]
async fn offer_serves_waiting_vip_and_regular_then_keeps_remainder() {
    let (pool, test_env) = pool(10, 5);
    let mut feed = pool.subscribe_allocations();

    assert!(pool.request(&regular("nora")).await.unwrap().is_none());
    assert!(pool.request(&vip("vera")).await.unwrap().is_none());
    assert_eq!(pool.waiting_count(), 2);

    assert_eq!(pool.offer(batch(3)).await.unwrap(), 3);

    assert_eq!(pool.available_count(), 1);
    assert_eq!(pool.remaining_supply(), 7);
    assert_eq!(pool.sold_count(), 2);
    assert_eq!(pool.waiting_count(), 0);

    let first = feed.recv().await.unwrap();
    let second = feed.recv().await.unwrap();
    assert_eq!(first.customer, "vera");
    assert!(first.vip && first.deferred);
    assert_eq!(second.customer, "nora");

    assert!(test_env.notifier.contains("vera(VIP) received reserved ticket"));
    assert!(test_env.notifier.contains("nora received reserved ticket"));
    assert_eq!(test_env.sink.count_with_status(TicketStatus::Sold), 2);
    assert_accounted(&pool).await;
}

#[tokio::test]
async fn waiting_vip_is_served_before_earlier_regular() {
    let (pool, _env) = pool(10, 5);
    pool.request(&regular("first")).await.unwrap();
    pool.request(&vip("second")).await.unwrap();

    let mut feed = pool.subscribe_allocations();
    pool.offer(batch(1)).await.unwrap();

    assert_eq!(feed.recv().await.unwrap().customer, "second");
    assert_eq!(pool.waiting_count(), 1);
}

#[tokio::test]
async fn waiting_vips_are_served_in_arrival_order() {
    let (pool, _env) = pool(10, 5);
    for name in ["v1", "v2", "v3"] {
        pool.request(&vip(name)).await.unwrap();
    }

    let mut feed = pool.subscribe_allocations();
    pool.offer(batch(2)).await.unwrap();

    assert_eq!(feed.recv().await.unwrap().customer, "v1");
    assert_eq!(feed.recv().await.unwrap().customer, "v2");
    assert_eq!(pool.waiting_count(), 1);
}

#[tokio::test]
async fn request_with_available_tickets_is_served_directly() {
    let (pool, _env) = pool(10, 5);
    pool.offer(batch(2)).await.unwrap();

    let mut feed = pool.subscribe_allocations();
    let ticket = pool.request(&regular("rita")).await.unwrap().unwrap();

    assert_eq!(ticket.status, TicketStatus::Sold);
    assert_eq!(ticket.sold_at, Some(test_clock().now()));
    assert!(!feed.recv().await.unwrap().deferred);
}

#[tokio::test]
async fn partial_batch_admits_only_free_slots() {
    let (pool, test_env) = pool(20, 5);
    pool.offer(batch(3)).await.unwrap();

    assert_eq!(pool.offer(batch(5)).await.unwrap(), 2);
    assert_eq!(pool.available_count(), 5);
    assert_eq!(pool.remaining_supply(), 15);
    assert!(pool.is_at_capacity());
    assert!(test_env.notifier.contains("Only 2 of 5 tickets added"));
    // Discarded tickets are never persisted.
    assert_eq!(test_env.sink.ticket_count(), 5);
    assert_accounted(&pool).await;
}

#[tokio::test]
async fn batch_is_capped_by_remaining_supply() {
    let (pool, test_env) = pool(4, 10);
    assert_eq!(pool.offer(batch(3)).await.unwrap(), 3);
    assert_eq!(pool.offer(batch(3)).await.unwrap(), 1);
    assert_eq!(pool.remaining_supply(), 0);

    assert_eq!(pool.offer(batch(3)).await.unwrap(), 0);
    assert!(test_env
        .notifier
        .contains("No more tickets available to add. Total tickets exhausted."));
    assert_accounted(&pool).await;
}

// ============================================================================
// Exhaustion and stop
// ============================================================================

#[tokio::test]
async fn zero_supply_stops_on_first_request() {
    let (pool, test_env) = pool(0, 5);

    assert!(pool.request(&regular("early")).await.unwrap().is_none());
    assert!(pool.is_stopped());
    assert_eq!(pool.waiting_count(), 0);
    assert!(test_env
        .notifier
        .contains("All tickets have been sold. System will stop."));
}

#[tokio::test]
async fn selling_the_last_ticket_then_requesting_stops_the_pool() {
    let (pool, _env) = pool(1, 5);
    pool.offer(batch(1)).await.unwrap();

    assert!(pool.request(&regular("a")).await.unwrap().is_some());
    assert!(!pool.is_stopped());
    assert!(pool.request(&regular("b")).await.unwrap().is_none());
    assert!(pool.is_stopped());
}

#[tokio::test]
async fn no_ticket_is_handed_out_after_stop() {
    let (pool, _env) = pool(10, 5);
    pool.offer(batch(3)).await.unwrap();
    pool.stop().await;

    assert!(pool.request(&vip("late")).await.unwrap().is_none());
    assert!(pool.request(&regular("later")).await.unwrap().is_none());
    assert_eq!(pool.available_count(), 3);
    assert_eq!(pool.sold_count(), 0);
}

// ============================================================================
// Pause
// ============================================================================

#[tokio::test]
async fn pause_suspends_offers_until_resume() {
    let (pool, test_env) = pool(10, 5);
    pool.set_paused(true).await;

    let mut offer = task::spawn(pool.offer(batch(3)));
    assert_pending!(offer.poll());
    assert_eq!(pool.available_count(), 0);
    assert_eq!(pool.remaining_supply(), 10);
    assert_eq!(test_env.sink.ticket_count(), 0);

    pool.set_paused(false).await;
    pool.wake_all();
    assert!(offer.is_woken());

    let admitted = loop {
        if let Poll::Ready(result) = offer.poll() {
            break result.unwrap();
        }
        tokio::task::yield_now().await;
    };
    assert_eq!(admitted, 3);
    assert_eq!(pool.available_count(), 3);
}

#[tokio::test]
async fn paused_request_resumes_and_is_served() {
    let (pool, _env) = pool(10, 5);
    pool.offer(batch(1)).await.unwrap();
    pool.set_paused(true).await;

    let requester = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.request(&regular("patient")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!requester.is_finished());
    assert_eq!(pool.available_count(), 1);

    pool.set_paused(false).await;
    pool.wake_all();
    let ticket = tokio::time::timeout(Duration::from_secs(2), requester)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(ticket.is_some());
    assert_eq!(pool.available_count(), 0);
}

#[tokio::test]
async fn stop_releases_paused_callers() {
    let (pool, _env) = pool(10, 5);
    pool.set_paused(true).await;

    let requester = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.request(&regular("stuck")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.stop().await;

    let result = tokio::time::timeout(Duration::from_secs(2), requester)
        .await
        .unwrap()
        .unwrap();
    assert!(result.unwrap().is_none());
    let snapshot = pool.snapshot().await;
    assert!(snapshot.paused && snapshot.stopped);
}

// ============================================================================
// Collaborator failures
// ============================================================================

#[tokio::test]
async fn persistence_failure_mid_batch_keeps_pool_consistent() {
    let sink = Arc::new(RecordingSink::failing_after(2));
    let env = MarketEnvironment::new(
        Arc::new(test_clock()),
        sink.clone(),
        Arc::new(RecordingNotifier::new()),
    );
    let pool = TicketPool::new(&MarketConfig::default().with_total_tickets(10), env);

    let err = pool.offer(batch(5)).await.unwrap_err();
    assert!(matches!(err, PoolError::Persistence(_)));
    assert_eq!(pool.available_count(), 2);
    assert_eq!(pool.remaining_supply(), 8);
    assert_eq!(sink.ticket_count(), 2);
    assert_accounted(&pool).await;

    // The sale cannot be persisted either; the ticket stays available.
    assert!(pool.request(&regular("unlucky")).await.is_err());
    assert_eq!(pool.available_count(), 2);
    assert_eq!(pool.sold_count(), 0);
    assert_accounted(&pool).await;
}

#[tokio::test]
async fn notifier_failures_do_not_affect_the_pool() {
    let test_env = TestEnvironment::new();
    let env = MarketEnvironment::new(
        Arc::new(test_clock()),
        test_env.sink.clone(),
        Arc::new(FailingNotifier),
    );
    let pool = TicketPool::new(&MarketConfig::default(), env);

    assert_eq!(pool.offer(batch(3)).await.unwrap(), 3);
    assert!(pool.request(&vip("quiet")).await.unwrap().is_some());
    assert_eq!(test_env.sink.ticket_count(), 3);
}
