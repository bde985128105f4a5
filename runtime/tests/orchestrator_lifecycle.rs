//! Integration tests for the orchestrator state machine and live actors
//!
//! Uses millisecond actor timings so full runs finish quickly.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use ticket_market_core::environment::SystemClock;
use ticket_market_core::{
    ErrorKind, MarketConfig, MarketEnvironment, MarketError, TicketStatus,
};
use ticket_market_runtime::{
    ActorReport, ActorTiming, BroadcastNotifier, DEFAULT_VENDOR, InMemoryLedger, Orchestrator,
};
use ticket_market_testing::{FailingSink, RecordingNotifier, TestEnvironment, init_test_tracing};

// ============================================================================
// Test Fixtures
// ============================================================================

fn orchestrator(test_env: &TestEnvironment) -> Orchestrator {
    init_test_tracing();
    Orchestrator::new(test_env.env.clone()).with_timing(ActorTiming::fast())
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ============================================================================
// State machine
// ============================================================================

#[tokio::test]
async fn lifecycle_transitions_reject_wrong_states() {
    let test_env = TestEnvironment::new();
    let orchestrator = orchestrator(&test_env);

    for result in [orchestrator.pause().await, orchestrator.resume().await] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
    }

    orchestrator.start().await.unwrap();
    assert_eq!(
        orchestrator.start().await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        orchestrator.resume().await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );

    orchestrator.pause().await.unwrap();
    assert_eq!(
        orchestrator.pause().await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    orchestrator.resume().await.unwrap();

    orchestrator.stop().await.unwrap();
    assert_eq!(
        orchestrator.stop().await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert!(!orchestrator.is_running().await);
    assert!(test_env.notifier.contains("Ticket operations started"));
    assert!(test_env.notifier.contains("Ticket Operation Stopped."));
}

#[tokio::test]
async fn start_launches_default_vendor_and_restart_gets_fresh_pool() {
    let test_env = TestEnvironment::new();
    let orchestrator = orchestrator(&test_env);
    orchestrator
        .configure(MarketConfig::new(6, 3, 5, 10))
        .await
        .unwrap();

    orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.status().await.active_vendors, 1);
    let first_pool = orchestrator.pool().await.unwrap();
    wait_until(|| {
        let pool = first_pool.clone();
        async move { pool.remaining_supply() == 0 }
    })
    .await;

    let report = orchestrator.stop().await.unwrap();
    assert!(report.failures.is_empty());
    assert!(report.finished.iter().any(|(name, actor)| {
        name == DEFAULT_VENDOR && matches!(actor, ActorReport::Vendor(v) if v.admitted == 6)
    }));

    orchestrator.start().await.unwrap();
    let second_pool = orchestrator.pool().await.unwrap();
    assert!(!Arc::ptr_eq(&first_pool, &second_pool));
    assert!(first_pool.is_stopped());
    orchestrator.stop().await.unwrap();
}

#[tokio::test]
async fn duplicate_names_are_rejected_per_kind() {
    let test_env = TestEnvironment::new();
    let orchestrator = orchestrator(&test_env);
    orchestrator.start().await.unwrap();

    let err = orchestrator.add_vendor(DEFAULT_VENDOR, 2).await.unwrap_err();
    assert!(matches!(err, MarketError::DuplicateActor { .. }));

    orchestrator.add_customer("sam", false, None, Some(2)).await.unwrap();
    let err = orchestrator
        .add_customer("sam", true, None, Some(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    // Same name, other kind.
    orchestrator.add_vendor("sam", 2).await.unwrap();
    assert_eq!(test_env.sink.customer_names(), vec!["sam".to_string()]);

    orchestrator.stop().await.unwrap();
}

#[tokio::test]
async fn invalid_arguments_are_rejected_before_anything_runs() {
    let test_env = TestEnvironment::new();
    let orchestrator = orchestrator(&test_env);

    let err = orchestrator
        .configure(MarketConfig::default().with_capacity(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    orchestrator.start().await.unwrap();
    for result in [
        orchestrator.add_vendor("zero", 0).await.map(|_| ()),
        orchestrator.add_customer("zero", false, None, Some(0)).await.map(|_| ()),
        orchestrator.add_customer("quota", false, Some(0), None).await.map(|_| ()),
        orchestrator.add_customer("  ", false, None, None).await.map(|_| ()),
    ] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
    }
    assert!(test_env.sink.customer_names().is_empty());
    assert_eq!(orchestrator.status().await.active_customers, 0);

    orchestrator.stop().await.unwrap();
}

// ============================================================================
// Full runs
// ============================================================================

#[tokio::test]
async fn full_run_sells_every_ticket_exactly_once() {
    let ledger = Arc::new(InMemoryLedger::new());
    let notifier = Arc::new(BroadcastNotifier::new());
    let env = MarketEnvironment::new(Arc::new(SystemClock), ledger.clone(), notifier.clone());
    let orchestrator = Orchestrator::new(env).with_timing(ActorTiming::fast());
    orchestrator
        .configure(MarketConfig::new(30, 5, 50, 8))
        .await
        .unwrap();

    orchestrator.start().await.unwrap();
    orchestrator.add_vendor("Second-Vendor", 4).await.unwrap();
    orchestrator.add_customer("vip", true, None, None).await.unwrap();
    orchestrator.add_customer("reg1", false, None, None).await.unwrap();
    orchestrator.add_customer("reg2", false, Some(80), None).await.unwrap();

    let control = &orchestrator;
    wait_until(|| async move { control.status().await.pool_stopped }).await;
    let status = orchestrator.status().await;
    assert_eq!(status.sold_tickets, 30);
    assert_eq!(status.remaining_tickets, 0);
    assert_eq!(status.available_tickets, 0);

    let report = orchestrator.stop().await.unwrap();
    assert!(report.failures.is_empty());
    assert!(report.timed_out.is_empty());
    assert_eq!(report.finished.len(), 5);

    let delivered: u32 = report
        .finished
        .iter()
        .filter_map(|(_, actor)| match actor {
            ActorReport::Customer(c) => Some(c.total()),
            ActorReport::Vendor(_) => None,
        })
        .sum();
    assert_eq!(delivered, 30);

    assert_eq!(ledger.count_with_status(TicketStatus::Sold).await, 30);
    assert_eq!(ledger.count_with_status(TicketStatus::Available).await, 0);
    let by_customer: u32 = ledger.sales_by_customer().await.iter().map(|(_, n)| n).sum();
    assert_eq!(by_customer, 30);
    assert_eq!(ledger.customers().await.len(), 3);
    assert!(notifier
        .recent()
        .iter()
        .any(|line| line == "All tickets have been sold. System will stop."));
}

#[tokio::test]
async fn pause_freezes_counts_and_resume_continues() {
    let test_env = TestEnvironment::new();
    let orchestrator = orchestrator(&test_env);
    orchestrator
        .configure(MarketConfig::new(500, 2, 20, 50))
        .await
        .unwrap();
    orchestrator.start().await.unwrap();
    orchestrator.add_customer("c1", false, None, None).await.unwrap();

    let pool = orchestrator.pool().await.unwrap();
    wait_until(|| {
        let pool = pool.clone();
        async move { pool.sold_count() >= 2 }
    })
    .await;

    orchestrator.pause().await.unwrap();
    let frozen = pool.snapshot().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let later = pool.snapshot().await;
    assert_eq!(frozen, later);
    assert!(orchestrator.status().await.paused);

    orchestrator.resume().await.unwrap();
    wait_until(|| {
        let pool = pool.clone();
        async move { pool.sold_count() > frozen.sold }
    })
    .await;

    orchestrator.stop().await.unwrap();
}

#[tokio::test]
async fn stop_while_paused_finishes_within_grace() {
    let test_env = TestEnvironment::new();
    let orchestrator = orchestrator(&test_env);
    orchestrator.start().await.unwrap();
    orchestrator.add_customer("c1", true, None, Some(5)).await.unwrap();
    orchestrator.pause().await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.stop())
        .await
        .unwrap()
        .unwrap();
    assert!(report.timed_out.is_empty());
    assert_eq!(report.finished.len(), 2);
    assert_eq!(orchestrator.status().await.active_vendors, 0);
}

// ============================================================================
// Collaborator failures
// ============================================================================

#[tokio::test]
async fn persistence_failures_surface_as_unexpected() {
    init_test_tracing();
    let env = MarketEnvironment::new(
        Arc::new(SystemClock),
        Arc::new(FailingSink),
        Arc::new(RecordingNotifier::new()),
    );
    let orchestrator = Orchestrator::new(env).with_timing(ActorTiming::fast());
    orchestrator.start().await.unwrap();

    let err = orchestrator
        .add_customer("ghost", false, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Persistence(_)));
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert_eq!(orchestrator.status().await.active_customers, 0);

    // The default vendor fails on its first offer.
    let pool = orchestrator.pool().await.unwrap();
    let control = &orchestrator;
    wait_until(|| async move { control.status().await.active_vendors == 0 }).await;
    assert_eq!(pool.available_count(), 0);

    let report = orchestrator.stop().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind(), ErrorKind::Unexpected);
}
