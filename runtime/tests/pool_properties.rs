//! Property tests for the ticket pool
//!
//! Random sequences of offers, requests, pauses and stops must never break
//! the pool's accounting.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use ticket_market_core::environment::Clock;
use ticket_market_core::{Customer, Ticket};
use ticket_market_runtime::TicketPool;
use ticket_market_testing::properties::arb_config;
use ticket_market_testing::{TestEnvironment, test_clock};
use tokio_test::{assert_pending, task};

#[derive(Debug, Clone)]
enum Op {
    Offer(usize),
    Request { customer: u8, vip: bool },
    Pause,
    Resume,
    Stop,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..8).prop_map(Op::Offer),
        6 => (0u8..6, any::<bool>()).prop_map(|(customer, vip)| Op::Request { customer, vip }),
        1 => Just(Op::Pause),
        1 => Just(Op::Resume),
        1 => Just(Op::Stop),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn accounting_holds_for_any_operation_sequence(
        config in arb_config(),
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        runtime().block_on(async {
            let test_env = TestEnvironment::new();
            let pool = TicketPool::new(&config, test_env.env.clone());
            let now = test_clock().now();
            let mut previous = pool.snapshot().await;

            for op in ops {
                match op {
                    Op::Offer(n) => {
                        let batch: Vec<Ticket> = (0..n).map(|_| Ticket::release("v", now)).collect();
                        if pool.is_paused() && !pool.is_stopped() {
                            let mut offer = task::spawn(pool.offer(batch));
                            assert_pending!(offer.poll());
                        } else {
                            let admitted = pool.offer(batch).await.unwrap();
                            assert!(admitted as usize <= n);
                        }
                    },
                    Op::Request { customer, vip } => {
                        let customer = Customer::new(format!("c{customer}"), vip, None, 1);
                        if pool.is_paused() && !pool.is_stopped() {
                            let mut request = task::spawn(pool.request(&customer));
                            assert_pending!(request.poll());
                        } else {
                            let was_stopped = pool.is_stopped();
                            let ticket = pool.request(&customer).await.unwrap();
                            if was_stopped {
                                assert!(ticket.is_none());
                            }
                        }
                    },
                    Op::Pause => pool.set_paused(true).await,
                    Op::Resume => {
                        pool.set_paused(false).await;
                        pool.wake_all();
                    },
                    Op::Stop => pool.stop().await,
                }

                let snapshot = pool.snapshot().await;
                assert!(snapshot.available <= snapshot.capacity);
                assert_eq!(snapshot.accounted(), snapshot.total);
                assert!(snapshot.remaining <= previous.remaining);
                assert!(snapshot.sold >= previous.sold);
                if previous.stopped {
                    assert!(snapshot.stopped);
                    assert_eq!(snapshot.sold, previous.sold);
                }
                if previous.paused && snapshot.paused {
                    assert_eq!(snapshot.available, previous.available);
                    assert_eq!(snapshot.sold, previous.sold);
                    assert_eq!(snapshot.remaining, previous.remaining);
                }
                previous = snapshot;
            }
        });
    }
}
