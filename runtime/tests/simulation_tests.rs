//! End-to-end simulation tests against the in-memory ledger.
//!
//! These run real customer tasks on a multi-threaded runtime, so the
//! interleaving of deposits, withdrawals, transfers and credits differs from
//! run to run. Every assertion must hold for any interleaving.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bankstress_core::{ConfigError, HarnessError, Ledger, LedgerError, Money};
use bankstress_runtime::Simulation;
use bankstress_testing::helpers::fast_config;
use bankstress_testing::{FaultScope, FaultyLedger, InMemoryLedger, LedgerOp};
use std::sync::Arc;
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(30);

/// Route harness logs through the test writer; `RUST_LOG` picks the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn money_is_conserved_for_various_customer_counts() {
    init_tracing();
    for customers in [1, 2, 3, 5, 8] {
        let ledger = Arc::new(InMemoryLedger::new());
        let config = fast_config(customers, 25);
        let expected = Money::new(config.expected_total());

        let report = tokio::time::timeout(DEADLINE, Simulation::run(config, ledger.clone()))
            .await
            .expect("simulation timed out")
            .unwrap_or_else(|e| panic!("{customers} customers: {e}"));

        assert_eq!(report.expected_total, expected);
        assert_eq!(report.actual_total(), expected);
        assert_eq!(report.total_balances, ledger.total().await);
        assert_eq!(report.customers.len(), customers);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mirrors_match_store_after_run() {
    let ledger = Arc::new(InMemoryLedger::new());
    let report = Simulation::run(fast_config(4, 30), ledger.clone())
        .await
        .unwrap();

    let snapshot = ledger.snapshot().await;
    for customer in &report.customers {
        assert_eq!(snapshot.get(&customer.id), Some(&customer.balance));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_committed_transfer_is_credited_exactly_once() {
    let ledger = Arc::new(InMemoryLedger::new());
    let completed = Simulation::setup(fast_config(5, 40), ledger.clone())
        .await
        .unwrap()
        .start()
        .await_completion()
        .await
        .unwrap();

    let transfers = ledger
        .operations()
        .into_iter()
        .filter(|op| matches!(op, LedgerOp::Transfer { .. }))
        .count();
    let sent: u32 = completed
        .summaries()
        .iter()
        .map(|s| s.stats.transfers_sent)
        .sum();
    assert_eq!(sent as usize, transfers);

    for summary in completed.summaries() {
        assert_eq!(summary.stats.undelivered, 0);
        assert_eq!(
            summary.stats.credits_received as usize,
            ledger.transfers_to(&summary.id).len(),
            "credits of {}",
            summary.id
        );
    }

    completed.verify().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_store_still_conserves_money() {
    let ledger = Arc::new(InMemoryLedger::new().with_lock_hold(Duration::from_millis(3)));
    let report = tokio::time::timeout(DEADLINE, Simulation::run(fast_config(4, 20), ledger))
        .await
        .expect("simulation timed out")
        .unwrap();

    assert_eq!(report.actual_total(), report.expected_total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_wallets_leave_everything_at_zero() {
    let ledger = Arc::new(InMemoryLedger::new());
    let config = fast_config(3, 10).with_initial_wallet(0);

    let report = Simulation::run(config, ledger.clone()).await.unwrap();

    assert_eq!(report.expected_total, Money::ZERO);
    assert_eq!(report.total_wallets, Money::ZERO);
    assert_eq!(report.total_balances, Money::ZERO);
    // Only the three account creations reached the store.
    assert_eq!(ledger.operations().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lone_customer_never_transfers() {
    let ledger = Arc::new(InMemoryLedger::new());
    let completed = Simulation::setup(fast_config(1, 30), ledger.clone())
        .await
        .unwrap()
        .start()
        .await_completion()
        .await
        .unwrap();

    let summary = &completed.summaries()[0];
    assert_eq!(summary.stats.transfers_sent, 0);
    assert_eq!(summary.stats.credits_received, 0);
    assert_eq!(summary.net_worth(), Money::new(5000));
    completed.verify().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn store_failure_fails_the_run() {
    init_tracing();
    let ledger = Arc::new(FaultyLedger::new(
        InMemoryLedger::new(),
        0,
        FaultScope::AllMutations,
    ));

    let result = tokio::time::timeout(DEADLINE, Simulation::run(fast_config(3, 20), ledger.clone()))
        .await
        .expect("failed simulation did not stop");

    match result {
        Err(HarnessError::Store { source, .. }) => {
            assert!(matches!(source, LedgerError::Connection(_)));
        }
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(ledger.is_tripped());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mid_run_failure_stops_every_customer() {
    init_tracing();
    let ledger = Arc::new(FaultyLedger::new(
        InMemoryLedger::new(),
        3,
        FaultScope::AllMutations,
    ));
    let config = fast_config(4, 10_000);

    let result = tokio::time::timeout(DEADLINE, Simulation::run(config, ledger.clone()))
        .await
        .expect("customers kept running after a failure");

    assert!(matches!(result, Err(ref e) if e.is_store_error()));
    assert!(ledger.injected_failures() >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transfer_disconnection_mid_run_fails_the_run() {
    init_tracing();
    let ledger = Arc::new(FaultyLedger::new(
        InMemoryLedger::new(),
        2,
        FaultScope::TransfersOnly,
    ));
    let config = fast_config(4, 10_000);

    let result = tokio::time::timeout(DEADLINE, Simulation::run(config, ledger.clone()))
        .await
        .expect("customers kept running after a failed transfer");

    match result {
        Err(HarnessError::Store { source, .. }) => {
            assert!(matches!(source, LedgerError::Connection(_)));
        }
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(ledger.is_tripped());
    assert!(ledger.injected_failures() >= 1);

    // Deposits and withdrawals kept committing; only two transfers got through.
    let transfers = ledger
        .inner()
        .operations()
        .into_iter()
        .filter(|op| matches!(op, LedgerOp::Transfer { .. }))
        .count();
    assert_eq!(transfers, 2);
}

#[tokio::test]
async fn overflowing_total_is_a_configuration_error() {
    let ledger = Arc::new(InMemoryLedger::new());
    let config = fast_config(2, 3).with_initial_wallet(i64::MAX / 2 + 1);

    let result = Simulation::run(config, ledger.clone()).await;

    assert!(matches!(
        result,
        Err(HarnessError::Configuration(ConfigError::TotalOverflow { customers: 2, .. }))
    ));
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn zero_customers_is_a_configuration_error() {
    let ledger = Arc::new(InMemoryLedger::new());
    let result = Simulation::run(fast_config(0, 10), ledger.clone()).await;

    assert!(matches!(
        result,
        Err(HarnessError::Configuration(ConfigError::NoCustomers))
    ));
    assert!(ledger.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_seeds_all_conserve() {
    for seed in 0..5u64 {
        let ledger = Arc::new(InMemoryLedger::new());
        let config = fast_config(3, 15).with_seed(seed);

        let report = Simulation::run(config, ledger.clone()).await.unwrap();

        assert_eq!(report.actual_total(), report.expected_total);
        assert_eq!(
            ledger.total().await,
            report.total_balances,
            "seed {seed}"
        );
        for customer in &report.customers {
            assert_eq!(ledger.balance(&customer.id).await.unwrap(), customer.balance);
        }
    }
}
