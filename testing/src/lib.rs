//! # Bankstress Testing
//!
//! Testing utilities for the bankstress harness.
//!
//! This crate provides:
//! - [`InMemoryLedger`]: a row-locking, transactional ledger with an
//!   operation log
//! - [`FaultyLedger`]: wraps any ledger and simulates a store disconnection
//! - Helpers for building fast simulation configurations
//!
//! ## Example
//!
//! ```ignore
//! use bankstress_runtime::Simulation;
//! use bankstress_testing::{InMemoryLedger, helpers::fast_config};
//! use std::sync::Arc;
//!
//! #[tokio::test(flavor = "multi_thread")]
//! async fn money_is_conserved() {
//!     let ledger = Arc::new(InMemoryLedger::new());
//!     let report = Simulation::run(fast_config(4, 20), ledger).await.unwrap();
//!     assert_eq!(report.actual_total(), report.expected_total);
//! }
//! ```

pub mod faults;
pub mod ledger_mocks;

/// Test helpers and utilities.
pub mod helpers {
    use bankstress_core::SimulationConfig;
    use std::time::Duration;

    /// Tick interval used by [`fast_config`].
    pub const FAST_TICK: Duration = Duration::from_millis(2);

    /// A configuration that finishes in milliseconds.
    ///
    /// Uses a fixed seed so the action sequence of each customer is
    /// reproducible; interleaving across customers still varies.
    #[must_use]
    pub const fn fast_config(customers: usize, rounds: u32) -> SimulationConfig {
        SimulationConfig::new()
            .with_customers(customers)
            .with_rounds(rounds)
            .with_tick_interval(FAST_TICK)
            .with_seed(0x5EED)
    }
}

// Re-export commonly used items
pub use faults::{FaultScope, FaultyLedger};
pub use ledger_mocks::{InMemoryLedger, LedgerOp};
