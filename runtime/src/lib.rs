//! # Bankstress Runtime
//!
//! Concurrent side of the bankstress harness.
//!
//! A simulation runs N customer actors against a shared [`Ledger`]. Each
//! customer owns an in-memory mirror of its account (wallet plus believed
//! balance), acts on a timer, and learns about incoming transfers through
//! its inbox. When every customer has stopped, the verifier checks that each
//! mirror matches the store and that no money was created or destroyed.
//!
//! ## Core Components
//!
//! - **[`Simulation`]**: account setup, friend graph, task spawning, join barrier
//! - **[`Customer`]**: one actor, its control loop and its hand-off protocol
//! - **[`ActionSelector`]**: random choice of the next action and its amount
//! - **[`verify`]**: post-run mirror and conservation checks
//! - **[`metrics`]**: Prometheus counters for actions, credits and failures
//!
//! ## Example
//!
//! ```no_run
//! use bankstress_core::{HarnessError, Ledger, SimulationConfig};
//! use bankstress_runtime::Simulation;
//! use std::sync::Arc;
//!
//! async fn run(ledger: Arc<dyn Ledger>) -> Result<(), HarnessError> {
//!     let config = SimulationConfig::new().with_customers(3).with_rounds(10);
//!     let report = Simulation::run(config, ledger).await?;
//!     assert_eq!(report.actual_total(), report.expected_total);
//!     Ok(())
//! }
//! ```
//!
//! [`Ledger`]: bankstress_core::Ledger

pub mod coordinator;
pub mod customer;
pub mod metrics;
pub mod selector;
pub mod verifier;

pub use coordinator::{CompletedSimulation, RunningSimulation, Simulation};
pub use customer::{Customer, CustomerPhase, CustomerStats, CustomerSummary, InboxSender};
pub use metrics::{CustomerMetrics, MetricsError, MetricsExporter};
pub use selector::{ActionKind, ActionSelector, Plan};
pub use verifier::{CustomerBalance, VerificationReport, verify};
