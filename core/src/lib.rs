//! # Bankstress Core
//!
//! Core traits and types for the bankstress correctness harness.
//!
//! The harness drives many concurrent simulated customers who deposit,
//! withdraw and transfer money against a shared transactional ledger, then
//! checks that no money was created or destroyed once all activity stops.
//!
//! This crate holds everything the other crates agree on:
//!
//! - **Account types**: [`AccountId`] and [`Money`]
//! - **Ledger**: the [`Ledger`] trait every store backend implements, plus the
//!   ascending-id lock order used by two-account transfers
//! - **Configuration**: [`SimulationConfig`] and its validation
//! - **Errors**: [`HarnessError`], [`InvariantViolation`], [`ConfigError`]
//!
//! ## Example
//!
//! ```no_run
//! use bankstress_core::{AccountId, Ledger, LedgerError, Money};
//!
//! async fn pay<L: Ledger>(ledger: &L) -> Result<(), LedgerError> {
//!     let alice = AccountId::for_customer(0);
//!     let bob = AccountId::for_customer(1);
//!
//!     ledger.deposit(&alice, Money::new(100)).await?;
//!     ledger.transfer(&alice, &bob, Money::new(30)).await?;
//!
//!     assert_eq!(ledger.balance(&bob).await?, Money::new(30));
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod config;
pub mod error;
pub mod ledger;

pub use account::{AccountId, Money};
pub use config::{ConfigError, SimulationConfig};
pub use error::{HarnessError, InvariantViolation};
pub use ledger::{BalanceUpdate, Ledger, LedgerError, LedgerFuture, lock_order};
