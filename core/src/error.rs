//! Run-level errors.
//!
//! A run fails for exactly one of three reasons: a store operation failed
//! inside some customer, a money law was broken after quiescence, or the
//! run was misconfigured.

use crate::account::{AccountId, Money};
use crate::config::ConfigError;
use crate::ledger::LedgerError;
use thiserror::Error;

/// A money law that did not hold after all customers stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A customer's own model of its bank balance diverged from the store.
    #[error("Balance mismatch for customer {customer}: believed {believed}, stored {stored}")]
    BalanceMismatch {
        /// Offending customer.
        customer: AccountId,
        /// Balance the customer believes it has.
        believed: Money,
        /// Balance committed in the store.
        stored: Money,
    },

    /// Wallets plus store balances do not add up to the money put in.
    #[error("Total money mismatch: expected {expected}, found {actual}")]
    TotalMismatch {
        /// `customers * initial_wallet`.
        expected: Money,
        /// Sum of every wallet and every store balance.
        actual: Money,
    },
}

/// Errors that fail a harness run.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A ledger call failed inside a customer actor.
    #[error("Store error in customer {customer}: {source}")]
    Store {
        /// Customer whose action failed.
        customer: AccountId,
        /// Underlying store error.
        #[source]
        source: LedgerError,
    },

    /// A ledger call failed outside any actor (setup or verification).
    #[error("Store error: {0}")]
    Ledger(#[from] LedgerError),

    /// Post-run verification failed.
    #[error("Invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// The run parameters are invalid.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A customer task panicked or was aborted.
    #[error("Customer task failed: {0}")]
    ActorPanicked(String),
}

impl HarnessError {
    /// Returns `true` if the store failed, either in an actor or outside one.
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Ledger(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_mismatch_names_customer_and_values() {
        let error = HarnessError::from(InvariantViolation::BalanceMismatch {
            customer: AccountId::for_customer(3),
            believed: Money::new(120),
            stored: Money::new(90),
        });

        let display = format!("{error}");
        assert!(display.contains("000003"));
        assert!(display.contains("believed 120"));
        assert!(display.contains("stored 90"));
    }

    #[test]
    fn store_error_keeps_source() {
        let error = HarnessError::Store {
            customer: AccountId::for_customer(1),
            source: LedgerError::Commit("connection reset".to_string()),
        };

        assert!(error.is_store_error());
        let source = std::error::Error::source(&error).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("Failed to commit transaction: connection reset")
        );
    }

    #[test]
    fn invariant_is_not_a_store_error() {
        let error = HarnessError::from(InvariantViolation::TotalMismatch {
            expected: Money::new(300),
            actual: Money::new(299),
        });
        assert!(!error.is_store_error());
        assert!(format!("{error}").contains("expected 300, found 299"));
    }
}
