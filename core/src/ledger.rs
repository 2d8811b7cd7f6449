//! Ledger trait and the two-account lock order.
//!
//! This module defines the one abstraction the harness needs from a
//! transactional store: an account table keyed by [`AccountId`] whose balance
//! can be moved by atomic transactions.
//!
//! # Design
//!
//! Every mutating operation is one store-side transaction. Nothing is
//! pre-checked: a withdrawal larger than the balance simply drives the
//! balance negative, which is exactly the racy behaviour the harness wants to
//! put under contention.
//!
//! # Deadlock avoidance
//!
//! A transfer touches two rows. If one transaction updated A then B while a
//! concurrent one updated B then A, each could hold the lock the other waits
//! for. [`lock_order`] removes that cycle: both updates of a transfer are
//! always applied in ascending [`AccountId`] order, whatever the direction of
//! the transfer.
//!
//! # Implementations
//!
//! - `PostgresLedger` (in `bankstress-postgres`): production implementation
//! - `InMemoryLedger` (in `bankstress-testing`): per-account locks, for tests

use crate::account::{AccountId, Money};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by every [`Ledger`] operation.
pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

/// Errors raised by the store behind a [`Ledger`].
///
/// Every variant is a store-level failure. The harness never retries any of
/// them: a failed operation is reported, not masked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Could not reach the store.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transaction could not be started.
    #[error("Failed to begin transaction: {0}")]
    Begin(String),

    /// A statement inside the transaction failed.
    #[error("Failed to execute statement: {0}")]
    Execute(String),

    /// The transaction could not be committed.
    #[error("Failed to commit transaction: {0}")]
    Commit(String),

    /// A read failed.
    #[error("Failed to read balance: {0}")]
    Read(String),

    /// The account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// An account with this id already exists.
    #[error("Account already exists: {0}")]
    AccountExists(AccountId),
}

/// A single signed balance adjustment inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate<'a> {
    /// Account whose balance changes.
    pub account: &'a AccountId,
    /// Amount added to the balance (negative for a debit).
    pub delta: Money,
}

/// Returns the two updates of a transfer in the order they must be applied.
///
/// The debit of `from` and the credit of `to` are sorted by ascending account
/// id, so two transfers over the same pair of accounts always lock the rows in
/// the same order regardless of direction.
///
/// # Errors
///
/// Returns [`LedgerError::Execute`] if `from` and `to` are the same account.
///
/// # Example
///
/// ```
/// use bankstress_core::{AccountId, Money, lock_order};
///
/// let a = AccountId::new("a");
/// let b = AccountId::new("b");
///
/// // b -> a still touches `a` first.
/// let [first, second] = lock_order(&b, &a, Money::new(5)).unwrap();
/// assert_eq!(first.account, &a);
/// assert_eq!(first.delta, Money::new(5));
/// assert_eq!(second.account, &b);
/// assert_eq!(second.delta, Money::new(-5));
/// ```
pub fn lock_order<'a>(
    from: &'a AccountId,
    to: &'a AccountId,
    amount: Money,
) -> Result<[BalanceUpdate<'a>; 2], LedgerError> {
    let debit = BalanceUpdate {
        account: from,
        delta: -amount,
    };
    let credit = BalanceUpdate {
        account: to,
        delta: amount,
    };

    match from.cmp(to) {
        std::cmp::Ordering::Less => Ok([debit, credit]),
        std::cmp::Ordering::Greater => Ok([credit, debit]),
        std::cmp::Ordering::Equal => Err(LedgerError::Execute(format!(
            "transfer from account {from} to itself"
        ))),
    }
}

/// Transactional account store used by the harness.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one ledger is shared by every
/// customer actor and called concurrently. The store provides isolation; the
/// harness adds no locking of its own around these calls.
///
/// # Atomicity
///
/// Each method is one transaction. In particular [`Ledger::transfer`] either
/// applies both its debit and its credit or neither.
///
/// # Dyn Compatibility
///
/// Methods return [`LedgerFuture`] instead of using `async fn` so the ledger
/// can be shared as `Arc<dyn Ledger>`.
pub trait Ledger: Send + Sync {
    /// Create an account with an initial balance.
    ///
    /// # Errors
    ///
    /// - `AccountExists`: the id is already taken
    /// - `Begin` / `Execute` / `Commit`: the transaction failed
    fn create_account<'a>(&'a self, id: &'a AccountId, balance: Money) -> LedgerFuture<'a, ()>;

    /// Add `amount` to the balance of `id`.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: no such account
    /// - `Begin` / `Execute` / `Commit`: the transaction failed
    fn deposit<'a>(&'a self, id: &'a AccountId, amount: Money) -> LedgerFuture<'a, ()>;

    /// Subtract `amount` from the balance of `id`.
    ///
    /// No sufficient-funds check is made; the balance may go negative.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: no such account
    /// - `Begin` / `Execute` / `Commit`: the transaction failed
    fn withdraw<'a>(&'a self, id: &'a AccountId, amount: Money) -> LedgerFuture<'a, ()>;

    /// Move `amount` from `from` to `to` inside one transaction.
    ///
    /// Both updates are applied in [`lock_order`].
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: either account is missing (nothing is applied)
    /// - `Execute`: `from == to`, or a statement failed
    /// - `Begin` / `Commit`: the transaction failed
    fn transfer<'a>(
        &'a self,
        from: &'a AccountId,
        to: &'a AccountId,
        amount: Money,
    ) -> LedgerFuture<'a, ()>;

    /// Read the committed balance of `id`.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: no such account
    /// - `Begin` / `Read`: the read failed
    fn balance<'a>(&'a self, id: &'a AccountId) -> LedgerFuture<'a, Money>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lock_order_is_independent_of_direction() {
        let low = AccountId::for_customer(1);
        let high = AccountId::for_customer(2);

        let forward = lock_order(&low, &high, Money::new(10)).unwrap_or_else(|e| panic!("{e}"));
        let backward = lock_order(&high, &low, Money::new(10)).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(forward[0].account, &low);
        assert_eq!(backward[0].account, &low);
        assert_eq!(forward[0].delta, Money::new(-10));
        assert_eq!(backward[0].delta, Money::new(10));
    }

    #[test]
    fn lock_order_conserves_money() {
        let a = AccountId::new("x");
        let b = AccountId::new("y");
        let updates = lock_order(&b, &a, Money::new(42)).unwrap_or_else(|e| panic!("{e}"));

        let net: Money = updates.iter().map(|u| u.delta).sum();
        assert!(net.is_zero());
    }

    #[test]
    fn lock_order_rejects_self_transfer() {
        let a = AccountId::new("same");
        let result = lock_order(&a, &a, Money::new(1));
        assert!(matches!(result, Err(LedgerError::Execute(_))));
    }

    #[test]
    fn not_found_error_display() {
        let error = LedgerError::AccountNotFound(AccountId::new("missing"));
        assert!(format!("{error}").contains("missing"));
    }

    proptest! {
        #[test]
        fn opposite_transfers_share_a_lock_order(
            a in 0usize..10_000,
            b in 0usize..10_000,
            amount in 1i64..1_000_000,
        ) {
            prop_assume!(a != b);
            let a = AccountId::for_customer(a);
            let b = AccountId::for_customer(b);

            let forward = lock_order(&a, &b, Money::new(amount)).unwrap_or_else(|e| panic!("{e}"));
            let backward = lock_order(&b, &a, Money::new(amount)).unwrap_or_else(|e| panic!("{e}"));

            prop_assert_eq!(forward[0].account, backward[0].account);
            prop_assert!(forward[0].account < forward[1].account);
            prop_assert!(forward.iter().map(|u| u.delta).sum::<Money>().is_zero());
        }
    }
}
