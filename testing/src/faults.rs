//! Fault injection for ledger tests.
//!
//! [`FaultyLedger`] wraps any [`Ledger`] and simulates the store going away
//! after a fixed number of successful mutations. Once tripped it stays down,
//! like a dropped connection, so every later mutation fails too.

use bankstress_core::{AccountId, Ledger, LedgerError, LedgerFuture, Money};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Which operations count towards (and fail after) the fault threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultScope {
    /// Deposits, withdrawals and transfers.
    AllMutations,
    /// Transfers only; deposits and withdrawals always pass through.
    TransfersOnly,
}

/// Ledger wrapper that fails after `n` successful mutations.
///
/// Account creation and balance reads are never failed, so setup and
/// post-run inspection keep working.
///
/// # Example
///
/// ```
/// use bankstress_core::{AccountId, Ledger, LedgerError, Money};
/// use bankstress_testing::{FaultScope, FaultyLedger, InMemoryLedger};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = FaultyLedger::new(InMemoryLedger::new(), 1, FaultScope::AllMutations);
/// let id = AccountId::new("a");
/// ledger.create_account(&id, Money::ZERO).await?;
///
/// ledger.deposit(&id, Money::new(1)).await?;
/// let second = ledger.deposit(&id, Money::new(1)).await;
/// assert!(matches!(second, Err(LedgerError::Connection(_))));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FaultyLedger<L> {
    inner: L,
    fail_after: usize,
    scope: FaultScope,
    admitted: AtomicUsize,
    injected: AtomicUsize,
    tripped: AtomicBool,
}

impl<L: Ledger> FaultyLedger<L> {
    /// Wrap `inner`, allowing `fail_after` mutations in `scope` to succeed.
    #[must_use]
    pub const fn new(inner: L, fail_after: usize, scope: FaultScope) -> Self {
        Self {
            inner,
            fail_after,
            scope,
            admitted: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// The wrapped ledger.
    #[must_use]
    pub const fn inner(&self) -> &L {
        &self.inner
    }

    /// Number of calls that failed because of the injected fault.
    #[must_use]
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    /// Whether the simulated disconnection has happened.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    fn admit(&self, is_transfer: bool) -> Result<(), LedgerError> {
        if self.scope == FaultScope::TransfersOnly && !is_transfer {
            return Ok(());
        }

        let seen = self.admitted.fetch_add(1, Ordering::SeqCst);
        if seen >= self.fail_after {
            self.tripped.store(true, Ordering::SeqCst);
            self.injected.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(after = self.fail_after, "Injecting simulated disconnection");
            return Err(LedgerError::Connection(
                "simulated disconnection".to_string(),
            ));
        }
        Ok(())
    }
}

impl<L: Ledger> Ledger for FaultyLedger<L> {
    fn create_account<'a>(&'a self, id: &'a AccountId, balance: Money) -> LedgerFuture<'a, ()> {
        self.inner.create_account(id, balance)
    }

    fn deposit<'a>(&'a self, id: &'a AccountId, amount: Money) -> LedgerFuture<'a, ()> {
        if let Err(e) = self.admit(false) {
            return Box::pin(async move { Err(e) });
        }
        self.inner.deposit(id, amount)
    }

    fn withdraw<'a>(&'a self, id: &'a AccountId, amount: Money) -> LedgerFuture<'a, ()> {
        if let Err(e) = self.admit(false) {
            return Box::pin(async move { Err(e) });
        }
        self.inner.withdraw(id, amount)
    }

    fn transfer<'a>(
        &'a self,
        from: &'a AccountId,
        to: &'a AccountId,
        amount: Money,
    ) -> LedgerFuture<'a, ()> {
        if let Err(e) = self.admit(true) {
            return Box::pin(async move { Err(e) });
        }
        self.inner.transfer(from, to, amount)
    }

    fn balance<'a>(&'a self, id: &'a AccountId) -> LedgerFuture<'a, Money> {
        self.inner.balance(id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::InMemoryLedger;

    async fn two_accounts<L: Ledger>(ledger: &L) -> (AccountId, AccountId) {
        let a = AccountId::new("a");
        let b = AccountId::new("b");
        ledger.create_account(&a, Money::ZERO).await.unwrap();
        ledger.create_account(&b, Money::ZERO).await.unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn stays_down_once_tripped() {
        let ledger = FaultyLedger::new(InMemoryLedger::new(), 2, FaultScope::AllMutations);
        let (a, b) = two_accounts(&ledger).await;

        ledger.deposit(&a, Money::new(10)).await.unwrap();
        ledger.transfer(&a, &b, Money::new(4)).await.unwrap();
        assert!(!ledger.is_tripped());

        assert!(ledger.withdraw(&b, Money::new(1)).await.is_err());
        assert!(ledger.deposit(&a, Money::new(1)).await.is_err());
        assert!(ledger.is_tripped());
        assert_eq!(ledger.injected_failures(), 2);

        // Reads still work after the fault.
        assert_eq!(ledger.balance(&a).await.unwrap(), Money::new(6));
        assert_eq!(ledger.balance(&b).await.unwrap(), Money::new(4));
    }

    #[tokio::test]
    async fn transfers_only_scope_ignores_other_mutations() {
        let ledger = FaultyLedger::new(InMemoryLedger::new(), 0, FaultScope::TransfersOnly);
        let (a, b) = two_accounts(&ledger).await;

        ledger.deposit(&a, Money::new(10)).await.unwrap();
        ledger.withdraw(&a, Money::new(3)).await.unwrap();
        let result = ledger.transfer(&a, &b, Money::new(1)).await;

        assert!(matches!(result, Err(LedgerError::Connection(_))));
        assert_eq!(ledger.inner().total().await, Money::new(7));
        assert!(ledger.inner().transfers_to(&b).is_empty());
    }
}
