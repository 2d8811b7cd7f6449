//! In-memory ledger for fast, deterministic tests.
//!
//! [`InMemoryLedger`] behaves like a row-locking transactional store:
//!
//! - every account is its own lock, so unrelated accounts never contend
//! - a transfer holds both rows for the whole transaction, taken in
//!   [`lock_order`]
//! - every committed operation is appended to an operation log for assertions

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use bankstress_core::{AccountId, Ledger, LedgerError, LedgerFuture, Money, lock_order};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

type Row = Arc<Mutex<Money>>;

/// A committed ledger operation, as recorded by [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// An account was created.
    CreateAccount {
        /// New account.
        account: AccountId,
        /// Opening balance.
        balance: Money,
    },
    /// Money was deposited.
    Deposit {
        /// Credited account.
        account: AccountId,
        /// Amount.
        amount: Money,
    },
    /// Money was withdrawn.
    Withdraw {
        /// Debited account.
        account: AccountId,
        /// Amount.
        amount: Money,
    },
    /// Money moved between two accounts.
    Transfer {
        /// Debited account.
        from: AccountId,
        /// Credited account.
        to: AccountId,
        /// Amount.
        amount: Money,
    },
}

/// Row-locking in-memory ledger.
///
/// # Example
///
/// ```
/// use bankstress_core::{AccountId, Ledger, Money};
/// use bankstress_testing::InMemoryLedger;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = InMemoryLedger::new();
/// let a = AccountId::new("a");
/// let b = AccountId::new("b");
///
/// ledger.create_account(&a, Money::ZERO).await?;
/// ledger.create_account(&b, Money::ZERO).await?;
/// ledger.transfer(&a, &b, Money::new(10)).await?;
///
/// assert_eq!(ledger.balance(&a).await?, Money::new(-10));
/// assert_eq!(ledger.balance(&b).await?, Money::new(10));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<AccountId, Row>>>,
    operations: Arc<StdMutex<Vec<LedgerOp>>>,
    lock_hold: Duration,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first row of a transfer locked for `hold` before taking the
    /// second one.
    ///
    /// Widens the window in which two opposite transfers overlap, which is
    /// what deadlock tests want.
    #[must_use]
    pub const fn with_lock_hold(mut self, hold: Duration) -> Self {
        self.lock_hold = hold;
        self
    }

    /// All committed operations, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<LedgerOp> {
        self.operations.lock().unwrap().clone()
    }

    /// Committed transfers credited to `account`.
    #[must_use]
    pub fn transfers_to(&self, account: &AccountId) -> Vec<LedgerOp> {
        self.operations()
            .into_iter()
            .filter(|op| matches!(op, LedgerOp::Transfer { to, .. } if to == account))
            .collect()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().unwrap().len()
    }

    /// Check if the ledger has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().unwrap().is_empty()
    }

    /// Current balance of every account.
    pub async fn snapshot(&self) -> BTreeMap<AccountId, Money> {
        let rows: Vec<(AccountId, Row)> = self
            .accounts
            .read()
            .unwrap()
            .iter()
            .map(|(id, row)| (id.clone(), Arc::clone(row)))
            .collect();

        let mut balances = BTreeMap::new();
        for (id, row) in rows {
            let balance = *row.lock().await;
            balances.insert(id, balance);
        }
        balances
    }

    /// Sum of every account balance.
    pub async fn total(&self) -> Money {
        self.snapshot().await.values().sum()
    }

    fn row(&self, id: &AccountId) -> Result<Row, LedgerError> {
        self.accounts
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))
    }

    fn record(&self, op: LedgerOp) {
        self.operations.lock().unwrap().push(op);
    }

    async fn adjust(&self, id: &AccountId, delta: Money) -> Result<(), LedgerError> {
        let row = self.row(id)?;
        let mut balance = row.lock().await;
        *balance += delta;
        Ok(())
    }
}

impl Ledger for InMemoryLedger {
    fn create_account<'a>(&'a self, id: &'a AccountId, balance: Money) -> LedgerFuture<'a, ()> {
        Box::pin(async move {
            {
                let mut accounts = self.accounts.write().unwrap();
                if accounts.contains_key(id) {
                    return Err(LedgerError::AccountExists(id.clone()));
                }
                accounts.insert(id.clone(), Arc::new(Mutex::new(balance)));
            }
            self.record(LedgerOp::CreateAccount {
                account: id.clone(),
                balance,
            });
            Ok(())
        })
    }

    fn deposit<'a>(&'a self, id: &'a AccountId, amount: Money) -> LedgerFuture<'a, ()> {
        Box::pin(async move {
            self.adjust(id, amount).await?;
            self.record(LedgerOp::Deposit {
                account: id.clone(),
                amount,
            });
            Ok(())
        })
    }

    fn withdraw<'a>(&'a self, id: &'a AccountId, amount: Money) -> LedgerFuture<'a, ()> {
        Box::pin(async move {
            self.adjust(id, -amount).await?;
            self.record(LedgerOp::Withdraw {
                account: id.clone(),
                amount,
            });
            Ok(())
        })
    }

    fn transfer<'a>(
        &'a self,
        from: &'a AccountId,
        to: &'a AccountId,
        amount: Money,
    ) -> LedgerFuture<'a, ()> {
        Box::pin(async move {
            let [first, second] = lock_order(from, to, amount)?;
            let first_row = self.row(first.account)?;
            let second_row = self.row(second.account)?;

            let mut first_balance = first_row.lock().await;
            if self.lock_hold.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.lock_hold).await;
            }
            let mut second_balance = second_row.lock().await;

            *first_balance += first.delta;
            *second_balance += second.delta;
            drop(second_balance);
            drop(first_balance);

            tracing::trace!(from = %from, to = %to, amount = %amount, "In-memory transfer committed");
            self.record(LedgerOp::Transfer {
                from: from.clone(),
                to: to.clone(),
                amount,
            });
            Ok(())
        })
    }

    fn balance<'a>(&'a self, id: &'a AccountId) -> LedgerFuture<'a, Money> {
        Box::pin(async move {
            let row = self.row(id)?;
            let balance = *row.lock().await;
            Ok(balance)
        })
    }
}
