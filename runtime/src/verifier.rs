//! Post-run invariant checks.
//!
//! Run only after every customer has stopped and drained its inbox. Two laws
//! are checked, in this order:
//!
//! 1. **Mirror**: each customer's believed balance equals its store balance.
//! 2. **Conservation**: all wallets plus all store balances equal the money
//!    handed out at setup.

use crate::customer::CustomerSummary;
use bankstress_core::{AccountId, HarnessError, InvariantViolation, Ledger, Money};
use tracing::{error, info};

/// Verified end state of one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerBalance {
    /// Account id.
    pub id: AccountId,
    /// Cash outside the bank.
    pub wallet: Money,
    /// Balance committed in the store (equal to the believed balance).
    pub balance: Money,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Per-customer end state, ordered by id.
    pub customers: Vec<CustomerBalance>,
    /// Sum of every wallet.
    pub total_wallets: Money,
    /// Sum of every store balance.
    pub total_balances: Money,
    /// Money handed out at setup.
    pub expected_total: Money,
}

impl VerificationReport {
    /// Wallets plus balances.
    #[must_use]
    pub fn actual_total(&self) -> Money {
        self.total_wallets + self.total_balances
    }
}

/// Check the mirror and conservation laws.
///
/// # Errors
///
/// - [`HarnessError::Invariant`] with [`InvariantViolation::BalanceMismatch`]
///   for the first customer whose believed balance differs from the store
/// - [`HarnessError::Invariant`] with [`InvariantViolation::TotalMismatch`]
///   if money was created or destroyed
/// - [`HarnessError::Ledger`] if a balance cannot be read
pub async fn verify(
    ledger: &dyn Ledger,
    summaries: &[CustomerSummary],
    expected_total: Money,
) -> Result<VerificationReport, HarnessError> {
    let mut customers = Vec::with_capacity(summaries.len());

    for summary in summaries {
        let stored = ledger.balance(&summary.id).await?;
        if stored != summary.believed_balance {
            error!(
                customer = %summary.id,
                believed = %summary.believed_balance,
                stored = %stored,
                "Balance mismatch"
            );
            return Err(InvariantViolation::BalanceMismatch {
                customer: summary.id.clone(),
                believed: summary.believed_balance,
                stored,
            }
            .into());
        }
        customers.push(CustomerBalance {
            id: summary.id.clone(),
            wallet: summary.wallet,
            balance: stored,
        });
    }
    customers.sort_by(|a, b| a.id.cmp(&b.id));

    let total_wallets: Money = customers.iter().map(|c| c.wallet).sum();
    let total_balances: Money = customers.iter().map(|c| c.balance).sum();
    let actual = total_wallets + total_balances;

    if actual != expected_total {
        error!(expected = %expected_total, actual = %actual, "Total money mismatch");
        return Err(InvariantViolation::TotalMismatch {
            expected: expected_total,
            actual,
        }
        .into());
    }

    info!(
        customers = customers.len(),
        wallets = %total_wallets,
        balances = %total_balances,
        "Verification passed"
    );

    Ok(VerificationReport {
        customers,
        total_wallets,
        total_balances,
        expected_total,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::customer::CustomerStats;
    use bankstress_core::LedgerError;
    use bankstress_testing::InMemoryLedger;

    fn summary(index: usize, wallet: i64, balance: i64) -> CustomerSummary {
        CustomerSummary {
            id: AccountId::for_customer(index),
            wallet: Money::new(wallet),
            believed_balance: Money::new(balance),
            stats: CustomerStats::default(),
        }
    }

    async fn ledger_with(balances: &[i64]) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        for (i, balance) in balances.iter().enumerate() {
            ledger
                .create_account(&AccountId::for_customer(i), Money::new(*balance))
                .await
                .unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn passes_when_money_is_conserved() {
        // W = 100: customer 0 sent 30 to customer 1, customer 1 withdrew 20,
        // customer 2 deposited 50.
        let ledger = ledger_with(&[-30, 10, 50]).await;
        let summaries = [summary(0, 100, -30), summary(1, 120, 10), summary(2, 50, 50)];

        let report = verify(&ledger, &summaries, Money::new(300)).await.unwrap();

        assert_eq!(report.total_wallets, Money::new(270));
        assert_eq!(report.total_balances, Money::new(30));
        assert_eq!(report.actual_total(), report.expected_total);
        assert_eq!(report.customers.len(), 3);
    }

    #[tokio::test]
    async fn reports_mirror_divergence_with_both_values() {
        let ledger = ledger_with(&[40, 0]).await;
        let summaries = [summary(0, 60, 40), summary(1, 100, 5)];

        let err = verify(&ledger, &summaries, Money::new(200))
            .await
            .unwrap_err();

        match err {
            HarnessError::Invariant(InvariantViolation::BalanceMismatch {
                customer,
                believed,
                stored,
            }) => {
                assert_eq!(customer, AccountId::for_customer(1));
                assert_eq!(believed, Money::new(5));
                assert_eq!(stored, Money::ZERO);
            }
            other => panic!("expected balance mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_created_money() {
        let ledger = ledger_with(&[40, 0]).await;
        let summaries = [summary(0, 61, 40), summary(1, 100, 0)];

        let err = verify(&ledger, &summaries, Money::new(200))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarnessError::Invariant(InvariantViolation::TotalMismatch { expected, actual })
                if expected == Money::new(200) && actual == Money::new(201)
        ));
    }

    #[tokio::test]
    async fn missing_account_is_a_store_error() {
        let ledger = ledger_with(&[0]).await;
        let summaries = [summary(0, 100, 0), summary(1, 100, 0)];

        let err = verify(&ledger, &summaries, Money::new(200))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarnessError::Ledger(LedgerError::AccountNotFound(_))
        ));
    }
}
