//! Account identifiers and money amounts.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Width of the zero-padded customer ids built by [`AccountId::for_customer`].
const CUSTOMER_ID_WIDTH: usize = 6;

/// Unique identifier of a ledger account.
///
/// Ids are compared lexicographically. That total order is what two-account
/// transfers lock by (see [`crate::ledger::lock_order`]), so it must be the
/// same order every store backend sees.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an `AccountId` from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the id of the `index`-th simulated customer.
    ///
    /// The index is zero-padded so that lexicographic order matches numeric
    /// order for any realistic customer count.
    ///
    /// ```
    /// use bankstress_core::AccountId;
    ///
    /// assert_eq!(AccountId::for_customer(7).as_str(), "000007");
    /// assert!(AccountId::for_customer(9) < AccountId::for_customer(10));
    /// ```
    #[must_use]
    pub fn for_customer(index: usize) -> Self {
        Self(format!("{index:0width$}", width = CUSTOMER_ID_WIDTH))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An amount of money in whole units.
///
/// Signed on purpose: the ledger never pre-checks funds, so a store balance
/// can legitimately dip below zero while the harness runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero money.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` amount.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Returns the raw amount.
    #[must_use]
    pub const fn amount(self) -> i64 {
        self.0
    }

    /// Checks if this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checks if this amount is strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_ids_sort_numerically() {
        let mut ids: Vec<AccountId> = [10, 2, 100, 1]
            .into_iter()
            .map(AccountId::for_customer)
            .collect();
        ids.sort();

        let order: Vec<&str> = ids.iter().map(AccountId::as_str).collect();
        assert_eq!(order, vec!["000001", "000002", "000010", "000100"]);
    }

    #[test]
    fn arbitrary_ids_use_lexicographic_order() {
        assert!(AccountId::new("alice") < AccountId::new("bob"));
        assert!(AccountId::new("B") < AccountId::new("a"));
    }

    #[test]
    fn money_arithmetic_allows_negative_balances() {
        let mut balance = Money::new(10);
        balance -= Money::new(25);
        assert_eq!(balance, Money::new(-15));
        assert!(!balance.is_positive());

        balance += Money::new(15);
        assert!(balance.is_zero());
    }

    #[test]
    fn money_sums() {
        let amounts = [Money::new(3), Money::new(-1), Money::new(8)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total, Money::new(10));
        assert_eq!(-total, Money::new(-10));
    }
}
