//! Action selection.
//!
//! Pure decision logic: given what a customer holds, pick one of deposit,
//! withdraw or transfer and a random amount. Nothing here touches the ledger.

use bankstress_core::Money;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Pick a uniform amount in `[0, upper - 1]`, or zero when `upper <= 0`.
///
/// The result is never negative and never reaches `upper`.
///
/// ```
/// use bankstress_core::Money;
/// use bankstress_runtime::selector::random_money;
///
/// let mut rng = rand::thread_rng();
/// assert_eq!(random_money(&mut rng, Money::ZERO), Money::ZERO);
/// assert!(random_money(&mut rng, Money::new(10)) < Money::new(10));
/// ```
pub fn random_money<R: Rng + ?Sized>(rng: &mut R, upper: Money) -> Money {
    if upper.is_positive() {
        Money::new(rng.gen_range(0..upper.amount()))
    } else {
        Money::ZERO
    }
}

/// The three things a customer can do on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Move cash from the wallet into the bank.
    Deposit,
    /// Move money from the bank into the wallet.
    Withdraw,
    /// Move money from this customer's account to a friend's.
    Transfer,
}

impl ActionKind {
    /// Every action, in selection order.
    pub const ALL: [Self; 3] = [Self::Deposit, Self::Withdraw, Self::Transfer];

    /// Lowercase name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully decided action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Deposit this amount from the wallet.
    Deposit(Money),
    /// Withdraw this amount into the wallet.
    Withdraw(Money),
    /// Transfer `amount` to the friend at index `friend`.
    Transfer {
        /// Index into the customer's friend list.
        friend: usize,
        /// Amount to move.
        amount: Money,
    },
    /// The chosen action drew a zero amount (or had no friend); do nothing.
    Idle(ActionKind),
}

impl Plan {
    /// The action this plan came from.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Deposit(_) => ActionKind::Deposit,
            Self::Withdraw(_) => ActionKind::Withdraw,
            Self::Transfer { .. } => ActionKind::Transfer,
            Self::Idle(kind) => *kind,
        }
    }
}

/// Random action source for one customer.
#[derive(Debug, Clone)]
pub struct ActionSelector {
    rng: StdRng,
}

impl ActionSelector {
    /// Create a selector with a fixed seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a selector seeded from the OS.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create the selector of the `index`-th customer.
    ///
    /// With a run seed every customer gets its own derived, reproducible
    /// stream; without one each customer is seeded from the OS.
    #[must_use]
    pub fn for_customer(seed: Option<u64>, index: usize) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed.wrapping_add(index as u64)),
            None => Self::from_entropy(),
        }
    }

    /// Pick a uniform amount in `[0, upper - 1]`.
    pub fn random_money(&mut self, upper: Money) -> Money {
        random_money(&mut self.rng, upper)
    }

    /// Pick one of the three actions uniformly.
    pub fn choose_action(&mut self) -> ActionKind {
        ActionKind::ALL[self.rng.gen_range(0..ActionKind::ALL.len())]
    }

    /// Decide the next action of a customer.
    ///
    /// - Deposit draws from `wallet`
    /// - Withdraw and Transfer draw from `believed_balance`
    /// - Transfer picks one of `friends` uniformly
    ///
    /// A zero draw, or a transfer with no friends, yields [`Plan::Idle`].
    pub fn plan(&mut self, wallet: Money, believed_balance: Money, friends: usize) -> Plan {
        let kind = self.choose_action();
        let ceiling = match kind {
            ActionKind::Deposit => wallet,
            ActionKind::Withdraw | ActionKind::Transfer => believed_balance,
        };

        let amount = self.random_money(ceiling);
        if amount.is_zero() {
            return Plan::Idle(kind);
        }

        match kind {
            ActionKind::Deposit => Plan::Deposit(amount),
            ActionKind::Withdraw => Plan::Withdraw(amount),
            ActionKind::Transfer if friends == 0 => Plan::Idle(kind),
            ActionKind::Transfer => Plan::Transfer {
                friend: self.rng.gen_range(0..friends),
                amount,
            },
        }
    }
}
