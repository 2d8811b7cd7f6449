//! Simulation configuration.
//!
//! Values are supplied by the application, either built in code with the
//! `with_*` methods or read from the environment with
//! [`SimulationConfig::from_env`].

use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the customer count.
pub const ENV_CUSTOMERS: &str = "BANK_CUSTOMERS";
/// Environment variable holding the initial wallet amount.
pub const ENV_INITIAL_WALLET: &str = "BANK_INITIAL_WALLET";
/// Environment variable holding the tick interval in milliseconds.
pub const ENV_TICK_INTERVAL_MS: &str = "BANK_TICK_INTERVAL_MS";
/// Environment variable holding the per-customer round limit.
pub const ENV_ROUNDS: &str = "BANK_ROUNDS";
/// Environment variable holding the balance check interval in milliseconds.
pub const ENV_BALANCE_CHECK_INTERVAL_MS: &str = "BANK_BALANCE_CHECK_INTERVAL_MS";
/// Environment variable holding the random seed.
pub const ENV_SEED: &str = "BANK_SEED";

/// Invalid simulation parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A simulation needs at least one customer.
    #[error("Customer count must be at least 1")]
    NoCustomers,

    /// Wallets cannot start negative.
    #[error("Initial wallet must not be negative, got {0}")]
    NegativeWallet(i64),

    /// A zero tick interval would spin the actor loop.
    #[error("Tick interval must be greater than zero")]
    ZeroTickInterval,

    /// `customers * initial_wallet` does not fit in an `i64`.
    #[error("Total money overflows: {customers} customers with {initial_wallet} each")]
    TotalOverflow {
        /// Customer count.
        customers: usize,
        /// Initial wallet of each customer.
        initial_wallet: i64,
    },

    /// An environment value could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },
}

/// Parameters of one harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of simulated customers (`N`).
    ///
    /// Default: 5
    pub customers: usize,

    /// Cash every customer starts with (`W`).
    ///
    /// Default: 5000
    pub initial_wallet: i64,

    /// Interval between two action ticks of one customer.
    ///
    /// Default: 1 second
    pub tick_interval: Duration,

    /// Number of ticks after which a customer stops.
    ///
    /// Default: 60
    pub rounds: u32,

    /// Reserved for periodic external auditing; not read by the simulation.
    ///
    /// Default: 1 second
    pub balance_check_interval: Duration,

    /// Seed for the action selectors. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    /// Create a configuration with the default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            customers: 5,
            initial_wallet: 5000,
            tick_interval: Duration::from_secs(1),
            rounds: 60,
            balance_check_interval: Duration::from_secs(1),
            seed: None,
        }
    }

    /// Set the number of customers.
    #[must_use]
    pub const fn with_customers(mut self, customers: usize) -> Self {
        self.customers = customers;
        self
    }

    /// Set the initial wallet amount.
    #[must_use]
    pub const fn with_initial_wallet(mut self, wallet: i64) -> Self {
        self.initial_wallet = wallet;
        self
    }

    /// Set the tick interval.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the per-customer round limit.
    #[must_use]
    pub const fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the balance check interval.
    #[must_use]
    pub const fn with_balance_check_interval(mut self, interval: Duration) -> Self {
        self.balance_check_interval = interval;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Total money in the system: `customers * initial_wallet`.
    ///
    /// Saturates at `i64::MAX`; [`SimulationConfig::validate`] rejects
    /// configurations where that would happen.
    #[must_use]
    pub const fn expected_total(&self) -> i64 {
        match self.checked_total() {
            Some(total) => total,
            None => i64::MAX,
        }
    }

    #[allow(clippy::cast_possible_wrap)] // Guarded by the comparison with i64::MAX
    const fn checked_total(&self) -> Option<i64> {
        if self.customers > i64::MAX as usize {
            return None;
        }
        (self.customers as i64).checked_mul(self.initial_wallet)
    }

    /// Check the parameters.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.customers == 0 {
            return Err(ConfigError::NoCustomers);
        }
        if self.initial_wallet < 0 {
            return Err(ConfigError::NegativeWallet(self.initial_wallet));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.checked_total().is_none() {
            return Err(ConfigError::TotalOverflow {
                customers: self.customers,
                initial_wallet: self.initial_wallet,
            });
        }
        Ok(())
    }

    /// Read the configuration from `BANK_*` environment variables.
    ///
    /// Missing variables keep their default value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but cannot be
    /// parsed, or any error from [`SimulationConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SimulationConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(customers) = parse(&lookup, ENV_CUSTOMERS)? {
            config.customers = customers;
        }
        if let Some(wallet) = parse(&lookup, ENV_INITIAL_WALLET)? {
            config.initial_wallet = wallet;
        }
        if let Some(ms) = parse(&lookup, ENV_TICK_INTERVAL_MS)? {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(rounds) = parse(&lookup, ENV_ROUNDS)? {
            config.rounds = rounds;
        }
        if let Some(ms) = parse(&lookup, ENV_BALANCE_CHECK_INTERVAL_MS)? {
            config.balance_check_interval = Duration::from_millis(ms);
        }
        config.seed = parse(&lookup, ENV_SEED)?;

        config.validate()?;
        Ok(config)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}
