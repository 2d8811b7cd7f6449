//! Simulation coordinator.
//!
//! Sets up accounts and customers, starts every customer as its own task,
//! waits for all of them, then hands their end state to the verifier.
//!
//! # Lifecycle
//!
//! ```text
//! Simulation::setup ──► Simulation::start ──► RunningSimulation::await_completion ──► verify
//!   accounts              one task per           join barrier; first failure
//!   customers             customer               stops the rest and fails the run
//!   friend graph
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bankstress_core::{HarnessError, Ledger, SimulationConfig};
//! use bankstress_runtime::Simulation;
//! use std::sync::Arc;
//!
//! async fn check(ledger: Arc<dyn Ledger>) -> Result<(), HarnessError> {
//!     let report = Simulation::run(SimulationConfig::default(), ledger).await?;
//!     println!("conserved {} units", report.actual_total());
//!     Ok(())
//! }
//! ```

use crate::customer::{Customer, CustomerSummary, InboxSender};
use crate::selector::ActionSelector;
use crate::verifier::{VerificationReport, verify};
use bankstress_core::{AccountId, HarnessError, Ledger, Money, SimulationConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// A simulation whose accounts and customers are ready but not running.
pub struct Simulation {
    config: SimulationConfig,
    ledger: Arc<dyn Ledger>,
    customers: Vec<Customer>,
}

impl Simulation {
    /// Create accounts and customers and wire the friend graph.
    ///
    /// - one account per customer, opened with balance 0
    /// - every customer starts with `config.initial_wallet` in its wallet
    /// - every customer is friends with every other customer
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Configuration`] if `config` is invalid
    /// - [`HarnessError::Ledger`] if an account cannot be created
    pub async fn setup(
        config: SimulationConfig,
        ledger: Arc<dyn Ledger>,
    ) -> Result<Self, HarnessError> {
        config.validate()?;

        let mut customers = Vec::with_capacity(config.customers);
        let mut inboxes: Vec<(AccountId, InboxSender)> = Vec::with_capacity(config.customers);

        for index in 0..config.customers {
            let id = AccountId::for_customer(index);
            ledger.create_account(&id, Money::ZERO).await?;

            let selector = ActionSelector::for_customer(config.seed, index);
            let (customer, inbox) = Customer::new(id.clone(), Arc::clone(&ledger), selector, &config);
            info!(customer = %id, wallet = config.initial_wallet, "Created customer");

            customers.push(customer);
            inboxes.push((id, inbox));
        }

        for (i, customer) in customers.iter_mut().enumerate() {
            for (j, (id, inbox)) in inboxes.iter().enumerate() {
                if i != j {
                    customer.add_friend(id.clone(), inbox.clone());
                }
            }
        }
        // Only customers may hold inbox senders, otherwise no inbox ever closes.
        drop(inboxes);

        Ok(Self {
            config,
            ledger,
            customers,
        })
    }

    /// The customers, in id order.
    #[must_use]
    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    /// Start every customer as an independent task.
    #[must_use]
    pub fn start(self) -> RunningSimulation {
        let (shutdown, _) = broadcast::channel(1);
        let mut tasks = JoinSet::new();

        info!(customers = self.customers.len(), "Simulation started");
        for customer in self.customers {
            tasks.spawn(customer.run(shutdown.subscribe()));
        }

        RunningSimulation {
            config: self.config,
            ledger: self.ledger,
            tasks,
            shutdown,
        }
    }

    /// Setup, run, wait and verify in one call.
    ///
    /// # Errors
    ///
    /// Any error from [`Simulation::setup`],
    /// [`RunningSimulation::await_completion`] or [`verify`].
    pub async fn run(
        config: SimulationConfig,
        ledger: Arc<dyn Ledger>,
    ) -> Result<VerificationReport, HarnessError> {
        Self::setup(config, ledger).await?.start().finish().await
    }
}

/// A simulation whose customers are running.
pub struct RunningSimulation {
    config: SimulationConfig,
    ledger: Arc<dyn Ledger>,
    tasks: JoinSet<Result<CustomerSummary, HarnessError>>,
    shutdown: broadcast::Sender<()>,
}

impl RunningSimulation {
    /// Wait until every customer has stopped or failed.
    ///
    /// On the first failure the remaining customers are told to stop early;
    /// the barrier still waits for all of them before returning that first
    /// failure. Later failures are logged only.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Store`] if a customer's ledger call failed
    /// - [`HarnessError::ActorPanicked`] if a customer task panicked
    pub async fn await_completion(mut self) -> Result<CompletedSimulation, HarnessError> {
        let mut summaries = Vec::with_capacity(self.config.customers);
        let mut first_error: Option<HarnessError> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let outcome = joined
                .map_err(|e| HarnessError::ActorPanicked(e.to_string()))
                .and_then(|result| result);

            match outcome {
                Ok(summary) => summaries.push(summary),
                Err(e) if first_error.is_none() => {
                    error!(error = %e, "Customer failed, stopping the simulation");
                    // No receiver left just means everyone already stopped.
                    let _ = self.shutdown.send(());
                    first_error = Some(e);
                }
                Err(e) => warn!(error = %e, "Additional customer failure"),
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        info!(customers = summaries.len(), "All customers stopped");

        Ok(CompletedSimulation {
            config: self.config,
            ledger: self.ledger,
            summaries,
        })
    }

    /// Wait for completion, then verify.
    ///
    /// # Errors
    ///
    /// Any error from [`RunningSimulation::await_completion`] or [`verify`].
    pub async fn finish(self) -> Result<VerificationReport, HarnessError> {
        self.await_completion().await?.verify().await
    }
}

/// A simulation whose customers have all stopped and drained their inboxes.
pub struct CompletedSimulation {
    config: SimulationConfig,
    ledger: Arc<dyn Ledger>,
    summaries: Vec<CustomerSummary>,
}

impl CompletedSimulation {
    /// End state of every customer, in id order.
    #[must_use]
    pub fn summaries(&self) -> &[CustomerSummary] {
        &self.summaries
    }

    /// Money handed out at setup.
    #[must_use]
    pub const fn expected_total(&self) -> Money {
        Money::new(self.config.expected_total())
    }

    /// Check the mirror and conservation laws against the store.
    ///
    /// # Errors
    ///
    /// Any error from [`verify`].
    pub async fn verify(&self) -> Result<VerificationReport, HarnessError> {
        verify(self.ledger.as_ref(), &self.summaries, self.expected_total()).await
    }
}
