//! Customer actor.
//!
//! Each customer owns one account's in-memory mirror: the cash in its wallet
//! and the balance it believes the bank holds for it. It runs a private
//! control loop that, one event at a time, either
//!
//! - consumes a credit from its inbox (a peer transferred money to it), or
//! - fires a timed action: deposit, withdraw or transfer.
//!
//! # State machine
//!
//! ```text
//!            tick                      action done
//!   Idle ───────────────► Acting ────────────────► Idle
//!    │
//!    │ round limit reached / stop signal
//!    ▼
//!  Stopped ── drain inbox until every peer is gone ──► summary
//! ```
//!
//! # Hand-off
//!
//! After a transfer commits, the sender pushes the amount into the
//! recipient's inbox. Inboxes hold a single message, so a sender can only run
//! one credit ahead of a slow recipient. While a sender waits for room it
//! keeps consuming its own inbox, so two customers paying each other at the
//! same time cannot wait on each other forever.

use crate::metrics::CustomerMetrics;
use crate::selector::{ActionKind, ActionSelector, Plan};
use bankstress_core::{AccountId, HarnessError, Ledger, LedgerError, Money, SimulationConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Capacity of a customer inbox.
pub const INBOX_CAPACITY: usize = 1;

/// Sending half of a customer inbox.
pub type InboxSender = mpsc::Sender<Money>;

/// Lifecycle phase of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerPhase {
    /// Waiting for the next tick or credit.
    Idle,
    /// Executing its own action.
    Acting,
    /// Round limit reached; no further actions.
    Stopped,
}

/// Counters kept by one customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerStats {
    /// Ticks handled (including idle and busy ones).
    pub rounds: u32,
    /// Committed deposits.
    pub deposits: u32,
    /// Committed withdrawals.
    pub withdrawals: u32,
    /// Committed outgoing transfers.
    pub transfers_sent: u32,
    /// Credits consumed from the inbox.
    pub credits_received: u32,
    /// Actions that drew a zero amount.
    pub noops: u32,
    /// Credits that could not be handed to a failed peer.
    pub undelivered: u32,
}

/// Final state of a customer after it stopped and drained its inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSummary {
    /// Account id.
    pub id: AccountId,
    /// Cash outside the bank.
    pub wallet: Money,
    /// Balance the customer believes the bank holds.
    pub believed_balance: Money,
    /// Activity counters.
    pub stats: CustomerStats,
}

impl CustomerSummary {
    /// Wallet plus believed balance.
    #[must_use]
    pub fn net_worth(&self) -> Money {
        self.wallet + self.believed_balance
    }
}

/// A peer this customer can transfer money to.
#[derive(Debug, Clone)]
struct Friend {
    id: AccountId,
    inbox: InboxSender,
}

/// One simulated bank customer.
pub struct Customer {
    id: AccountId,
    wallet: Money,
    believed_balance: Money,
    friends: Vec<Friend>,
    inbox: mpsc::Receiver<Money>,
    busy: bool,
    phase: CustomerPhase,
    ledger: Arc<dyn Ledger>,
    selector: ActionSelector,
    tick_interval: Duration,
    rounds: u32,
    stats: CustomerStats,
}

impl std::fmt::Debug for Customer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Customer")
            .field("id", &self.id)
            .field("wallet", &self.wallet)
            .field("believed_balance", &self.believed_balance)
            .field("friends", &self.friends.len())
            .field("phase", &self.phase)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Customer {
    /// Create a customer and the sending half of its inbox.
    ///
    /// The customer starts `Idle` with `config.initial_wallet` in its wallet
    /// and a believed balance of zero.
    #[must_use]
    pub fn new(
        id: AccountId,
        ledger: Arc<dyn Ledger>,
        selector: ActionSelector,
        config: &SimulationConfig,
    ) -> (Self, InboxSender) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let customer = Self {
            id,
            wallet: Money::new(config.initial_wallet),
            believed_balance: Money::ZERO,
            friends: Vec::new(),
            inbox: rx,
            busy: false,
            phase: CustomerPhase::Idle,
            ledger,
            selector,
            tick_interval: config.tick_interval,
            rounds: config.rounds,
            stats: CustomerStats::default(),
        };
        (customer, tx)
    }

    /// Make `id` a friend reachable through `inbox`.
    pub fn add_friend(&mut self, id: AccountId, inbox: InboxSender) {
        self.friends.push(Friend { id, inbox });
    }

    /// Account id.
    #[must_use]
    pub const fn id(&self) -> &AccountId {
        &self.id
    }

    /// Cash outside the bank.
    #[must_use]
    pub const fn wallet(&self) -> Money {
        self.wallet
    }

    /// Balance the customer believes the bank holds.
    #[must_use]
    pub const fn believed_balance(&self) -> Money {
        self.believed_balance
    }

    /// Ids of every friend, in friend-list order.
    #[must_use]
    pub fn friend_ids(&self) -> Vec<AccountId> {
        self.friends.iter().map(|f| f.id.clone()).collect()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> CustomerPhase {
        self.phase
    }

    /// Activity counters so far.
    #[must_use]
    pub const fn stats(&self) -> CustomerStats {
        self.stats
    }

    /// Run the control loop until the round limit, a stop signal, or a
    /// ledger failure.
    ///
    /// After stopping the customer drops its friend handles and keeps
    /// consuming credits until every peer has done the same, so the returned
    /// summary includes every transfer made to it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Store`] if a ledger call fails. The customer
    /// stops immediately; its inbox is dropped with it.
    pub async fn run(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<CustomerSummary, HarnessError> {
        info!(customer = %self.id, rounds = self.rounds, "Customer started");
        CustomerMetrics::customer_started();

        let result = self.control_loop(&mut shutdown).await;
        CustomerMetrics::customer_stopped();

        if let Err(e) = result {
            error!(customer = %self.id, error = %e, "Customer failed");
            return Err(e);
        }

        self.drain().await;
        info!(
            customer = %self.id,
            wallet = %self.wallet,
            balance = %self.believed_balance,
            stats = ?self.stats,
            "Customer quit"
        );
        Ok(self.summary())
    }

    async fn control_loop(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), HarnessError> {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(amount) = self.inbox.recv() => self.receive(amount),
                _ = ticker.tick() => {
                    if self.stats.rounds >= self.rounds {
                        self.phase = CustomerPhase::Stopped;
                        return Ok(());
                    }
                    self.stats.rounds += 1;
                    debug!(customer = %self.id, round = self.stats.rounds, "Round");
                    self.on_tick().await?;
                }
                Ok(()) = shutdown.recv() => {
                    warn!(customer = %self.id, round = self.stats.rounds, "Customer received stop signal");
                    self.phase = CustomerPhase::Stopped;
                    return Ok(());
                }
            }
        }
    }

    /// Handle one tick: act unless an action is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Store`] if the ledger call fails.
    pub async fn on_tick(&mut self) -> Result<(), HarnessError> {
        if self.busy {
            trace!(customer = %self.id, "Still acting, tick ignored");
            CustomerMetrics::record_busy_tick();
            return Ok(());
        }

        self.busy = true;
        self.phase = CustomerPhase::Acting;
        let plan = self
            .selector
            .plan(self.wallet, self.believed_balance, self.friends.len());
        let result = self.apply(plan).await;
        self.busy = false;
        self.phase = CustomerPhase::Idle;
        result
    }

    /// Execute a decided action against the ledger and update the mirror.
    ///
    /// The wallet and believed balance change only after the ledger call
    /// commits. For a transfer the recipient is notified after the sender's
    /// own balance was updated.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Store`] if the ledger call fails; the mirror is
    /// left untouched in that case.
    pub async fn apply(&mut self, plan: Plan) -> Result<(), HarnessError> {
        match plan {
            Plan::Idle(kind) => {
                trace!(customer = %self.id, action = %kind, "Drew zero, nothing to do");
                self.stats.noops += 1;
                CustomerMetrics::record_noop(kind);
            }
            Plan::Deposit(amount) => {
                let result = self.ledger.deposit(&self.id, amount).await;
                self.check(ActionKind::Deposit, result)?;
                self.wallet -= amount;
                self.believed_balance += amount;
                self.stats.deposits += 1;
                debug!(customer = %self.id, amount = %amount, "Deposited");
            }
            Plan::Withdraw(amount) => {
                let result = self.ledger.withdraw(&self.id, amount).await;
                self.check(ActionKind::Withdraw, result)?;
                self.wallet += amount;
                self.believed_balance -= amount;
                self.stats.withdrawals += 1;
                debug!(customer = %self.id, amount = %amount, "Withdrew");
            }
            Plan::Transfer { friend, amount } => {
                let Some(to) = self.friends.get(friend).cloned() else {
                    return Err(HarnessError::Store {
                        customer: self.id.clone(),
                        source: LedgerError::Execute(format!("no friend at index {friend}")),
                    });
                };
                let result = self.ledger.transfer(&self.id, &to.id, amount).await;
                self.check(ActionKind::Transfer, result)?;
                self.believed_balance -= amount;
                self.stats.transfers_sent += 1;
                debug!(customer = %self.id, to = %to.id, amount = %amount, "Transferred");
                self.hand_off(&to, amount).await;
            }
        }
        if let Some(kind) = committed_kind(plan) {
            CustomerMetrics::record_action(kind);
        }
        Ok(())
    }

    fn check(&self, kind: ActionKind, result: Result<(), LedgerError>) -> Result<(), HarnessError> {
        result.map_err(|source| {
            CustomerMetrics::record_ledger_error(kind);
            error!(customer = %self.id, action = %kind, error = %source, "Ledger call failed");
            HarnessError::Store {
                customer: self.id.clone(),
                source,
            }
        })
    }

    /// Push a committed credit into a friend's inbox.
    async fn hand_off(&mut self, friend: &Friend, amount: Money) {
        loop {
            tokio::select! {
                permit = friend.inbox.reserve() => {
                    match permit {
                        Ok(permit) => permit.send(amount),
                        Err(_) => {
                            warn!(
                                customer = %self.id,
                                to = %friend.id,
                                amount = %amount,
                                "Recipient is gone, credit not delivered"
                            );
                            self.stats.undelivered += 1;
                            CustomerMetrics::record_undelivered();
                        }
                    }
                    return;
                }
                Some(credit) = self.inbox.recv() => self.receive(credit),
            }
        }
    }

    /// Consume one credit notification.
    pub fn receive(&mut self, amount: Money) {
        self.believed_balance += amount;
        self.stats.credits_received += 1;
        CustomerMetrics::record_credit();
        trace!(customer = %self.id, amount = %amount, "Received credit");
    }

    /// Drop every friend handle, then consume credits until all peers have
    /// dropped theirs.
    async fn drain(&mut self) {
        self.phase = CustomerPhase::Stopped;
        self.friends.clear();
        while let Some(amount) = self.inbox.recv().await {
            self.receive(amount);
        }
    }

    fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            id: self.id.clone(),
            wallet: self.wallet,
            believed_balance: self.believed_balance,
            stats: self.stats,
        }
    }
}

const fn committed_kind(plan: Plan) -> Option<ActionKind> {
    match plan {
        Plan::Idle(_) => None,
        Plan::Deposit(_) => Some(ActionKind::Deposit),
        Plan::Withdraw(_) => Some(ActionKind::Withdraw),
        Plan::Transfer { .. } => Some(ActionKind::Transfer),
    }
}
