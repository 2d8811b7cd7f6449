//! Prometheus metrics for a harness run.
//!
//! Counters are always recorded through the `metrics` facade; they are only
//! visible once an exporter is installed with [`MetricsExporter::install`].
//!
//! # Example
//!
//! ```rust,no_run
//! use bankstress_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = MetricsExporter::install()?;
//!
//! // ... run the simulation ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::selector::ActionKind;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Install the Prometheus recorder as the global `metrics` recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the recorder cannot be installed.
    /// A recorder that is already installed (common in tests) is not an
    /// error; [`MetricsExporter::render`] then returns `None`.
    pub fn install() -> Result<Self, MetricsError> {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                register_metrics();
                tracing::info!("Prometheus metrics recorder installed");
                Ok(Self {
                    handle: Some(handle),
                })
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(Self { handle: None })
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Install the Prometheus recorder and serve `/metrics` on `addr`.
    ///
    /// Must be called from within a tokio runtime. The returned exporter
    /// cannot render locally; scrape `addr` instead.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the listener cannot be bound or a
    /// recorder is already installed.
    pub fn serve(addr: SocketAddr) -> Result<Self, MetricsError> {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        register_metrics();

        tracing::info!(%addr, "Prometheus metrics endpoint listening");
        Ok(Self { handle: None })
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Describe every metric to the installed recorder.
fn register_metrics() {
    describe_counter!(
        "bank_actions_total",
        "Ledger actions committed by customers, labelled by kind"
    );
    describe_counter!(
        "bank_noops_total",
        "Ticks whose chosen action drew a zero amount, labelled by kind"
    );
    describe_counter!(
        "bank_busy_ticks_total",
        "Ticks skipped because the customer was still acting"
    );
    describe_counter!(
        "bank_credits_received_total",
        "Transfer credits consumed from customer inboxes"
    );
    describe_counter!(
        "bank_credits_undelivered_total",
        "Committed transfer credits whose recipient had already failed"
    );
    describe_counter!(
        "bank_ledger_errors_total",
        "Ledger calls that failed inside a customer"
    );
    describe_gauge!("bank_active_customers", "Customers still running their rounds");
}

/// Customer actor metrics recorder.
pub struct CustomerMetrics;

impl CustomerMetrics {
    /// Record a committed action.
    pub fn record_action(kind: ActionKind) {
        counter!("bank_actions_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record an action that drew a zero amount.
    pub fn record_noop(kind: ActionKind) {
        counter!("bank_noops_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record a tick skipped by the busy guard.
    pub fn record_busy_tick() {
        counter!("bank_busy_ticks_total").increment(1);
    }

    /// Record a consumed inbox credit.
    pub fn record_credit() {
        counter!("bank_credits_received_total").increment(1);
    }

    /// Record a credit that could not be handed off.
    pub fn record_undelivered() {
        counter!("bank_credits_undelivered_total").increment(1);
    }

    /// Record a failed ledger call.
    pub fn record_ledger_error(kind: ActionKind) {
        counter!("bank_ledger_errors_total", "kind" => kind.as_str()).increment(1);
    }

    /// A customer started its rounds.
    pub fn customer_started() {
        gauge!("bank_active_customers").increment(1.0);
    }

    /// A customer finished its rounds (or failed).
    pub fn customer_stopped() {
        gauge!("bank_active_customers").decrement(1.0);
    }
}
