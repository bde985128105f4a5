//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the market:
//! - Pool admissions, sales, deferrals and rejected offers
//! - Pool levels (available, remaining supply, waiting customers)
//! - Actor spawns
//!
//! # Example
//!
//! ```rust,no_run
//! use ticket_market_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;
use ticket_market_core::ActorKind;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and start serving `/metrics`.
    ///
    /// Must be called from within a Tokio runtime; the HTTP exporter runs as
    /// a spawned task.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built (e.g. the address is
    /// already bound) or the recorder cannot be installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs
    /// a warning and returns `Ok` without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            let err_msg = e.to_string();
            if err_msg.contains("already") {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                return Ok(());
            }
            return Err(MetricsError::Install(err_msg));
        }

        let addr = self.addr;
        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!(addr = %addr, "Metrics exporter stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "ticket_pool_tickets_admitted_total",
        "Total number of tickets admitted into the pool"
    );
    describe_counter!(
        "ticket_pool_tickets_sold_total",
        "Total number of tickets sold, by path (direct or dispatch)"
    );
    describe_counter!(
        "ticket_pool_requests_deferred_total",
        "Total number of requests that left the customer waiting"
    );
    describe_counter!(
        "ticket_pool_offers_rejected_total",
        "Total number of offers that admitted nothing, by reason"
    );
    describe_gauge!(
        "ticket_pool_available",
        "Tickets currently available in the pool"
    );
    describe_gauge!(
        "ticket_pool_remaining_supply",
        "Tickets that may still be admitted during this run"
    );
    describe_gauge!(
        "ticket_pool_waiting",
        "Customers currently waiting for a ticket"
    );
    describe_counter!(
        "orchestrator_actors_spawned_total",
        "Total number of vendor and customer actors spawned"
    );
}

/// How a sale reached the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalePath {
    /// Handed back from `request`
    Direct,
    /// Delivered to a waiting customer by dispatch
    Dispatch,
}

impl SalePath {
    const fn label(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Dispatch => "dispatch",
        }
    }
}

/// Why an offer admitted nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Remaining supply is zero
    Exhausted,
    /// Pool holds `max_ticket_capacity` tickets
    AtCapacity,
}

impl RejectReason {
    const fn label(self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::AtCapacity => "at_capacity",
        }
    }
}

/// Ticket pool metrics recorder.
pub struct PoolMetrics;

impl PoolMetrics {
    /// Record admitted tickets.
    pub fn record_admitted(count: u32) {
        counter!("ticket_pool_tickets_admitted_total").increment(u64::from(count));
    }

    /// Record a sale.
    pub fn record_sale(path: SalePath) {
        counter!("ticket_pool_tickets_sold_total", "path" => path.label()).increment(1);
    }

    /// Record a request that left the customer waiting.
    pub fn record_deferred() {
        counter!("ticket_pool_requests_deferred_total").increment(1);
    }

    /// Record an offer that admitted nothing.
    pub fn record_rejected(reason: RejectReason) {
        counter!("ticket_pool_offers_rejected_total", "reason" => reason.label()).increment(1);
    }

    /// Record current pool levels.
    pub fn record_levels(available: u32, remaining: u32, waiting: u32) {
        gauge!("ticket_pool_available").set(f64::from(available));
        gauge!("ticket_pool_remaining_supply").set(f64::from(remaining));
        gauge!("ticket_pool_waiting").set(f64::from(waiting));
    }
}

/// Orchestrator metrics recorder.
pub struct ActorMetrics;

impl ActorMetrics {
    /// Record an actor spawn.
    pub fn record_spawn(kind: ActorKind) {
        counter!("orchestrator_actors_spawned_total", "kind" => kind.as_str()).increment(1);
    }
}
