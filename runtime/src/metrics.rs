//! Prometheus metrics for the inventory and reservation services.
//!
//! - Seat operations on the Inventory Authority, labelled by operation and outcome
//! - Lock wait time
//! - Reservation saga steps and compensations
//!
//! # Example
//!
//! ```rust,no_run
//! use boxoffice_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Expose `server.render()` on a `/metrics` route.
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

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

/// Prometheus recorder plus the address it is advertised on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder that is already installed (another server in the same test binary)
    /// is tolerated: the call logs a warning and leaves [`MetricsServer::handle`] empty.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address metrics are advertised on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "inventory_seat_operations_total",
        "Seat operations on the inventory authority, by operation and outcome"
    );
    describe_histogram!(
        "inventory_lock_wait_seconds",
        "Time spent waiting for an event lock"
    );
    describe_counter!(
        "reservation_saga_total",
        "Reservation saga steps, by step and outcome"
    );
    describe_counter!(
        "reservation_compensations_total",
        "Compensating seat rollbacks, by phase and outcome"
    );
}

/// Inventory Authority metrics recorder.
pub struct InventoryMetrics;

impl InventoryMetrics {
    /// Record a seat operation (`reserve`, `rollback`, `update`, `delete`) and its outcome.
    pub fn record_operation(operation: &'static str, outcome: &'static str) {
        counter!(
            "inventory_seat_operations_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Record how long an acquire waited, whether or not it succeeded.
    pub fn record_lock_wait(waited: Duration) {
        histogram!("inventory_lock_wait_seconds").record(waited.as_secs_f64());
    }
}

/// Reservation saga metrics recorder.
pub struct SagaMetrics;

impl SagaMetrics {
    /// Record a saga step (`create`, `cancel`, `confirm`) and its outcome.
    pub fn record_step(step: &'static str, outcome: &'static str) {
        counter!("reservation_saga_total", "step" => step, "outcome" => outcome).increment(1);
    }

    /// Record a compensating rollback issued during `phase` (`create`, `cancel`).
    pub fn record_compensation(phase: &'static str, outcome: &'static str) {
        counter!(
            "reservation_compensations_total",
            "phase" => phase,
            "outcome" => outcome
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:9090".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[test]
    fn test_start_and_record() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.start().is_ok());

        InventoryMetrics::record_operation("reserve", "applied");
        InventoryMetrics::record_lock_wait(Duration::from_millis(3));
        SagaMetrics::record_step("create", "succeeded");
        SagaMetrics::record_compensation("create", "applied");

        if let Some(rendered) = server.render() {
            assert!(rendered.contains("inventory_seat_operations_total"));
            assert!(rendered.contains("reservation_saga_total"));
        }
    }
}
