//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the transfer pipeline:
//! - Command execution (executed, duplicates, conflicts, latency)
//! - Integration event publishing
//! - Saga job completion
//!
//! # Example
//!
//! ```rust,no_run
//! use moneyrail_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
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

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// The scrape endpoint itself is served by the binary, which renders
    /// [`MetricsServer::render`] on `/metrics`.
    ///
    /// # Errors
    ///
    /// Returns error if the metrics exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), the call
    /// succeeds without replacing it. In production, ensure this is only
    /// called once.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        // Try to install the recorder
        // In tests, this may fail if a recorder is already installed
        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
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
fn register_metrics() {
    // Aggregate Runtime Metrics
    describe_counter!(
        "aggregate_commands_executed_total",
        "Total number of commands executed against aggregates"
    );
    describe_counter!(
        "aggregate_commands_duplicate_total",
        "Total number of commands absorbed as duplicates"
    );
    describe_counter!(
        "aggregate_append_conflicts_total",
        "Total number of optimistic concurrency conflicts on append"
    );
    describe_histogram!(
        "command_execution_duration_seconds",
        "Time taken to execute a command, including retries"
    );

    // Integration Event Publishing Metrics
    describe_counter!(
        "integration_events_published_total",
        "Total number of integration events published to the event bus"
    );
    describe_counter!(
        "integration_event_publish_failures_total",
        "Total number of integration events that could not be published"
    );
    describe_histogram!(
        "event_publish_duration_seconds",
        "Time taken to publish an integration event"
    );

    // Saga Worker Metrics
    describe_counter!(
        "saga_jobs_completed_total",
        "Total number of saga jobs completed successfully"
    );
    describe_counter!(
        "saga_jobs_failed_total",
        "Total number of saga jobs that failed"
    );
}

/// Aggregate runtime metrics recorder.
pub struct AggregateMetrics;

impl AggregateMetrics {
    /// Record a command execution, successful or not.
    pub fn record_executed(aggregate: &'static str, duration: Duration) {
        counter!("aggregate_commands_executed_total", "aggregate" => aggregate).increment(1);
        histogram!("command_execution_duration_seconds", "aggregate" => aggregate)
            .record(duration.as_secs_f64());
    }

    /// Record a command absorbed as a duplicate.
    pub fn record_duplicate(aggregate: &'static str) {
        counter!("aggregate_commands_duplicate_total", "aggregate" => aggregate).increment(1);
    }

    /// Record a lost optimistic concurrency race.
    pub fn record_conflict(aggregate: &'static str) {
        counter!("aggregate_append_conflicts_total", "aggregate" => aggregate).increment(1);
    }
}

/// Integration event publishing metrics recorder.
pub struct PublisherMetrics;

impl PublisherMetrics {
    /// Record a successful publish.
    pub fn record_published(topic: &str, duration: Duration) {
        counter!("integration_events_published_total", "topic" => topic.to_string()).increment(1);
        histogram!("event_publish_duration_seconds", "topic" => topic.to_string())
            .record(duration.as_secs_f64());
    }

    /// Record a failed publish.
    pub fn record_failure(topic: &str) {
        counter!("integration_event_publish_failures_total", "topic" => topic.to_string())
            .increment(1);
    }
}

/// Saga worker metrics recorder.
pub struct SagaMetrics;

impl SagaMetrics {
    /// Record a completed job.
    pub fn record_completed(job_type: &str) {
        counter!("saga_jobs_completed_total", "job_type" => job_type.to_string()).increment(1);
    }

    /// Record a failed job.
    pub fn record_failed(job_type: &str) {
        counter!("saga_jobs_failed_total", "job_type" => job_type.to_string()).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn local_addr() -> SocketAddr {
        "127.0.0.1:0".parse().expect("valid socket address")
    }

    #[tokio::test]
    async fn test_metrics_server_creation() {
        let server = MetricsServer::new(local_addr());
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[tokio::test]
    async fn test_metrics_server_start() {
        let mut server = MetricsServer::new(local_addr());

        let result = server.start();
        assert!(result.is_ok());
        // Note: handle might be None if another test already initialized the recorder
        // This is OK - the recorder is still installed globally
    }

    #[tokio::test]
    async fn test_aggregate_metrics_render() {
        let mut server = MetricsServer::new(local_addr());
        server.start().expect("metrics server starts");

        AggregateMetrics::record_executed("account", Duration::from_millis(5));
        AggregateMetrics::record_duplicate("account");
        AggregateMetrics::record_conflict("ledger");

        // If this test runs after another test initialized the recorder,
        // handle might be None. That's OK - metrics are still being recorded.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("aggregate_commands_executed_total"));
            assert!(rendered.contains("aggregate_commands_duplicate_total"));
            assert!(rendered.contains("aggregate_append_conflicts_total"));
        }
    }

    #[tokio::test]
    async fn test_publisher_and_saga_metrics_render() {
        let mut server = MetricsServer::new(local_addr());
        server.start().expect("metrics server starts");

        PublisherMetrics::record_published("account.events.v1", Duration::from_millis(2));
        PublisherMetrics::record_failure("ledger.events.v1");
        SagaMetrics::record_completed("orchestration.account.debit");
        SagaMetrics::record_failed("orchestration.ledger.book");

        if let Some(rendered) = server.render() {
            assert!(rendered.contains("integration_events_published_total"));
            assert!(rendered.contains("integration_event_publish_failures_total"));
            assert!(rendered.contains("saga_jobs_completed_total"));
            assert!(rendered.contains("saga_jobs_failed_total"));
        }
    }
}
