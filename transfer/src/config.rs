//! Configuration for the transfer service.
//!
//! Loads configuration from environment variables with sensible defaults.

use moneyrail_runtime::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// RedPanda/Kafka configuration
    pub redpanda: RedpandaConfig,
    /// Aggregate runtime configuration
    pub runtime: RuntimeConfig,
    /// API idempotency configuration
    pub idempotency: IdempotencyConfig,
    /// Saga engine configuration
    pub saga: SagaConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Metrics server port (for Prometheus scraping)
    pub metrics_port: u16,
}

impl ServerConfig {
    /// Bind address of the API server.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bind address of the metrics server.
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.host, self.metrics_port)
    }
}

/// RedPanda/Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Producer acknowledgement level: 0, 1, or all
    pub acks: String,
    /// Compression codec: none, gzip, snappy, lz4, zstd
    pub compression: String,
    /// Produce timeout in milliseconds
    pub timeout_ms: u64,
}

/// Aggregate runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Retries after a lost optimistic append before giving up
    pub append_retries: usize,
    /// Seconds a processed command id stays absorbing duplicates
    pub dedup_window_secs: i64,
}

impl RuntimeConfig {
    /// Retry policy for optimistic appends.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.append_retries)
            .initial_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(500))
            .build()
    }

    /// Duplicate-command window as a duration.
    #[must_use]
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_window_secs)
    }
}

/// API idempotency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Seconds a recorded response stays replayable
    pub ttl_secs: i64,
}

impl IdempotencyConfig {
    /// Response retention as a duration.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs)
    }
}

/// Saga engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaConfig {
    /// Process definition id started per transfer
    pub process_id: String,
    /// Attempt budget per saga step before an incident
    pub step_attempts: usize,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                metrics_port: env::var("METRICS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(9090),
            },
            redpanda: RedpandaConfig {
                brokers: env::var("REDPANDA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                acks: env::var("REDPANDA_ACKS").unwrap_or_else(|_| "1".to_string()),
                compression: env::var("REDPANDA_COMPRESSION")
                    .unwrap_or_else(|_| "none".to_string()),
                timeout_ms: env::var("REDPANDA_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            },
            runtime: RuntimeConfig {
                append_retries: env::var("APPEND_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
                dedup_window_secs: env::var("DEDUP_WINDOW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            },
            idempotency: IdempotencyConfig {
                ttl_secs: env::var("IDEMPOTENCY_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86_400),
            },
            saga: SagaConfig {
                process_id: env::var("PROCESS_ID")
                    .unwrap_or_else(|_| "MoneyTransferProcess".to_string()),
                step_attempts: env::var("STEP_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_specific_defaults_hold() {
        let config = Config::from_env();

        assert_eq!(config.saga.process_id, "MoneyTransferProcess");
        assert_eq!(config.saga.step_attempts, 3);
        assert_eq!(config.runtime.append_retries, 5);
        assert_eq!(config.runtime.dedup_window_secs, 3600);
        assert_eq!(config.idempotency.ttl_secs, 86_400);
        assert_eq!(config.redpanda.acks, "1");
        assert_eq!(config.redpanda.compression, "none");
    }

    #[test]
    fn addresses_join_host_and_port() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            metrics_port: 9090,
        };

        assert_eq!(server.bind_addr(), "127.0.0.1:8080");
        assert_eq!(server.metrics_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn durations_derive_from_seconds() {
        let runtime = RuntimeConfig {
            append_retries: 5,
            dedup_window_secs: 60,
        };
        let idempotency = IdempotencyConfig { ttl_secs: 120 };

        assert_eq!(runtime.dedup_window(), chrono::Duration::seconds(60));
        assert_eq!(idempotency.ttl(), chrono::Duration::seconds(120));
        assert_eq!(runtime.retry_policy().max_retries, 5);
    }
}
