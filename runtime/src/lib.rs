//! # MoneyRail Runtime
//!
//! Command execution runtime for MoneyRail aggregates.
//!
//! This crate turns the pure building blocks from `moneyrail-core` into a
//! working pipeline: it loads a stream, folds state, runs the aggregate's
//! handler, and appends the produced events under optimistic concurrency,
//! retrying lost races with backoff.
//!
//! ## Core Components
//!
//! - **`AggregateRuntime`**: the load/decide/append cycle for one aggregate type
//! - **`ProcessedCommands`**: windowed command deduplication rebuilt from the log
//! - **`RetryPolicy`**: exponential backoff for transient failures
//! - **`MetricsServer`**: Prometheus endpoint for the pipeline's metrics
//!
//! ## Example
//!
//! ```ignore
//! use moneyrail_runtime::AggregateRuntime;
//! use std::sync::Arc;
//!
//! let runtime = AggregateRuntime::<AccountAggregate>::new(event_store, clock);
//!
//! match runtime.execute(&command).await? {
//!     ExecuteOutcome::Applied { events, version } => publish(events),
//!     ExecuteOutcome::AlreadyProcessed => {} // absorbed re-delivery
//! }
//! ```

/// Bounded tracking of processed command IDs
pub mod dedup;

/// Errors surfaced by command execution
pub mod error;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Command execution against event-sourced aggregates
pub mod runtime;

pub use dedup::ProcessedCommands;
pub use error::CommandError;
pub use metrics::{AggregateMetrics, MetricsServer, PublisherMetrics, SagaMetrics};
pub use retry::{RetryPolicy, retry_with_predicate};
pub use runtime::{AggregateRuntime, ExecuteOutcome, Loaded};
