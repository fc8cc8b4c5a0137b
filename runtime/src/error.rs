//! Errors surfaced by command execution.
//!
//! [`CommandError`] separates domain rejections (the command asked for
//! something the current state forbids) from infrastructure failures
//! (storage errors, lost concurrency races). Callers branch on this
//! distinction: domain rejections are permanent and must not be retried,
//! while transient failures are safe to retry because failed commands
//! leave no trace in the event log.

use moneyrail_core::aggregate::DomainError;
use moneyrail_core::event::EventError;
use moneyrail_core::event_store::EventStoreError;
use moneyrail_core::stream::StreamId;
use thiserror::Error;

/// Error returned by [`AggregateRuntime::execute`](crate::runtime::AggregateRuntime::execute).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command was rejected by the aggregate's business rules.
    ///
    /// Retrying without changing the command or the underlying state
    /// will fail again with the same error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Every append attempt lost the optimistic concurrency race.
    ///
    /// The retry budget is exhausted; the caller may re-dispatch the
    /// whole command, which is safe because nothing was persisted.
    #[error("Concurrency conflict on {stream_id} persisted after {attempts} attempts")]
    Conflict {
        /// Stream the command was writing to.
        stream_id: StreamId,
        /// Total number of append attempts made.
        attempts: usize,
    },

    /// The event store failed to load or append.
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// An event could not be serialized for storage or replayed from it.
    #[error(transparent)]
    Serialization(#[from] EventError),
}

impl CommandError {
    /// Whether re-dispatching the same command could plausibly succeed.
    ///
    /// Domain rejections and serialization failures are deterministic;
    /// storage and concurrency failures are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Store(_))
    }
}
