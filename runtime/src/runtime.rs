//! Command execution against event-sourced aggregates.
//!
//! [`AggregateRuntime`] owns the load/decide/append cycle for one
//! aggregate type:
//!
//! 1. Load the stream and fold every event into fresh state.
//! 2. Absorb the command if its ID was already seen in the log.
//! 3. Run the pure handler to produce new events (or a rejection).
//! 4. Append conditionally on the loaded version; a lost race reloads
//!    and re-runs the whole cycle under a bounded retry policy.
//!
//! The runtime holds no state between calls. Everything it needs is
//! rebuilt from the event log on each execution, which keeps it correct
//! across restarts and across multiple processes sharing one store.
//!
//! Processed-command tracking rides on the events themselves: each
//! committed event records the ID of the command that produced it and
//! the wall-clock time it was recorded, so replay rebuilds the
//! deduplication set without side storage. A command whose handler
//! fails, or that produces zero events, leaves no trace and will
//! re-execute if re-delivered.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use moneyrail_core::aggregate::{Aggregate, Command};
use moneyrail_core::environment::Clock;
use moneyrail_core::event::{DomainEvent, SerializedEvent};
use moneyrail_core::event_store::{EventStore, EventStoreError};
use moneyrail_core::stream::{StreamId, Version};
use tracing::debug;

use crate::dedup::{DEFAULT_WINDOW_SECS, ProcessedCommands};
use crate::error::CommandError;
use crate::metrics::AggregateMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteOutcome<E> {
    /// The command was handled; `events` were committed at `version`.
    ///
    /// `events` may be empty when the command was a valid no-op, in
    /// which case nothing was appended and `version` is unchanged.
    Applied {
        /// Events the handler produced, in commit order.
        events: Vec<E>,
        /// Stream version after the append.
        version: Version,
    },
    /// The command ID was already present in the stream; nothing ran.
    AlreadyProcessed,
}

impl<E> ExecuteOutcome<E> {
    /// Whether the command was absorbed as a duplicate.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyProcessed)
    }

    /// Committed events, empty for duplicates and no-ops.
    #[must_use]
    pub fn events(&self) -> &[E] {
        match self {
            Self::Applied { events, .. } => events,
            Self::AlreadyProcessed => &[],
        }
    }
}

/// State reconstructed from one stream.
pub struct Loaded<A: Aggregate> {
    /// Folded aggregate state.
    pub state: A::State,
    /// Version of the last event in the stream.
    pub version: Version,
    processed: ProcessedCommands,
}

impl<A: Aggregate> Loaded<A> {
    /// Whether `command_id` produced events still inside the
    /// deduplication window.
    #[must_use]
    pub fn is_processed(&self, command_id: &str) -> bool {
        self.processed.contains(command_id)
    }
}

/// Executes commands for one aggregate type against an event store.
pub struct AggregateRuntime<A: Aggregate> {
    event_store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    dedup_window: chrono::Duration,
    _aggregate: PhantomData<A>,
}

impl<A: Aggregate> Clone for AggregateRuntime<A> {
    fn clone(&self) -> Self {
        Self {
            event_store: Arc::clone(&self.event_store),
            clock: Arc::clone(&self.clock),
            retry: self.retry,
            dedup_window: self.dedup_window,
            _aggregate: PhantomData,
        }
    }
}

impl<A: Aggregate> AggregateRuntime<A> {
    /// Creates a runtime with the default retry policy and a one hour
    /// deduplication window.
    #[must_use]
    pub fn new(event_store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            event_store,
            clock,
            retry: RetryPolicy::default(),
            dedup_window: chrono::Duration::seconds(DEFAULT_WINDOW_SECS),
            _aggregate: PhantomData,
        }
    }

    /// Replaces the retry policy used for concurrency conflicts.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the deduplication window.
    #[must_use]
    pub const fn with_dedup_window(mut self, window: chrono::Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Loads and folds the stream for `entity_id`.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read or a stored event cannot be
    /// deserialized.
    pub async fn load(&self, entity_id: &str) -> Result<Loaded<A>, CommandError> {
        self.load_stream(&A::stream_id(entity_id)).await
    }

    /// Executes `command` against the aggregate it addresses.
    ///
    /// Lost concurrency races are retried with backoff up to the
    /// configured budget; any other failure is returned immediately.
    /// Duplicate commands return [`ExecuteOutcome::AlreadyProcessed`]
    /// without running the handler.
    ///
    /// # Errors
    ///
    /// - [`CommandError::Domain`] when the handler rejects the command.
    /// - [`CommandError::Conflict`] when every append attempt lost the
    ///   optimistic concurrency race.
    /// - [`CommandError::Store`] / [`CommandError::Serialization`] for
    ///   infrastructure failures.
    pub async fn execute(
        &self,
        command: &A::Command,
    ) -> Result<ExecuteOutcome<A::Event>, CommandError> {
        let started = Instant::now();
        let stream_id = A::stream_id(command.entity_id());

        let result = retry_with_predicate(
            &self.retry,
            || self.attempt(&stream_id, command),
            |error: &CommandError| {
                matches!(
                    error,
                    CommandError::Store(EventStoreError::ConcurrencyConflict { .. })
                )
            },
        )
        .await;

        AggregateMetrics::record_executed(A::AGGREGATE_TYPE, started.elapsed());

        match result {
            Err(CommandError::Store(EventStoreError::ConcurrencyConflict {
                stream_id, ..
            })) => Err(CommandError::Conflict {
                stream_id,
                attempts: self.retry.max_retries + 1,
            }),
            other => other,
        }
    }

    /// One load/decide/append cycle.
    async fn attempt(
        &self,
        stream_id: &StreamId,
        command: &A::Command,
    ) -> Result<ExecuteOutcome<A::Event>, CommandError> {
        let loaded = self.load_stream(stream_id).await?;

        if loaded.processed.contains(command.command_id()) {
            AggregateMetrics::record_duplicate(A::AGGREGATE_TYPE);
            debug!(
                command_id = command.command_id(),
                %stream_id,
                "Duplicate command absorbed"
            );
            return Ok(ExecuteOutcome::AlreadyProcessed);
        }

        let events = A::handle(&loaded.state, command)?;
        if events.is_empty() {
            return Ok(ExecuteOutcome::Applied {
                events: Vec::new(),
                version: loaded.version,
            });
        }

        let metadata = serde_json::json!({
            "commandId": command.command_id(),
            "recordedAt": self.clock.now().to_rfc3339(),
        });
        let mut serialized = Vec::with_capacity(events.len());
        for event in &events {
            serialized.push(SerializedEvent::from_event(event, Some(metadata.clone()))?);
        }

        match self
            .event_store
            .append_events(stream_id.clone(), Some(loaded.version), serialized)
            .await
        {
            Ok(version) => {
                debug!(
                    %stream_id,
                    %version,
                    count = events.len(),
                    command_id = command.command_id(),
                    correlation_id = command.correlation_id(),
                    "Events committed"
                );
                Ok(ExecuteOutcome::Applied {
                    events: events.into_vec(),
                    version,
                })
            }
            Err(conflict @ EventStoreError::ConcurrencyConflict { .. }) => {
                AggregateMetrics::record_conflict(A::AGGREGATE_TYPE);
                Err(CommandError::Store(conflict))
            }
            Err(other) => Err(CommandError::Store(other)),
        }
    }

    async fn load_stream(&self, stream_id: &StreamId) -> Result<Loaded<A>, CommandError> {
        let records = self.event_store.load_events(stream_id.clone(), None).await?;
        let now = self.clock.now();

        let mut state = A::initial_state();
        let mut version = Version::INITIAL;
        let mut processed = ProcessedCommands::new(self.dedup_window);

        for record in &records {
            let event = A::Event::from_bytes(&record.data)?;
            processed.observe(event.command_id(), recorded_at(record, now));
            A::apply(&mut state, &event);
            version = version.next();
        }
        processed.prune(now);

        Ok(Loaded {
            state,
            version,
            processed,
        })
    }
}

/// Commit time from event metadata, falling back to `now` for events
/// written without one.
fn recorded_at(record: &SerializedEvent, now: DateTime<Utc>) -> DateTime<Utc> {
    record
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.get("recordedAt"))
        .and_then(|value| value.as_str())
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map_or(now, |parsed| parsed.with_timezone(&Utc))
}
