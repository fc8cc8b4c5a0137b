//! Command router: the single entry point for transfer commands.
//!
//! The router owns one [`AggregateRuntime`] per aggregate type and an
//! explicit variant dispatch over [`TransferCommand`]: adding an
//! aggregate means adding a variant and a match arm, and the compiler
//! checks exhaustiveness at build time.
//!
//! Two responsibilities sit here and nowhere else:
//!
//! - **Per-stream serialization.** Dispatches against the same stream
//!   run one at a time through a per-stream slot, so concurrent
//!   commands against one account decide against fresh state instead
//!   of burning optimistic retries. The optimistic check in the store
//!   stays on as the correctness backstop.
//! - **Post-commit publication.** Every freshly committed event is
//!   handed to the event bus exactly once, keyed by the aggregate id.
//!   Publish failures are logged and counted, never retried here, and
//!   never fail the dispatch; the log has already committed.

use crate::aggregates::{AccountAggregate, BookLedger, DebitAccount, LedgerAggregate};
use moneyrail_core::aggregate::{Aggregate, Command};
use moneyrail_core::environment::Clock;
use moneyrail_core::event::{DomainEvent, SerializedEvent};
use moneyrail_core::event_bus::{EventBus, topic_for_aggregate};
use moneyrail_core::event_store::EventStore;
use moneyrail_core::stream::StreamId;
use moneyrail_runtime::{
    AggregateRuntime, CommandError, ExecuteOutcome, PublisherMetrics, RetryPolicy,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error};

/// Every command the transfer service accepts, as an explicit tagged
/// union dispatched by `match`.
#[derive(Debug, Clone)]
pub enum TransferCommand {
    /// Debit an account (first saga step).
    DebitAccount(DebitAccount),
    /// Book a completed debit into the ledger (second saga step).
    BookLedger(BookLedger),
}

impl From<DebitAccount> for TransferCommand {
    fn from(command: DebitAccount) -> Self {
        Self::DebitAccount(command)
    }
}

impl From<BookLedger> for TransferCommand {
    fn from(command: BookLedger) -> Self {
        Self::BookLedger(command)
    }
}

/// What one dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The command was a re-delivery and was absorbed without effect.
    pub duplicate: bool,
    /// Number of events committed to the store.
    pub committed: usize,
    /// Number of committed events successfully handed to the bus.
    pub published: usize,
}

/// Routes transfer commands to their aggregate runtime and publishes
/// committed events.
pub struct CommandRouter {
    accounts: AggregateRuntime<AccountAggregate>,
    ledgers: AggregateRuntime<LedgerAggregate>,
    event_bus: Arc<dyn EventBus>,
    stream_locks: Mutex<HashMap<StreamId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CommandRouter {
    /// Create a router over a store, a bus, and a clock.
    #[must_use]
    pub fn new(
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts: AggregateRuntime::new(Arc::clone(&event_store), Arc::clone(&clock)),
            ledgers: AggregateRuntime::new(event_store, clock),
            event_bus,
            stream_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the append retry policy on both runtimes.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.accounts = self.accounts.with_retry_policy(retry);
        self.ledgers = self.ledgers.with_retry_policy(retry);
        self
    }

    /// Replace the duplicate-command window on both runtimes.
    #[must_use]
    pub fn with_dedup_window(mut self, window: chrono::Duration) -> Self {
        self.accounts = self.accounts.with_dedup_window(window);
        self.ledgers = self.ledgers.with_dedup_window(window);
        self
    }

    /// Execute one command and publish whatever it committed.
    ///
    /// # Errors
    ///
    /// Returns the [`CommandError`] of the underlying execution; a
    /// failed publish is not an error here.
    pub async fn dispatch(&self, command: TransferCommand) -> Result<DispatchOutcome, CommandError> {
        match command {
            TransferCommand::DebitAccount(command) => self.run(&self.accounts, &command).await,
            TransferCommand::BookLedger(command) => self.run(&self.ledgers, &command).await,
        }
    }

    async fn run<A: Aggregate>(
        &self,
        runtime: &AggregateRuntime<A>,
        command: &A::Command,
    ) -> Result<DispatchOutcome, CommandError> {
        let stream_id = A::stream_id(command.entity_id());
        let slot = self.execution_slot(&stream_id);
        let _guard = slot.lock().await;

        match runtime.execute(command).await? {
            ExecuteOutcome::AlreadyProcessed => Ok(DispatchOutcome {
                duplicate: true,
                committed: 0,
                published: 0,
            }),
            ExecuteOutcome::Applied { events, .. } => {
                let topic = topic_for_aggregate(A::AGGREGATE_TYPE);
                let mut published = 0;
                for event in &events {
                    if self.publish(&topic, event).await {
                        published += 1;
                    }
                }

                Ok(DispatchOutcome {
                    duplicate: false,
                    committed: events.len(),
                    published,
                })
            }
        }
    }

    async fn publish<E>(&self, topic: &str, event: &E) -> bool
    where
        E: DomainEvent + Serialize,
    {
        let envelope = match SerializedEvent::wire_from_event(event) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(topic, error = %err, "Failed to encode event for publication");
                PublisherMetrics::record_failure(topic);
                return false;
            }
        };

        let started = Instant::now();
        match self
            .event_bus
            .publish(topic, event.partition_key(), &envelope)
            .await
        {
            Ok(()) => {
                PublisherMetrics::record_published(topic, started.elapsed());
                debug!(topic, key = event.partition_key(), "Event published");
                true
            }
            Err(err) => {
                error!(topic, error = %err, "Failed to publish committed event");
                PublisherMetrics::record_failure(topic);
                false
            }
        }
    }

    /// Slot serializing dispatches for one stream.
    ///
    /// One slot per stream, kept for the stream's lifetime.
    fn execution_slot(&self, stream_id: &StreamId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .stream_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        Arc::clone(
            locks
                .entry(stream_id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}
