//! Event bus abstraction for integration event publishing.
//!
//! This module provides the [`EventBus`] trait for publishing committed
//! domain events to downstream consumers. Events flow from the event
//! store (source of truth) to the bus strictly after commit, so the bus
//! never carries an event the log does not.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Command   │
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ Aggregate       │
//! │ handler         │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 1. Append to    │
//! │    event store  │◄─── Source of truth
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Publish to   │
//! │    event bus    │◄─── At-least-once, best effort
//! └─────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Store first**: events are committed to the log before publishing
//! - **At-least-once**: a retried command can republish the same event
//! - **Keyed partitioning**: events carry the aggregate identifier as
//!   partition key, so one aggregate's events stay in order
//! - **Publish failure is not command failure**: the log has already
//!   committed; a failed publish is reported through the error, logged
//!   and counted by the caller, and never rolls anything back
//!
//! # Topic Naming Convention
//!
//! Topics follow the pattern `{aggregate-type}.events.v1`:
//! - `account.events.v1` - events from account aggregates
//! - `ledger.events.v1` - events from ledger aggregates

use crate::event::SerializedEvent;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Generic error for other failures
    #[error("Event bus error: {0}")]
    Other(String),
}

/// Trait for event bus implementations.
///
/// The [`EventBus`] trait is the integration seam between the
/// event-sourced core and downstream consumers. Implementations publish
/// with at-least-once semantics; consumers deduplicate on the
/// `commandId` carried in each event's wire payload.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the command router holds
/// the bus behind an `Arc` and publishes from concurrent dispatches.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn EventBus>`).
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic, keyed by the aggregate identifier.
    ///
    /// The key selects the partition, so all events of one aggregate
    /// are delivered in commit order. Delivery is at-least-once; a
    /// command retry after a lost acknowledgement republishes the same
    /// event with the same `commandId`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish fails.
    /// The caller logs and counts the failure; the committed event
    /// stays committed either way.
    fn publish(
        &self,
        topic: &str,
        key: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;
}

/// Topic an aggregate type publishes to, per the `{type}.events.v1`
/// convention.
#[must_use]
pub fn topic_for_aggregate(aggregate_type: &str) -> String {
    format!("{aggregate_type}.events.v1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_follows_versioned_convention() {
        assert_eq!(topic_for_aggregate("account"), "account.events.v1");
        assert_eq!(topic_for_aggregate("ledger"), "ledger.events.v1");
    }

    #[test]
    fn publish_failed_display_names_topic_and_reason() {
        let error = EventBusError::PublishFailed {
            topic: "account.events.v1".to_string(),
            reason: "broker unreachable".to_string(),
        };

        let display = format!("{error}");
        assert!(display.contains("account.events.v1"));
        assert!(display.contains("broker unreachable"));
    }

    #[test]
    fn event_bus_is_dyn_compatible() {
        fn assert_dyn(_bus: &dyn EventBus) {}

        struct NullBus;

        impl EventBus for NullBus {
            fn publish(
                &self,
                _topic: &str,
                _key: &str,
                _event: &SerializedEvent,
            ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>
            {
                Box::pin(async { Ok(()) })
            }
        }

        assert_dyn(&NullBus);
    }
}
