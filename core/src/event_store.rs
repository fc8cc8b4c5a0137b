//! Event store: the append-only, per-stream log that is the single
//! source of truth.
//!
//! The [`EventStore`] trait is the persistence seam of the system. A
//! store keeps one ordered log per [`StreamId`]; appends are conditioned
//! on the caller's expected [`Version`] so that two writers racing on the
//! same stream cannot both commit against a stale base. The store knows
//! nothing about business semantics; it moves [`SerializedEvent`]
//! envelopes.
//!
//! [`InMemoryEventStore`] is the reference implementation. The
//! persistence tier is deliberately out of scope here; a durable store
//! implements the same trait.

use crate::event::SerializedEvent;
use crate::stream::{StreamId, Version};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from event store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    /// The stream moved past the expected version between load and append.
    ///
    /// Transient: reload the stream and retry the whole operation.
    #[error("Concurrency conflict on {stream_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The stream the append was attempted on.
        stream_id: StreamId,
        /// The version the writer based its work on.
        expected: Version,
        /// The version the stream actually had.
        actual: Version,
    },

    /// The backing storage failed.
    #[error("Event store storage error: {0}")]
    StorageError(String),
}

/// Append-only event log with optimistic concurrency control.
///
/// # Contract
///
/// - Events of one stream are totally ordered; the Nth committed event
///   has sequence number N (1-based, gapless).
/// - `append_events` with `Some(expected)` commits atomically iff the
///   stream is still at `expected`; otherwise it fails with
///   [`EventStoreError::ConcurrencyConflict`] and commits nothing.
/// - `load_events` on an unknown stream returns an empty vector, not an
///   error: an aggregate with no history is simply in its default state.
pub trait EventStore: Send + Sync {
    /// Append events to a stream, returning the stream's new version.
    ///
    /// `expected_version` of `None` appends unconditionally (no
    /// concurrency check); `Some(v)` makes the append conditional.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` if the conditional check fails, or
    /// `StorageError` if the backing storage does.
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>>;

    /// Load a stream's events in commit order.
    ///
    /// `from_version` of `Some(v)` skips the first `v` events (those at
    /// sequence `<= v`); `None` loads the full stream.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing storage fails.
    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>;
}

#[derive(Debug)]
struct StreamSlot {
    version: Version,
    events: Vec<SerializedEvent>,
}

impl Default for StreamSlot {
    fn default() -> Self {
        Self {
            version: Version::INITIAL,
            events: Vec::new(),
        }
    }
}

/// In-memory [`EventStore`] over a map of per-stream logs.
///
/// Appends take the write lock for the atomic version-check-and-extend;
/// loads share the read lock. Suitable as the reference store and for
/// tests; contents do not survive the process.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamId, StreamSlot>>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a stream (`INITIAL` for unknown streams).
    pub async fn version_of(&self, stream_id: &StreamId) -> Version {
        self.streams
            .read()
            .await
            .get(stream_id)
            .map_or(Version::INITIAL, |slot| slot.version)
    }
}

impl EventStore for InMemoryEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut streams = self.streams.write().await;
            let slot = streams.entry(stream_id.clone()).or_default();

            if let Some(expected) = expected_version {
                if slot.version != expected {
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id,
                        expected,
                        actual: slot.version,
                    });
                }
            }

            for event in events {
                slot.events.push(event);
                slot.version = slot.version.next();
            }

            Ok(slot.version)
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.read().await;
            let Some(slot) = streams.get(&stream_id) else {
                return Ok(Vec::new());
            };

            let skip = match from_version {
                Some(v) => usize::try_from(v.value()).map_err(|_| {
                    EventStoreError::StorageError(
                        "from_version exceeds addressable range".to_string(),
                    )
                })?,
                None => 0,
            };

            Ok(slot.events.get(skip..).unwrap_or(&[]).to_vec())
        })
    }
}
