//! Domain event trait and the serialized envelope stored per stream.
//!
//! A domain event is the durable record of one state change. Every event
//! knows its versioned type name, the partition key that orders it on the
//! message bus, and the id of the command that caused it. Events are held
//! in the store as [`SerializedEvent`] envelopes: bincode payload bytes
//! plus optional JSON metadata.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from event serialization and deserialization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Failed to serialize an event.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize an event.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// A domain event: an immutable fact committed to an aggregate's stream.
///
/// Implementations are normally generated with
/// `#[derive(DomainEvent)]` from `moneyrail-macros`, which derives
/// `event_type()` from the struct name (`"AccountDebited.v1"`), takes the
/// partition key from the `#[key]` field and requires a `command_id`
/// field.
///
/// Two encodings are provided:
///
/// - [`to_bytes`](DomainEvent::to_bytes) / [`from_bytes`](DomainEvent::from_bytes):
///   compact bincode, used for event-store payloads.
/// - [`to_wire`](DomainEvent::to_wire): stable camelCase JSON with no type
///   tag, used for messages published to the bus. Consumers rely on the
///   field names staying fixed; evolution is additive (new optional
///   fields only).
pub trait DomainEvent: Send + Sync + 'static {
    /// Versioned type name of this event, e.g. `"AccountDebited.v1"`.
    fn event_type(&self) -> &'static str;

    /// The key that partitions this event on the message bus.
    ///
    /// Events with the same key are delivered in order, so the key is the
    /// owning aggregate's entity id (account id, transfer id).
    fn partition_key(&self) -> &str;

    /// Id of the command that produced this event.
    ///
    /// Replayed by the aggregate runtime to rebuild its
    /// processed-command set.
    fn command_id(&self) -> &str;

    /// Serialize this event to store-payload bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if bincode encoding fails.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from store-payload bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if bincode decoding fails.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }

    /// Serialize this event to its published wire form: a plain JSON
    /// object with stable field names and no embedded type discriminator.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if JSON encoding fails.
    fn to_wire(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }
}

/// A serialized event envelope as held by the event store or handed to
/// the event bus.
///
/// The envelope does not interpret `data`; the producer chooses the
/// encoding (bincode on the store path, wire JSON on the publish path).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SerializedEvent {
    /// Versioned event type name, e.g. `"LedgerBooked.v1"`.
    pub event_type: String,

    /// The serialized event payload.
    pub data: Vec<u8>,

    /// Optional JSON metadata recorded alongside the payload
    /// (e.g. causing command id, commit timestamp).
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create an envelope from already-serialized parts.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Envelope a domain event for the store (bincode payload).
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if encoding fails.
    pub fn from_event<E>(event: &E, metadata: Option<serde_json::Value>) -> Result<Self, EventError>
    where
        E: DomainEvent + Serialize,
    {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Envelope a domain event for publication (wire JSON payload).
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if encoding fails.
    pub fn wire_from_event<E>(event: &E) -> Result<Self, EventError>
    where
        E: DomainEvent + Serialize,
    {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_wire()?,
            metadata: None,
        })
    }
}

impl std::fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}
