//! Redpanda event bus implementation for MoneyRail.
//!
//! This crate provides a Redpanda-backed publisher implementing the
//! [`EventBus`] trait from `moneyrail-core`. It uses rdkafka for
//! Kafka-compatible event streaming.
//!
//! # Why Redpanda?
//!
//! - **Kafka-compatible**: standard Kafka protocol, works with any Kafka-compatible system
//! - **Vendor swappable**: Redpanda, Apache Kafka, AWS MSK, Azure Event Hubs, etc.
//! - **Simpler operations**: easier to deploy and operate than Kafka
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐      ┌──────────────┐      ┌───────────────────┐
//! │  Event Store │ ───► │   Redpanda   │ ───► │ Saga / downstream │
//! │ (source of   │      │  (publish)   │      │    consumers      │
//! │   truth)     │      └──────────────┘      └───────────────────┘
//! └──────────────┘
//! ```
//!
//! Events are published only after they are committed to the event store.
//! The message payload is the event's serialized `data` exactly as
//! provided; the partition key is the aggregate's entity ID, so all events
//! of one entity land in one partition and keep their order.
//!
//! # Delivery Semantics
//!
//! **At-least-once publishing**: a publish that times out may still have
//! been delivered, and callers that retry will produce duplicates.
//! Consumers must deduplicate on command or event IDs. A publish failure
//! never un-commits the events; the store remains the source of truth.
//!
//! # Example
//!
//! ```no_run
//! use moneyrail_redpanda::RedpandaEventBus;
//! use moneyrail_core::event_bus::EventBus;
//! use moneyrail_core::event::SerializedEvent;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::new("localhost:9092")?;
//!
//! let event = SerializedEvent::new(
//!     "AccountDebited.v1".to_string(),
//!     br#"{"accountId":"A-1","amount":25}"#.to_vec(),
//!     None,
//! );
//! event_bus.publish("account.events.v1", "A-1", &event).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use moneyrail_core::event::SerializedEvent;
use moneyrail_core::event_bus::{EventBus, EventBusError};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// [`EventBus`] backed by a Redpanda (or any Kafka-compatible) cluster.
///
/// Wraps an rdkafka [`FutureProducer`]; delivery is at-least-once and
/// ordered within a partition, so events keyed by the same entity are
/// consumed in commit order. Reconnection and batching are handled by
/// the client library.
///
/// # Example
///
/// ```no_run
/// use moneyrail_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .compression("lz4")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
}

impl RedpandaEventBus {
    /// Connect a bus with default producer settings.
    ///
    /// `brokers` is a comma-separated bootstrap list, e.g.
    /// `"localhost:9092"`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot
    /// be created from the configuration.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// The bootstrap broker list this bus was built with.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Producer configuration collected before [`RedpandaEventBus`] is
/// built. Only the broker list is required.
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
}

impl RedpandaEventBusBuilder {
    /// Bootstrap broker list, comma-separated. Required.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer `acks`: `"0"`, `"1"` (default), or `"all"`.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec: `"none"` (default), `"gzip"`, `"snappy"`,
    /// `"lz4"`, or `"zstd"`.
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Per-message delivery timeout. Default 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create the producer and the bus around it.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] when no brokers were
    /// configured or the producer rejects the configuration.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;

        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            );

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            acks = self.producer_acks.as_deref().unwrap_or("1"),
            compression = self.compression.as_deref().unwrap_or("none"),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Redpanda producer ready"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout,
        })
    }
}

impl EventBus for RedpandaEventBus {
    /// Publish one committed event.
    ///
    /// The message payload is `event.data` verbatim; `event.event_type`
    /// and `event.metadata` are used for logging only and are not
    /// transmitted. The partition key is `key`, the entity ID of the
    /// aggregate that produced the event.
    fn publish(
        &self,
        topic: &str,
        key: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        // The returned future outlives the caller's borrows, so it owns
        // copies of everything but the producer.
        let topic = topic.to_string();
        let key = key.to_string();
        let payload = event.data.clone();
        let event_type = event.event_type.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let record = FutureRecord::to(&topic)
                .key(key.as_bytes())
                .payload(&payload);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        %topic,
                        %key,
                        partition,
                        offset,
                        %event_type,
                        "Integration event published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        %topic,
                        %key,
                        %event_type,
                        error = %kafka_error,
                        "Integration event publish failed"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }
}
