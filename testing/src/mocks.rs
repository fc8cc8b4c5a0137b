//! Mock implementations of environment traits
//!
//! - [`FixedClock`]: deterministic time
//! - [`InMemoryEventBus`]: captures published events for assertions

use chrono::{DateTime, Utc};
use moneyrail_core::environment::Clock;
use moneyrail_core::event::SerializedEvent;
use moneyrail_core::event_bus::{EventBus, EventBusError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use moneyrail_testing::mocks::FixedClock;
/// use moneyrail_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// let time1 = clock.now();
/// let time2 = clock.now();
/// assert_eq!(time1, time2); // Always the same!
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// One publish captured by [`InMemoryEventBus`].
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    /// Topic the event was published to.
    pub topic: String,
    /// Partition key (the aggregate id).
    pub key: String,
    /// The published envelope.
    pub event: SerializedEvent,
}

/// In-memory [`EventBus`] that records every publish.
///
/// Tests assert on the recorded `(topic, key, envelope)` triples instead
/// of standing up a broker.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// router_with(bus.clone()).dispatch(command).await?;
///
/// let published = bus.published_to("account.events.v1");
/// assert_eq!(published.len(), 1);
/// assert_eq!(published[0].key, "A-1");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    published: Mutex<Vec<PublishedEvent>>,
}

impl InMemoryEventBus {
    /// Create an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All publishes, in order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Publishes to one topic, in order.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<PublishedEvent> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    /// Number of publishes across all topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// True if nothing was published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        key: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let record = PublishedEvent {
            topic: topic.to_string(),
            key: key.to_string(),
            event: event.clone(),
        };
        Box::pin(async move {
            self.published
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(record);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_in_memory_bus_records_in_order() {
        tokio_test::block_on(async {
            let bus = InMemoryEventBus::new();
            let first = SerializedEvent::new("AccountDebited.v1".to_string(), vec![1], None);
            let second = SerializedEvent::new("LedgerBooked.v1".to_string(), vec![2], None);

            #[allow(clippy::expect_used)] // Panics: Test will fail if publish fails
            {
                bus.publish("account.events.v1", "A-1", &first)
                    .await
                    .expect("publish should succeed");
                bus.publish("ledger.events.v1", "T-1", &second)
                    .await
                    .expect("publish should succeed");
            }

            assert_eq!(bus.len(), 2);
            let account = bus.published_to("account.events.v1");
            assert_eq!(account.len(), 1);
            assert_eq!(account[0].key, "A-1");
            assert_eq!(account[0].event.event_type, "AccountDebited.v1");
        });
    }
}
