//! Stream identity and sequence numbering for event-sourced aggregates.
//!
//! Every aggregate instance owns exactly one event stream, addressed by a
//! [`StreamId`] and versioned by a [`Version`] that counts committed events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `StreamId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream ID: {0}")]
pub struct ParseStreamIdError(String);

/// Unique identifier for an event stream (one aggregate instance).
///
/// Stream ids are formed as `"{aggregate_type}-{entity_id}"`, for example:
/// - `"account-A-1"`: the account with id `A-1`
/// - `"ledger-T-6f1c"`: the ledger record for transfer `T-6f1c`
///
/// # Validation
///
/// - `FromStr::from_str()`: validates input (rejects empty strings)
/// - `new()`, `for_aggregate()` and `From`: no validation, for
///   application-controlled input
///
/// Parse external input with `FromStr`; build ids from trusted parts with
/// `for_aggregate`.
///
/// # Examples
///
/// ```
/// use moneyrail_core::stream::StreamId;
///
/// let stream_id = StreamId::for_aggregate("account", "A-1");
/// assert_eq!(stream_id.as_str(), "account-A-1");
///
/// let parsed: StreamId = "ledger-T-42".parse().unwrap();
/// assert_eq!(parsed, StreamId::new("ledger-T-42"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a `StreamId` from an already-formed id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the stream id for an aggregate instance from its type prefix
    /// and entity id.
    ///
    /// # Examples
    ///
    /// ```
    /// use moneyrail_core::stream::StreamId;
    ///
    /// let id = StreamId::for_aggregate("ledger", "T-42");
    /// assert_eq!(id.as_str(), "ledger-T-42");
    /// ```
    #[must_use]
    pub fn for_aggregate(aggregate_type: &str, entity_id: impl AsRef<str>) -> Self {
        Self(format!("{aggregate_type}-{}", entity_id.as_ref()))
    }

    /// Get the stream id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the `StreamId`, returning the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamIdError("Stream ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sequence number of a stream, used for optimistic concurrency control.
///
/// A stream at `Version(n)` holds `n` committed events; the event at
/// position `k` (1-based) was appended when the stream was at version
/// `k - 1`, so sequence numbers form a gapless run starting at 1.
///
/// Appends are conditioned on the expected version: if another writer
/// committed first, the expected version no longer matches and the append
/// is rejected instead of silently losing the earlier write.
///
/// # Examples
///
/// ```
/// use moneyrail_core::stream::Version;
///
/// let fresh = Version::INITIAL;
/// assert!(fresh.is_initial());
/// assert_eq!(fresh.next(), Version::new(1));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of a stream with no committed events.
    pub const INITIAL: Self = Self(0);

    /// Create a `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version as a plain number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version after one more committed event.
    ///
    /// # Overflow Behavior
    ///
    /// Plain addition; `u64::MAX` events in one stream is not a realistic
    /// concern.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Whether this is the version of an empty stream.
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Arithmetic addition for `Version`.
///
/// # Overflow Behavior
///
/// Plain addition; overflow is not a practical concern at `u64` range.
impl std::ops::Add<u64> for Version {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}
