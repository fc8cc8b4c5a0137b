//! API idempotency store: at most one execution per idempotency key.
//!
//! A request carrying an idempotency key first claims the key. The
//! first claimant wins and runs the real work; every concurrent or
//! later claim of the same key waits for (or immediately receives) the
//! first execution's response instead of running again. A key is never
//! answered by two executions and a duplicate is never an error.
//!
//! Claims are leases, not locks: if the claimant fails before
//! fulfilling, dropping its [`ClaimToken`] releases the key and wakes
//! all waiters, and the next claim runs the work for real. Fulfilled
//! entries stay cached for the TTL and are evicted lazily on the next
//! claim of the same key.

use crate::types::AcceptedTransfer;
use chrono::{DateTime, Utc};
use moneyrail_core::environment::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Default retention of fulfilled responses, in seconds (24 hours).
pub const DEFAULT_TTL_SECS: i64 = 86_400;

enum Slot {
    /// Claimed; the response will arrive on the watch channel.
    Pending(watch::Receiver<Option<AcceptedTransfer>>),
    /// Fulfilled; replays are served from here.
    Ready(AcceptedTransfer),
}

struct Entry {
    created_at: DateTime<Utc>,
    slot: Slot,
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

/// Outcome of claiming an idempotency key.
pub enum Claim {
    /// This caller owns the key and must run the work, then either
    /// [`ClaimToken::fulfill`] or drop the token to release the key.
    New(ClaimToken),
    /// Another execution already answered (or is answering) this key.
    Replayed(AcceptedTransfer),
}

/// Exclusive right to answer one idempotency key.
///
/// Dropping the token without fulfilling releases the key so a retry
/// can claim it fresh.
pub struct ClaimToken {
    entries: Entries,
    key: String,
    sender: watch::Sender<Option<AcceptedTransfer>>,
    fulfilled: bool,
}

impl ClaimToken {
    /// Record the response for this key and wake all waiters.
    pub fn fulfill(mut self, response: AcceptedTransfer) {
        {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get_mut(&self.key) {
                entry.slot = Slot::Ready(response.clone());
            }
        }

        // Waiters hold receiver clones; it is fine if there are none.
        let _ = self.sender.send(Some(response));
        self.fulfilled = true;
    }
}

impl Drop for ClaimToken {
    fn drop(&mut self) {
        if self.fulfilled {
            return;
        }

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&self.key) {
            if matches!(entry.slot, Slot::Pending(_)) {
                debug!(key = %self.key, "Idempotency claim released without response");
                entries.remove(&self.key);
            }
        }
    }
}

/// In-memory idempotency store keyed by the client-chosen header value.
pub struct IdempotencyStore {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: Entries,
}

impl IdempotencyStore {
    /// Create a store that retains fulfilled responses for `ttl`.
    #[must_use]
    pub fn new(ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Claim a key, or wait for whoever already claimed it.
    ///
    /// Returns [`Claim::New`] when this caller must run the work and
    /// [`Claim::Replayed`] with the recorded response otherwise. When
    /// the current claimant fails without fulfilling, one waiter
    /// re-claims the key and gets [`Claim::New`].
    pub async fn claim(&self, key: &str) -> Claim {
        loop {
            let mut receiver = {
                let mut entries = self
                    .entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let now = self.clock.now();

                // Pending claims are released by their token, never by
                // the clock.
                if let Some(entry) = entries.get(key) {
                    if matches!(entry.slot, Slot::Ready(_)) && now - entry.created_at >= self.ttl {
                        entries.remove(key);
                    }
                }

                match entries.get(key) {
                    Some(entry) => match &entry.slot {
                        Slot::Ready(response) => return Claim::Replayed(response.clone()),
                        Slot::Pending(receiver) => receiver.clone(),
                    },
                    None => {
                        let (sender, receiver) = watch::channel(None);
                        entries.insert(
                            key.to_string(),
                            Entry {
                                created_at: now,
                                slot: Slot::Pending(receiver),
                            },
                        );

                        return Claim::New(ClaimToken {
                            entries: Arc::clone(&self.entries),
                            key: key.to_string(),
                            sender,
                            fulfilled: false,
                        });
                    }
                }
            };

            match receiver.wait_for(Option::is_some).await {
                Ok(response) => {
                    if let Some(response) = response.as_ref() {
                        return Claim::Replayed(response.clone());
                    }
                }
                Err(_) => {
                    // Claimant dropped without answering; race for the
                    // key again.
                }
            }
        }
    }

    /// Number of live entries (pending and fulfilled).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
