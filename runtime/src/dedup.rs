//! Bounded tracking of processed command IDs.
//!
//! Every committed event carries the ID of the command that produced it,
//! so the set of processed commands can be rebuilt from the event log on
//! every load. That makes deduplication survive restarts without any
//! side storage, at the cost of growing with the log. [`ProcessedCommands`]
//! bounds that growth with a retention window: IDs older than the window
//! are pruned, and a duplicate arriving after the window re-executes.
//! Callers that redeliver commands (job workers, HTTP retries) are
//! expected to do so well inside the window.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

/// Default retention window for processed command IDs, in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 3600;

/// Recently processed command IDs with windowed eviction.
///
/// IDs are observed in log order, so observation timestamps never
/// decrease. Re-observing an ID refreshes its retention.
#[derive(Debug, Clone)]
pub struct ProcessedCommands {
    window: Duration,
    entries: HashMap<String, DateTime<Utc>>,
    order: VecDeque<(String, DateTime<Utc>)>,
}

impl ProcessedCommands {
    /// Creates an empty set retaining IDs for `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Records that `command_id` produced events recorded at `recorded_at`.
    pub fn observe(&mut self, command_id: &str, recorded_at: DateTime<Utc>) {
        self.entries.insert(command_id.to_string(), recorded_at);
        self.order.push_back((command_id.to_string(), recorded_at));
    }

    /// Whether `command_id` is inside the retention window.
    #[must_use]
    pub fn contains(&self, command_id: &str) -> bool {
        self.entries.contains_key(command_id)
    }

    /// Evicts every ID whose last observation is older than the window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while self.order.front().is_some_and(|(_, seen)| *seen < cutoff) {
            if let Some((id, seen_at)) = self.order.pop_front() {
                // A refreshed ID has a newer timestamp in the map and a
                // younger queue node still pending; drop only the stale node.
                if self.entries.get(&id) == Some(&seen_at) {
                    self.entries.remove(&id);
                }
            }
        }
    }

    /// Number of IDs currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no IDs are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProcessedCommands {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}
