//! Run-scoped identity tracking
//!
//! Keys are claimed before the detail fetch so a stub repeated on a later
//! page costs no network call and is never exported twice. The set only
//! grows for the lifetime of a run.

use std::collections::HashSet;

/// Set of identity keys seen during the run
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    /// Create an empty deduplicator
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` was already recorded
    pub fn seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Record `key` as seen
    pub fn record(&mut self, key: &str) {
        if !self.seen.contains(key) {
            self.seen.insert(key.to_string());
        }
    }

    /// Check and record in one step.
    ///
    /// Returns `true` if `key` was new and is now claimed by the caller,
    /// `false` if it had been seen before.
    pub fn claim(&mut self, key: &str) -> bool {
        if self.seen(key) {
            return false;
        }
        self.record(key);
        true
    }

    /// Number of distinct keys recorded
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no key has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
