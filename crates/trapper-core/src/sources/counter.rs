//! CounterSource - monotonically increasing event tallies per category.
//!
//! Any number of producers may call [`CounterSource::increment`] concurrently.
//! Categories are created on first use. Counts never decrease and there is no
//! reset short of dropping the source.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::source::{MetricSource, SourceInfo, SourceKind};
use crate::status::{Reading, StatusValue};

/// Key prefix for reported counters: `event.count.<category>`.
pub const KEY_PREFIX: &str = "event.count";

pub struct CounterSource {
    info: SourceInfo,
    prefix: String,
    counts: DashMap<String, Arc<AtomicU64>>,
}

impl CounterSource {
    /// Counters reported as `event.count.<category>`.
    pub fn new() -> Self {
        Self::with_prefix(KEY_PREFIX)
    }

    /// Counters reported as `<prefix>.<category>`, or as the bare category
    /// when `prefix` is empty.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            info: SourceInfo {
                name: "event_count",
                description: "Per-category tallies of host events",
                kind: SourceKind::Counter,
            },
            prefix: prefix.into(),
            counts: DashMap::new(),
        }
    }

    /// Count one occurrence of `category`.
    pub fn increment(&self, category: &str) {
        self.add(category, 1);
    }

    /// Count `n` occurrences of `category` at once.
    pub fn add(&self, category: &str, n: u64) {
        if let Some(counter) = self.counts.get(category) {
            counter.fetch_add(n, Ordering::Relaxed);
            return;
        }
        self.counts
            .entry(category.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(n, Ordering::Relaxed);
    }

    /// Current count for `category`, 0 if it was never seen.
    pub fn get(&self, category: &str) -> u64 {
        self.counts
            .get(category)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Point-in-time copy of every counter, ordered by category.
    ///
    /// Increments racing with the snapshot may or may not be included.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect()
    }

    pub fn category_count(&self) -> usize {
        self.counts.len()
    }

    /// Reported key for `category`.
    pub fn key_for(&self, category: &str) -> String {
        if self.prefix.is_empty() {
            category.to_string()
        } else {
            format!("{}.{category}", self.prefix)
        }
    }
}

impl Default for CounterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for CounterSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn readings(&self) -> Vec<Reading> {
        let mut entries: Vec<(String, Arc<AtomicU64>)> = self
            .counts
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        entries
            .into_iter()
            .map(|(category, counter)| {
                Reading::new(
                    self.key_for(&category),
                    StatusValue::deferred(move || counter.load(Ordering::Relaxed).to_string()),
                )
            })
            .collect()
    }
}
