//! Per-sender metric registry
//!
//! Maps a sender id to its [`WindowedAverager`]. Entries are created on the
//! first sample for an unseen id and live as long as the registry.
//!
//! ## Locking
//!
//! Steady-state recording takes only the registry read lock plus the
//! entry's own lock. The write lock is taken to create an entry and for
//! per-key finish accounting.
//!
//! ## Completion accounting
//!
//! The registry keeps a live-entry count that [`MetricRegistry::mark_finished`]
//! decrements. [`MetricRegistry::mark_all_finished`] finishes every entry
//! but leaves the count alone, so [`MetricRegistry::is_all_finished`] only
//! turns true once every id was finished individually.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::averager::WindowedAverager;
use super::clock::{Clock, SystemClock};

/// One drained window for one sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowReport {
    pub key: String,
    pub mean_ms: i64,
    pub samples: u64,
}

#[derive(Debug)]
struct Entries<C: Clock> {
    map: AHashMap<String, Arc<WindowedAverager<C>>>,
    /// `None` until the first entry is created
    live: Option<usize>,
}

/// Registry of per-sender averagers
#[derive(Debug)]
pub struct MetricRegistry<C: Clock = SystemClock> {
    clock: C,
    entries: RwLock<Entries<C>>,
}

impl Default for MetricRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> MetricRegistry<C> {
    pub fn with_clock(clock: C) -> Self {
        MetricRegistry {
            clock,
            entries: RwLock::new(Entries {
                map: AHashMap::new(),
                live: None,
            }),
        }
    }

    /// Record a latency sample for `key`, creating its entry if needed.
    pub fn record_for(&self, key: &str, latency_ms: i64) {
        self.get_or_create(key).record_event(latency_ms);
    }

    /// Look up `key`, creating the entry on first sight.
    pub fn get_or_create(&self, key: &str) -> Arc<WindowedAverager<C>> {
        if let Some(entry) = self.entries.read().map.get(key) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.map.get(key) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(WindowedAverager::new(key, self.clock.clone()));
        entries.map.insert(key.to_string(), Arc::clone(&entry));
        entries.live = Some(entries.live.map_or(1, |n| n + 1));
        debug!(id = %key, "created metric entry");
        entry
    }

    pub fn get(&self, key: &str) -> Option<Arc<WindowedAverager<C>>> {
        self.entries.read().map.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map.is_empty()
    }

    /// Finish one entry.
    ///
    /// Returns `false` if `key` is unknown or already finished.
    pub fn mark_finished(&self, key: &str) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.map.get(key) else {
            return false;
        };
        if !entry.mark_finished() {
            return false;
        }
        entries.live = entries.live.map(|n| n.saturating_sub(1));
        info!("Done (ID: {})", key);
        true
    }

    /// Finish every current entry without touching the live count.
    pub fn mark_all_finished(&self) {
        let entries = self.entries.read();
        for entry in entries.map.values() {
            entry.mark_finished();
        }
    }

    /// Drain every entry once, skipping those with nothing new.
    ///
    /// Reports are sorted by key.
    pub fn poll_all(&self) -> Vec<WindowReport> {
        let entries = self.entries.read();
        let mut reports: Vec<WindowReport> = entries
            .map
            .iter()
            .filter_map(|(key, entry)| {
                entry.poll_once().map(|window| WindowReport {
                    key: key.clone(),
                    mean_ms: window.mean_ms,
                    samples: window.samples,
                })
            })
            .collect();
        reports.sort_by(|a, b| a.key.cmp(&b.key));
        reports
    }

    /// Entries created but not yet finished through [`mark_finished`](Self::mark_finished)
    pub fn live_entries(&self) -> usize {
        self.entries.read().live.unwrap_or(0)
    }

    /// True once at least one entry exists and every entry was finished
    /// individually.
    pub fn is_all_finished(&self) -> bool {
        self.entries.read().live == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SimulatedClock;

    #[test]
    fn test_lazy_creation() {
        let registry = MetricRegistry::with_clock(SimulatedClock::from_secs(1));
        assert!(registry.is_empty());

        registry.record_for("a", 5);
        registry.record_for("a", 7);
        registry.record_for("b", 1);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));
        assert_eq!(registry.live_entries(), 2);
    }

    #[test]
    fn test_same_entry_returned() {
        let registry = MetricRegistry::with_clock(SimulatedClock::from_secs(1));
        let first = registry.get_or_create("a");
        let second = registry.get_or_create("a");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.live_entries(), 1);
    }

    #[test]
    fn test_mark_finished_accounting() {
        let registry = MetricRegistry::with_clock(SimulatedClock::from_secs(1));
        assert!(!registry.is_all_finished(), "empty registry is not finished");
        assert!(!registry.mark_finished("missing"));

        registry.record_for("a", 1);
        registry.record_for("b", 1);

        assert!(registry.mark_finished("a"));
        assert!(!registry.mark_finished("a"));
        assert!(!registry.is_all_finished());

        assert!(registry.mark_finished("b"));
        assert!(registry.is_all_finished());
    }

    #[test]
    fn test_mark_all_leaves_live_count() {
        let registry = MetricRegistry::with_clock(SimulatedClock::from_secs(1));
        registry.record_for("a", 1);
        registry.record_for("b", 1);

        registry.mark_all_finished();
        assert!(registry.get("a").unwrap().is_finished());
        assert!(!registry.is_all_finished());

        // Already finished through the sweep, so no accounting happens.
        assert!(!registry.mark_finished("a"));
        assert_eq!(registry.live_entries(), 2);
    }

    #[test]
    fn test_poll_all_skips_empty() {
        let clock = SimulatedClock::from_secs(1);
        let registry = MetricRegistry::with_clock(clock.clone());
        registry.record_for("b", 4);
        registry.record_for("a", 2);

        let first = registry.poll_all();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].key, "a");
        assert_eq!(first[0].samples, 0);

        assert!(registry.poll_all().is_empty());

        clock.advance_ms(1000);
        registry.record_for("a", 0);
        let second = registry.poll_all();
        assert_eq!(
            second,
            vec![WindowReport {
                key: "a".to_string(),
                mean_ms: 2,
                samples: 1
            }]
        );
    }
}
