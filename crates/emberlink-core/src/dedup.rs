//! Flood-mesh message deduplicator.
//!
//! The same message can arrive over several relay paths, so delivery is
//! gated on an id cache. Storage is an append-only log (for age order)
//! plus a hash index (for O(1) membership). Eviction is amortized:
//! instead of dropping one entry per insert once full, a single batch
//! trims down to 75% of the ceiling. A record is live only while the
//! index timestamp still matches it; re-recording an id leaves the older
//! log entry dead in place until a trim or compaction passes over it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Deduplicator capacity and age limits.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Ceiling on live entries before a batch trim
    pub max_entries: usize,
    /// Entries older than this are swept by [`MessageDeduplicator::maintain`]
    pub max_age: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_age: Duration::from_secs(300),
        }
    }
}

struct LogRecord {
    id: String,
    seen_at: Instant,
}

struct Inner {
    log: Vec<LogRecord>,
    /// Index of the first live log entry; everything before it is dead
    head: usize,
    index: HashMap<String, Instant>,
}

impl Inner {
    fn new() -> Self {
        Self {
            log: Vec::new(),
            head: 0,
            index: HashMap::new(),
        }
    }

    fn append(&mut self, id: &str, seen_at: Instant) {
        self.log.push(LogRecord {
            id: id.to_string(),
            seen_at,
        });
        self.index.insert(id.to_string(), seen_at);
    }

    /// Drop live entries from the head until at most `target` remain.
    fn trim_to(&mut self, target: usize) {
        while self.index.len() > target && self.head < self.log.len() {
            self.drop_head();
        }
        self.compact_if_needed();
    }

    /// Sweep entries older than `max_age` off the head.
    fn sweep_expired(&mut self, now: Instant, max_age: Duration) {
        while self.head < self.log.len() {
            let record = &self.log[self.head];
            if now.duration_since(record.seen_at) <= max_age {
                break;
            }
            self.drop_head();
        }
        self.compact_if_needed();
    }

    /// Advance past the head record, removing it from the index only if
    /// it is still the live record for its id.
    fn drop_head(&mut self) {
        let record = &self.log[self.head];
        if self.index.get(&record.id) == Some(&record.seen_at) {
            self.index.remove(&record.id);
        }
        self.head += 1;
    }

    /// Physically remove the dead prefix once it exceeds half the log.
    fn compact_if_needed(&mut self) {
        if self.head * 2 > self.log.len() {
            self.log.drain(..self.head);
            self.head = 0;
        }
    }
}

/// Bounded duplicate-message cache shared across inbound handlers and
/// the maintenance task.
pub struct MessageDeduplicator {
    inner: Mutex<Inner>,
    config: DedupConfig,
}

impl Default for MessageDeduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

impl MessageDeduplicator {
    /// Create a deduplicator with the given limits.
    #[must_use]
    pub fn new(config: DedupConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if `id` was already seen; otherwise records it
    /// now and returns `false`.
    pub fn check_and_record(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner.index.contains_key(id) {
            return true;
        }
        inner.append(id, now);
        self.enforce_ceiling(&mut inner);
        false
    }

    /// Record `id` at a caller-supplied timestamp, overwriting any
    /// previous record.
    pub fn record_at(&self, id: &str, seen_at: Instant) {
        let mut inner = self.lock();
        inner.append(id, seen_at);
        self.enforce_ceiling(&mut inner);
    }

    /// Record `id` unconditionally without a membership check, for
    /// one-way tracking such as ids we sent ourselves.
    pub fn mark(&self, id: &str) {
        self.record_at(id, Instant::now());
    }

    /// Membership test without mutation.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().index.contains_key(id)
    }

    /// When `id` was last recorded, if it is still cached.
    #[must_use]
    pub fn timestamp_of(&self, id: &str) -> Option<Instant> {
        self.lock().index.get(id).copied()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().index.len()
    }

    /// True when no entries are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything.
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = Inner::new();
    }

    /// Periodic sweep: evict entries older than the configured max age.
    pub fn maintain(&self) {
        let mut inner = self.lock();
        let before = inner.index.len();
        inner.sweep_expired(Instant::now(), self.config.max_age);
        let evicted = before - inner.index.len();
        if evicted > 0 {
            debug!(evicted, remaining = inner.index.len(), "dedup age sweep");
        }
    }

    fn enforce_ceiling(&self, inner: &mut Inner) {
        if inner.index.len() > self.config.max_entries {
            let target = self.config.max_entries * 3 / 4;
            debug!(
                live = inner.index.len(),
                target, "dedup ceiling reached, batch trim"
            );
            inner.trim_to(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> MessageDeduplicator {
        MessageDeduplicator::new(DedupConfig {
            max_entries: 8,
            max_age: Duration::from_secs(300),
        })
    }

    #[test]
    fn test_first_sighting_is_not_duplicate() {
        let dedup = MessageDeduplicator::default();
        assert!(!dedup.check_and_record("m1"));
        assert!(dedup.check_and_record("m1"));
        assert!(dedup.contains("m1"));
    }

    #[test]
    fn test_batch_trim_to_three_quarters() {
        let dedup = small();
        for i in 0..9 {
            assert!(!dedup.check_and_record(&format!("m{i}")));
        }
        // Ceiling of 8 exceeded at the 9th insert; trimmed to 6
        assert_eq!(dedup.len(), 6);
        // Oldest entries went first
        assert!(!dedup.contains("m0"));
        assert!(!dedup.contains("m2"));
        assert!(dedup.contains("m8"));
    }

    #[test]
    fn test_age_sweep() {
        let dedup = small();
        let old = Instant::now() - Duration::from_secs(600);
        dedup.record_at("stale", old);
        dedup.mark("fresh");
        dedup.maintain();
        assert!(!dedup.contains("stale"));
        assert!(dedup.contains("fresh"));
    }

    #[test]
    fn test_re_record_updates_timestamp() {
        let dedup = small();
        let old = Instant::now() - Duration::from_secs(10);
        dedup.record_at("m", old);
        let first = dedup.timestamp_of("m").unwrap();
        dedup.mark("m");
        let second = dedup.timestamp_of("m").unwrap();
        assert!(second > first);
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_re_recorded_entry_survives_head_sweep() {
        let dedup = small();
        let old = Instant::now() - Duration::from_secs(600);
        dedup.record_at("m", old);
        // Newer record for the same id makes the old log entry dead
        dedup.mark("m");
        dedup.maintain();
        assert!(dedup.contains("m"));
    }

    #[test]
    fn test_reset() {
        let dedup = small();
        dedup.mark("a");
        dedup.mark("b");
        dedup.reset();
        assert!(dedup.is_empty());
        assert!(!dedup.contains("a"));
    }

    #[test]
    fn test_timestamp_of_missing_is_none() {
        let dedup = small();
        assert!(dedup.timestamp_of("ghost").is_none());
    }

    #[test]
    fn test_trim_keeps_index_consistent_with_dead_entries() {
        let dedup = small();
        for i in 0..4 {
            dedup.mark(&format!("m{i}"));
        }
        // Re-record m0 so its original log slot is dead
        dedup.mark("m0");
        for i in 4..9 {
            dedup.mark(&format!("m{i}"));
        }
        // Trim ran; m0's live record is recent so it must survive
        assert!(dedup.len() <= 6);
        assert!(dedup.contains("m0"));
    }
}
