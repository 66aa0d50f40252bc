// src/seen_cache.rs
//
// Seen-Cache (component C): a process-wide bounded, TTL-expiring set of
// certificate fingerprints used to deduplicate across Monitors. Generalizes
// the teacher's plain `Dedupe` (an unbounded `HashSet` behind a mutex) with
// the size and age bounds the specification requires.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Inner {
    maxsize: usize,
    ttl: Duration,
    /// fingerprint -> (insertion order sequence number, insertion time)
    entries: HashMap<String, (u64, Instant)>,
    next_seq: u64,
}

impl Inner {
    fn evict_expired(&mut self, now: Instant) {
        self.entries
            .retain(|_, (_, inserted_at)| now.duration_since(*inserted_at) < self.ttl);
    }

    fn evict_lru_if_over_capacity(&mut self) {
        while self.entries.len() > self.maxsize {
            if let Some(oldest_fp) = self
                .entries
                .iter()
                .min_by_key(|(_, (seq, _))| *seq)
                .map(|(fp, _)| fp.clone())
            {
                self.entries.remove(&oldest_fp);
            } else {
                break;
            }
        }
    }
}

/// Process-wide deduplication cache. Cloning shares the same underlying
/// state (cheap `Arc`-style sharing), matching how every Monitor is handed
/// the same cache instance.
#[derive(Clone)]
pub struct SeenCache {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl SeenCache {
    pub fn new(maxsize: usize, ttl: Duration) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(Inner {
                maxsize,
                ttl,
                entries: HashMap::new(),
                next_seq: 0,
            })),
        }
    }

    /// Atomic check-and-insert: returns `true` if this fingerprint is new
    /// (and has now been recorded), `false` if it was already present and
    /// unexpired. This is the only operation Monitors should use — it
    /// closes the gap between a separate `contains` and `insert` that the
    /// concurrency model forbids.
    pub fn check_and_insert(&self, fingerprint: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        guard.evict_expired(now);

        if guard.entries.contains_key(fingerprint) {
            return false;
        }

        let seq = guard.next_seq;
        guard.next_seq += 1;
        guard.entries.insert(fingerprint.to_string(), (seq, now));
        guard.evict_lru_if_over_capacity();
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_is_new_second_is_duplicate() {
        let cache = SeenCache::new(10, Duration::from_secs(3600));
        assert!(cache.check_and_insert("AA"));
        assert!(!cache.check_and_insert("AA"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_bound_evicts_least_recently_inserted() {
        let cache = SeenCache::new(2, Duration::from_secs(3600));
        assert!(cache.check_and_insert("A"));
        assert!(cache.check_and_insert("B"));
        assert!(cache.check_and_insert("C"));
        assert_eq!(cache.len(), 2);
        // "A" should have been evicted as the oldest entry.
        assert!(cache.check_and_insert("A"));
    }

    #[test]
    fn ttl_expiry_allows_reinsertion() {
        let cache = SeenCache::new(10, Duration::from_millis(10));
        assert!(cache.check_and_insert("A"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.check_and_insert("A"));
    }

    #[test]
    fn clone_shares_underlying_state() {
        let cache = SeenCache::new(10, Duration::from_secs(3600));
        let clone = cache.clone();
        assert!(cache.check_and_insert("A"));
        assert!(!clone.check_and_insert("A"));
    }
}
