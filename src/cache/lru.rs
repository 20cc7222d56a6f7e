// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{CacheStats, CachedOutput, Fingerprint, OutputCache};
use crate::observability::messages::cache::CacheEntryEvicted;
use crate::observability::messages::StructuredLog;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Global store bounded by entry count, evicting the least recently accessed.
///
/// Recency is a monotonically increasing tick. `recency` maps tick to
/// fingerprint so the oldest entry is always the first key.
#[derive(Debug)]
pub struct LruCache {
    capacity: usize,
    state: Mutex<LruState>,
}

#[derive(Debug, Default)]
struct LruState {
    entries: HashMap<Fingerprint, LruEntry>,
    recency: BTreeMap<u64, Fingerprint>,
    clock: u64,
    stats: CacheStats,
}

#[derive(Debug)]
struct LruEntry {
    value: CachedOutput,
    tick: u64,
}

impl LruState {
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, fingerprint: &Fingerprint) {
        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(fingerprint) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, fingerprint.clone());
        }
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some((_, victim)) = self.recency.pop_first() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&victim) {
                self.stats.evictions += 1;
                CacheEntryEvicted {
                    policy: "lru",
                    fingerprint: victim.short(),
                    footprint: evicted.value.footprint,
                }
                .log();
            }
        }
    }
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl OutputCache for LruCache {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn get(&self, fingerprint: &Fingerprint) -> Option<CachedOutput> {
        let mut state = self.state.lock();
        let hit = state.entries.get(fingerprint).map(|entry| entry.value.clone());
        match hit {
            Some(value) => {
                state.stats.hits += 1;
                state.touch(fingerprint);
                Some(value)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    fn put(&self, fingerprint: Fingerprint, entry: CachedOutput) {
        let mut state = self.state.lock();
        let tick = state.next_tick();
        if let Some(previous) = state.entries.insert(
            fingerprint.clone(),
            LruEntry { value: entry, tick },
        ) {
            state.recency.remove(&previous.tick);
        }
        state.recency.insert(tick, fingerprint);
        state.stats.inserts += 1;
        state.evict_to(self.capacity);
    }

    fn evict_if_needed(&self) {
        self.state.lock().evict_to(self.capacity);
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{entry, fp};

    #[test]
    fn test_overflow_evicts_exactly_the_least_recent() {
        let cache = LruCache::new(3);
        for n in 0..4 {
            cache.put(fp(n), entry(n as i64, 8));
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&fp(0)).is_none());
        for n in 1..4 {
            assert!(cache.get(&fp(n)).is_some(), "entry {} should survive", n);
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = LruCache::new(3);
        for n in 0..3 {
            cache.put(fp(n), entry(n as i64, 8));
        }

        assert!(cache.get(&fp(0)).is_some());
        cache.put(fp(3), entry(3, 8));

        assert!(cache.get(&fp(0)).is_some());
        assert!(cache.get(&fp(1)).is_none());
        assert!(cache.get(&fp(2)).is_some());
    }

    #[test]
    fn test_reput_does_not_grow_the_store() {
        let cache = LruCache::new(2);
        cache.put(fp(0), entry(0, 8));
        cache.put(fp(1), entry(1, 8));
        cache.put(fp(0), entry(10, 8));

        assert_eq!(cache.len(), 2);
        let value = cache.get(&fp(0)).unwrap();
        assert_eq!(value.output.values[0], serde_json::json!(10));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = LruCache::new(0);
        cache.put(fp(0), entry(0, 8));
        assert!(cache.is_empty());
    }
}
