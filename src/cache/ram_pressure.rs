// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{CacheStats, CachedOutput, Fingerprint, OutputCache};
use crate::config::EvictionOrder;
use crate::observability::messages::cache::{CacheEntryEvicted, CacheEntryRejected};
use crate::observability::messages::StructuredLog;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Global store bounded by the summed footprint of its entries.
///
/// Footprints come from the node capability's estimate; the cache never
/// measures values itself. Room is made before a new entry is accounted, so
/// the total never exceeds the ceiling, and an entry bigger than the whole
/// ceiling is refused.
#[derive(Debug)]
pub struct RamPressureCache {
    ceiling: usize,
    order: EvictionOrder,
    state: Mutex<PressureState>,
}

#[derive(Debug, Default)]
struct PressureState {
    entries: HashMap<Fingerprint, PressureEntry>,
    /// Victim order: insertion tick or last-access tick depending on policy
    queue: BTreeMap<u64, Fingerprint>,
    used: usize,
    clock: u64,
    stats: CacheStats,
}

#[derive(Debug)]
struct PressureEntry {
    value: CachedOutput,
    tick: u64,
}

impl PressureState {
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, fingerprint: &Fingerprint) -> Option<PressureEntry> {
        let entry = self.entries.remove(fingerprint)?;
        self.queue.remove(&entry.tick);
        self.used -= entry.value.footprint;
        Some(entry)
    }

    /// Evict victims until `incoming` more bytes fit under `ceiling`.
    fn make_room(&mut self, incoming: usize, ceiling: usize) {
        while self.used + incoming > ceiling {
            let Some((_, victim)) = self.queue.pop_first() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&victim) {
                self.used -= evicted.value.footprint;
                self.stats.evictions += 1;
                CacheEntryEvicted {
                    policy: "ram_pressure",
                    fingerprint: victim.short(),
                    footprint: evicted.value.footprint,
                }
                .log();
            }
        }
    }
}

impl RamPressureCache {
    pub fn new(ceiling: usize, order: EvictionOrder) -> Self {
        Self {
            ceiling,
            order,
            state: Mutex::new(PressureState::default()),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Bytes currently accounted to cached entries.
    pub fn used(&self) -> usize {
        self.state.lock().used
    }
}

impl OutputCache for RamPressureCache {
    fn name(&self) -> &'static str {
        "ram_pressure"
    }

    fn get(&self, fingerprint: &Fingerprint) -> Option<CachedOutput> {
        let mut state = self.state.lock();
        let Some(old_tick) = state.entries.get(fingerprint).map(|entry| entry.tick) else {
            state.stats.misses += 1;
            return None;
        };
        state.stats.hits += 1;

        if self.order == EvictionOrder::Lru {
            let tick = state.next_tick();
            state.queue.remove(&old_tick);
            state.queue.insert(tick, fingerprint.clone());
            if let Some(entry) = state.entries.get_mut(fingerprint) {
                entry.tick = tick;
            }
        }
        state.entries.get(fingerprint).map(|entry| entry.value.clone())
    }

    fn put(&self, fingerprint: Fingerprint, entry: CachedOutput) {
        let mut state = self.state.lock();
        if entry.footprint > self.ceiling {
            state.stats.rejected += 1;
            CacheEntryRejected {
                fingerprint: fingerprint.short(),
                footprint: entry.footprint,
                ceiling: self.ceiling,
            }
            .log();
            return;
        }

        state.remove(&fingerprint);
        state.make_room(entry.footprint, self.ceiling);

        let tick = state.next_tick();
        state.used += entry.footprint;
        state.queue.insert(tick, fingerprint.clone());
        state.entries.insert(fingerprint, PressureEntry { value: entry, tick });
        state.stats.inserts += 1;
    }

    fn evict_if_needed(&self) {
        self.state.lock().make_room(0, self.ceiling);
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
        state.queue.clear();
        state.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{entry, fp};

    #[test]
    fn test_footprint_never_exceeds_ceiling() {
        let cache = RamPressureCache::new(100, EvictionOrder::Insertion);
        let sizes = [40, 30, 50, 10, 90, 5, 60, 25, 100, 1];
        for (n, size) in sizes.iter().enumerate() {
            cache.put(fp(n), entry(n as i64, *size));
            assert!(
                cache.used() <= cache.ceiling(),
                "used {} after put #{}",
                cache.used(),
                n
            );
        }
    }

    #[test]
    fn test_insertion_order_evicts_oldest_even_if_recently_read() {
        let cache = RamPressureCache::new(100, EvictionOrder::Insertion);
        cache.put(fp(0), entry(0, 40));
        cache.put(fp(1), entry(1, 40));
        assert!(cache.get(&fp(0)).is_some());

        cache.put(fp(2), entry(2, 40));

        assert!(cache.get(&fp(0)).is_none());
        assert!(cache.get(&fp(1)).is_some());
        assert!(cache.get(&fp(2)).is_some());
        assert_eq!(cache.used(), 80);
    }

    #[test]
    fn test_lru_order_spares_recently_read() {
        let cache = RamPressureCache::new(100, EvictionOrder::Lru);
        cache.put(fp(0), entry(0, 40));
        cache.put(fp(1), entry(1, 40));
        assert!(cache.get(&fp(0)).is_some());

        cache.put(fp(2), entry(2, 40));

        assert!(cache.get(&fp(0)).is_some());
        assert!(cache.get(&fp(1)).is_none());
    }

    #[test]
    fn test_oversized_entry_is_refused_without_evicting() {
        let cache = RamPressureCache::new(100, EvictionOrder::Insertion);
        cache.put(fp(0), entry(0, 60));
        cache.put(fp(1), entry(1, 101));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fp(0)).is_some());
        assert_eq!(cache.stats().rejected, 1);
    }

    #[test]
    fn test_reput_releases_old_footprint_first() {
        let cache = RamPressureCache::new(100, EvictionOrder::Insertion);
        cache.put(fp(0), entry(0, 30));
        cache.put(fp(1), entry(1, 60));
        cache.put(fp(1), entry(1, 70));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.used(), 100);
    }
}
