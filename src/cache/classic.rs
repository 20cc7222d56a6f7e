// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{CacheStats, CachedOutput, Fingerprint, OutputCache};
use crate::observability::messages::cache::CachePruned;
use crate::observability::messages::StructuredLog;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Keeps whatever the current submission can still reach.
///
/// There is no global bound. When a submission starts, its fingerprints become
/// the live set; anything put while it runs joins the set, and everything else
/// is pruned by `evict_if_needed`. Consecutive submissions that share a prefix
/// reuse its outputs, while outputs of abandoned branches are dropped.
#[derive(Debug, Default)]
pub struct ClassicCache {
    state: Mutex<ClassicState>,
}

#[derive(Debug, Default)]
struct ClassicState {
    entries: HashMap<Fingerprint, CachedOutput>,
    live: Option<HashSet<Fingerprint>>,
    stats: CacheStats,
}

impl ClassicCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputCache for ClassicCache {
    fn name(&self) -> &'static str {
        "classic"
    }

    fn get(&self, fingerprint: &Fingerprint) -> Option<CachedOutput> {
        let mut state = self.state.lock();
        match state.entries.get(fingerprint).cloned() {
            Some(entry) => {
                state.stats.hits += 1;
                Some(entry)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    fn put(&self, fingerprint: Fingerprint, entry: CachedOutput) {
        let mut state = self.state.lock();
        if let Some(live) = state.live.as_mut() {
            live.insert(fingerprint.clone());
        }
        state.entries.insert(fingerprint, entry);
        state.stats.inserts += 1;
    }

    fn evict_if_needed(&self) {
        let mut state = self.state.lock();
        let ClassicState {
            entries,
            live,
            stats,
        } = &mut *state;
        let Some(live) = live.as_ref() else {
            return;
        };

        let before = entries.len();
        entries.retain(|fingerprint, _| live.contains(fingerprint));
        let removed = before - entries.len();
        if removed > 0 {
            stats.evictions += removed as u64;
            CachePruned {
                policy: "classic",
                removed,
                retained: entries.len(),
            }
            .log();
        }
    }

    fn retain_for_submission(&self, live: &HashSet<Fingerprint>) {
        self.state.lock().live = Some(live.clone());
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
        state.live = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{entry, fp};

    #[test]
    fn test_keeps_everything_until_a_submission_declares_its_live_set() {
        let cache = ClassicCache::new();
        for n in 0..5 {
            cache.put(fp(n), entry(n as i64, 8));
        }
        cache.evict_if_needed();
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn test_prunes_entries_outside_the_live_set() {
        let cache = ClassicCache::new();
        for n in 0..4 {
            cache.put(fp(n), entry(n as i64, 8));
        }

        let live: HashSet<_> = [fp(1), fp(3)].into_iter().collect();
        cache.retain_for_submission(&live);
        cache.evict_if_needed();

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&fp(1)).is_some());
        assert!(cache.get(&fp(0)).is_none());
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_entries_put_during_the_submission_survive_pruning() {
        let cache = ClassicCache::new();
        cache.retain_for_submission(&[fp(1)].into_iter().collect());
        cache.put(fp(9), entry(9, 8));
        cache.evict_if_needed();

        assert!(cache.get(&fp(9)).is_some());
    }
}
