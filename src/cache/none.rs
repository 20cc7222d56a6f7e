// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{CacheStats, CachedOutput, Fingerprint, OutputCache};
use parking_lot::Mutex;

/// Stores nothing; every node re-executes on every submission.
#[derive(Debug, Default)]
pub struct NoCache {
    stats: Mutex<CacheStats>,
}

impl NoCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputCache for NoCache {
    fn name(&self) -> &'static str {
        "none"
    }

    fn get(&self, _fingerprint: &Fingerprint) -> Option<CachedOutput> {
        self.stats.lock().misses += 1;
        None
    }

    fn put(&self, _fingerprint: Fingerprint, _entry: CachedOutput) {}

    fn evict_if_needed(&self) {}

    fn len(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    fn clear(&self) {}
}
