// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{ClassicCache, LruCache, NoCache, OutputCache, RamPressureCache};
use crate::config::{CacheConfig, CachePolicy};
use std::sync::Arc;

/// Factory for creating the configured output cache.
///
/// Unset bounds fall back to the defaults in `config::consts`.
pub struct CacheFactory;

impl CacheFactory {
    pub fn from_config(cfg: &CacheConfig) -> Arc<dyn OutputCache> {
        match cfg.policy {
            CachePolicy::None => Arc::new(NoCache::new()),
            CachePolicy::Classic => Arc::new(ClassicCache::new()),
            CachePolicy::Lru => Arc::new(LruCache::new(cfg.get_capacity())),
            CachePolicy::RamPressure => Arc::new(RamPressureCache::new(
                cfg.get_ceiling_bytes(),
                cfg.order,
            )),
        }
    }
}
