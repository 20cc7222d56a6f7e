// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Output caches keyed by node fingerprints.
//!
//! Every policy sits behind [`OutputCache`]; the executor only ever calls
//! `get`, `put`, `evict_if_needed` and `retain_for_submission`. Which entries
//! survive, and for how long, is entirely the policy's business:
//!
//! | Policy | Bound | Evicts |
//! |--------|-------|--------|
//! | [`NoCache`] | nothing stored | - |
//! | [`ClassicCache`] | current submission's live set | anything the submission no longer reaches |
//! | [`LruCache`] | entry count | least recently accessed |
//! | [`RamPressureCache`] | summed footprint | oldest inserted or least recently accessed |

pub mod classic;
pub mod factory;
pub mod lru;
pub mod none;
pub mod ram_pressure;

pub use classic::ClassicCache;
pub use factory::CacheFactory;
pub use lru::LruCache;
pub use none::NoCache;
pub use ram_pressure::RamPressureCache;

use crate::traits::NodeOutput;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Hex SHA-256 over a node's type, literal inputs and upstream fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex digits, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached node result and its estimated size.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutput {
    pub output: Arc<NodeOutput>,
    pub footprint: usize,
}

impl CachedOutput {
    pub fn new(output: Arc<NodeOutput>, footprint: usize) -> Self {
        Self { output, footprint }
    }
}

/// Running counters kept by every policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    /// Entries refused outright because they could never fit
    pub rejected: u64,
}

/// Store for node outputs shared across submissions.
///
/// Implementations are called from the worker and from any thread holding the
/// service, so they guard their state internally.
pub trait OutputCache: Send + Sync {
    /// Policy name for logs and stats.
    fn name(&self) -> &'static str;

    fn get(&self, fingerprint: &Fingerprint) -> Option<CachedOutput>;

    fn put(&self, fingerprint: Fingerprint, entry: CachedOutput);

    /// Bring the store back within its bound.
    fn evict_if_needed(&self);

    /// Called once at the start of every submission with the fingerprints of the
    /// nodes it contains.
    fn retain_for_submission(&self, _live: &HashSet<Fingerprint>) {}

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;

    fn clear(&self);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::json;

    pub fn fp(n: usize) -> Fingerprint {
        Fingerprint::new(format!("{:064x}", n))
    }

    pub fn entry(n: i64, footprint: usize) -> CachedOutput {
        CachedOutput::new(Arc::new(NodeOutput::single(json!(n))), footprint)
    }
}
