// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for output cache eviction and admission.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Entry evicted to respect a policy's bound.
///
/// # Log Level
/// `debug!` - High volume under memory pressure
pub struct CacheEntryEvicted<'a> {
    pub policy: &'a str,
    pub fingerprint: &'a str,
    pub footprint: usize,
}

impl Display for CacheEntryEvicted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} cache evicted {} ({} bytes)",
            self.policy, self.fingerprint, self.footprint
        )
    }
}

impl StructuredLog for CacheEntryEvicted<'_> {
    fn log(&self) {
        tracing::debug!(
            policy = self.policy,
            fingerprint = self.fingerprint,
            footprint = self.footprint,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("cache_evict", span_name = name, policy = self.policy)
    }
}

/// Entry refused because it alone exceeds the memory ceiling.
///
/// # Log Level
/// `warn!` - The node will re-execute every time
pub struct CacheEntryRejected<'a> {
    pub fingerprint: &'a str,
    pub footprint: usize,
    pub ceiling: usize,
}

impl Display for CacheEntryRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Not caching {}: footprint {} exceeds ceiling {}",
            self.fingerprint, self.footprint, self.ceiling
        )
    }
}

impl StructuredLog for CacheEntryRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            fingerprint = self.fingerprint,
            footprint = self.footprint,
            ceiling = self.ceiling,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("cache_reject", span_name = name)
    }
}

/// Entries no longer reachable from the current submission were dropped.
pub struct CachePruned<'a> {
    pub policy: &'a str,
    pub removed: usize,
    pub retained: usize,
}

impl Display for CachePruned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} cache pruned {} entries, {} retained",
            self.policy, self.removed, self.retained
        )
    }
}

impl StructuredLog for CachePruned<'_> {
    fn log(&self) {
        tracing::debug!(
            policy = self.policy,
            removed = self.removed,
            retained = self.retained,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("cache_prune", span_name = name, policy = self.policy)
    }
}
