// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{CacheFactory, OutputCache};
use crate::config::{EngineConfig, NodeRegistry};
use crate::nodes::builtin_registry;
use crate::queue::PromptQueue;
use std::sync::Arc;

/// Runtime builder - assembles the node registry, output cache and prompt
/// queue described by an [`EngineConfig`].
///
/// # Examples
///
/// ```
/// use promptwood::cache::OutputCache;
/// use promptwood::config::{EngineConfig, RuntimeBuilder};
///
/// let (registry, cache, queue) = RuntimeBuilder::from_config(&EngineConfig::default());
///
/// assert!(registry.contains("Preview"));
/// assert_eq!(cache.name(), "classic");
/// assert_eq!(queue.history_capacity(), 10_000);
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build the runtime pieces from configuration.
    ///
    /// Returns the built-in node registry, the configured cache policy, and a
    /// queue with the configured history capacity.
    pub fn from_config(cfg: &EngineConfig) -> (NodeRegistry, Arc<dyn OutputCache>, PromptQueue) {
        let registry = builtin_registry();
        let cache = CacheFactory::from_config(&cfg.cache);
        let queue = PromptQueue::new(cfg.queue.get_history_capacity());
        (registry, cache, queue)
    }
}
