// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::traits::NodeCapability;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps `class_type` tags to node capabilities.
///
/// Built once at startup and shared by `Arc` with validation and the executor;
/// there is no global registry.
#[derive(Clone, Default)]
pub struct NodeRegistry(HashMap<String, Arc<dyn NodeCapability>>);

impl NodeRegistry {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Register a capability under its own `class_type`, replacing any
    /// capability previously registered for that tag.
    pub fn register(&mut self, capability: Arc<dyn NodeCapability>) {
        self.0
            .insert(capability.class_type().to_string(), capability);
    }

    pub fn with(mut self, capability: Arc<dyn NodeCapability>) -> Self {
        self.register(capability);
        self
    }

    pub fn get(&self, class_type: &str) -> Option<&Arc<dyn NodeCapability>> {
        self.0.get(class_type)
    }

    pub fn contains(&self, class_type: &str) -> bool {
        self.0.contains_key(class_type)
    }

    /// Registered tags in sorted order.
    pub fn class_types(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.0.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("class_types", &self.class_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{AddNode, IntNode};

    #[test]
    fn test_register_by_class_type() {
        let registry = NodeRegistry::new()
            .with(Arc::new(IntNode))
            .with(Arc::new(AddNode));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("Int"));
        assert_eq!(registry.get("Add").unwrap().class_type(), "Add");
        assert!(registry.get("Missing").is_none());
        assert_eq!(registry.class_types(), vec!["Add", "Int"]);
    }

    #[test]
    fn test_reregistering_replaces() {
        let registry = NodeRegistry::new()
            .with(Arc::new(IntNode))
            .with(Arc::new(IntNode));
        assert_eq!(registry.len(), 1);
    }
}
