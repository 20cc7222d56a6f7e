// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The per-submission prompt overlay that absorbs dynamic expansions.
//!
//! A node may return an [`Expansion`] instead of outputs: a small prompt of new
//! nodes plus a mapping from each of its own outputs to a value or to an output
//! of one of the new nodes. [`DynamicPrompt::expand`] namespaces the new nodes as
//! `"<parent>.<local>"`, rewrites their links, and records where they came from.
//! The submitted prompt itself is never modified.

use crate::errors::ExpansionError;
use crate::graph::cycles::{find_cycle, Adjacency};
use crate::graph::prompt::{InputValue, Link, NodeId, Prompt, PromptNode};
use std::collections::HashMap;
use std::sync::Arc;

/// Nodes and output mapping returned by an expanding node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// New nodes, keyed by ids local to this expansion
    pub nodes: Prompt,
    /// One entry per declared output of the expanding node; links name local ids
    pub outputs: Vec<InputValue>,
}

impl Expansion {
    pub fn new(nodes: Prompt, outputs: Vec<InputValue>) -> Self {
        Self { nodes, outputs }
    }
}

/// An expansion after it has been spliced into the dynamic prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct SplicedExpansion {
    /// Ids of the injected nodes in expansion order
    pub node_ids: Vec<NodeId>,
    /// The parent's output mapping with links rewritten to global ids
    pub outputs: Vec<InputValue>,
}

#[derive(Debug, Clone)]
pub struct DynamicPrompt {
    original: Arc<Prompt>,
    ephemeral: HashMap<NodeId, PromptNode>,
    parents: HashMap<NodeId, NodeId>,
    display: HashMap<NodeId, NodeId>,
}

impl DynamicPrompt {
    pub fn new(original: Arc<Prompt>) -> Self {
        Self {
            original,
            ephemeral: HashMap::new(),
            parents: HashMap::new(),
            display: HashMap::new(),
        }
    }

    pub fn original(&self) -> &Prompt {
        &self.original
    }

    pub fn get_node(&self, id: &str) -> Option<&PromptNode> {
        self.original.get(id).or_else(|| self.ephemeral.get(id))
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.original.contains(id) || self.ephemeral.contains_key(id)
    }

    pub fn is_ephemeral(&self, id: &str) -> bool {
        self.ephemeral.contains_key(id)
    }

    /// The node whose expansion injected `id`.
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// The user-visible original node that `id` is reported under.
    pub fn display_node<'a>(&'a self, id: &'a str) -> &'a str {
        self.display.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Splice `expansion`, produced by node `parent`, into the prompt.
    ///
    /// Every link inside the expansion must name either another node of the same
    /// expansion or a node already in the prompt, and must not point back at
    /// `parent`. The injected nodes must not form a cycle among themselves.
    pub fn expand(
        &mut self,
        parent: &str,
        expansion: Expansion,
    ) -> Result<SplicedExpansion, ExpansionError> {
        let rename: HashMap<&str, NodeId> = expansion
            .nodes
            .ids()
            .map(|local| (local.as_str(), format!("{}.{}", parent, local)))
            .collect();

        for global in rename.values() {
            if self.has_node(global) {
                return Err(ExpansionError::IdCollision {
                    node_id: global.clone(),
                });
            }
        }

        let resolve = |link: &Link| -> Option<Link> {
            match rename.get(link.node_id()) {
                Some(global) => Some(Link::new(global.clone(), link.output())),
                None if self.has_node(link.node_id()) => Some(link.clone()),
                None => None,
            }
        };

        let mut injected = Vec::with_capacity(rename.len());
        for (local, node) in expansion.nodes.iter() {
            let global = rename[local.as_str()].clone();
            let mut rewritten = PromptNode::new(node.class_type.clone());
            for (slot, value) in &node.inputs {
                let value = match value {
                    InputValue::Link(link) => {
                        if link.node_id() == parent {
                            return Err(ExpansionError::SelfReference { node_id: global });
                        }
                        let resolved = resolve(link).ok_or_else(|| ExpansionError::UnresolvedLink {
                            node_id: global.clone(),
                            input: slot.clone(),
                            missing: link.node_id().to_string(),
                        })?;
                        InputValue::Link(resolved)
                    }
                    literal => literal.clone(),
                };
                rewritten.inputs.insert(slot.clone(), value);
            }
            injected.push((global, rewritten));
        }

        let adjacency: Adjacency = injected
            .iter()
            .map(|(id, node)| {
                (
                    id.as_str(),
                    node.links().map(|(_, link)| link.node_id()).collect(),
                )
            })
            .collect();
        if let Some(cycle) = find_cycle(injected.iter().map(|(id, _)| id.as_str()), &adjacency) {
            return Err(ExpansionError::Cycle { cycle });
        }

        let mut outputs = Vec::with_capacity(expansion.outputs.len());
        for value in &expansion.outputs {
            outputs.push(match value {
                InputValue::Link(link) => {
                    InputValue::Link(resolve(link).ok_or_else(|| ExpansionError::UnresolvedLink {
                        node_id: parent.to_string(),
                        input: format!("output {}", link.output()),
                        missing: link.node_id().to_string(),
                    })?)
                }
                literal => literal.clone(),
            });
        }

        let display = self.display_node(parent).to_string();
        let mut node_ids = Vec::with_capacity(injected.len());
        for (id, node) in injected {
            self.parents.insert(id.clone(), parent.to_string());
            self.display.insert(id.clone(), display.clone());
            self.ephemeral.insert(id.clone(), node);
            node_ids.push(id);
        }

        Ok(SplicedExpansion { node_ids, outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DynamicPrompt {
        let prompt = Prompt::new()
            .with_node("1", PromptNode::new("String").with_literal("value", "a"))
            .with_node(
                "2",
                PromptNode::new("Repeat")
                    .with_link("value", "1", 0)
                    .with_literal("count", 3),
            );
        DynamicPrompt::new(Arc::new(prompt))
    }

    fn chain() -> Expansion {
        let nodes = Prompt::new()
            .with_node(
                "c0",
                PromptNode::new("Concat")
                    .with_literal("a", "a")
                    .with_link("b", "1", 0),
            )
            .with_node(
                "c1",
                PromptNode::new("Concat")
                    .with_link("a", "c0", 0)
                    .with_literal("b", "a"),
            );
        Expansion::new(nodes, vec![InputValue::link("c1", 0)])
    }

    #[test]
    fn test_expand_namespaces_and_rewrites_links() {
        let mut dynamic = base();
        let spliced = dynamic.expand("2", chain()).unwrap();

        assert_eq!(spliced.node_ids, vec!["2.c0", "2.c1"]);
        assert_eq!(spliced.outputs, vec![InputValue::link("2.c1", 0)]);

        let c1 = dynamic.get_node("2.c1").unwrap();
        assert_eq!(c1.inputs["a"], InputValue::link("2.c0", 0));
        let c0 = dynamic.get_node("2.c0").unwrap();
        assert_eq!(c0.inputs["b"], InputValue::link("1", 0));

        assert!(dynamic.is_ephemeral("2.c0"));
        assert!(!dynamic.is_ephemeral("2"));
        assert_eq!(dynamic.parent_of("2.c0"), Some("2"));
        assert_eq!(dynamic.display_node("2.c1"), "2");
        assert_eq!(dynamic.display_node("1"), "1");
    }

    #[test]
    fn test_nested_expansion_displays_original_ancestor() {
        let mut dynamic = base();
        dynamic.expand("2", chain()).unwrap();
        let inner = Expansion::new(
            Prompt::new().with_node("x", PromptNode::new("String").with_literal("value", "b")),
            vec![InputValue::link("x", 0)],
        );
        let spliced = dynamic.expand("2.c1", inner).unwrap();

        assert_eq!(spliced.node_ids, vec!["2.c1.x"]);
        assert_eq!(dynamic.parent_of("2.c1.x"), Some("2.c1"));
        assert_eq!(dynamic.display_node("2.c1.x"), "2");
    }

    #[test]
    fn test_unresolved_link_is_rejected() {
        let mut dynamic = base();
        let expansion = Expansion::new(
            Prompt::new().with_node("a", PromptNode::new("Concat").with_link("a", "nope", 0)),
            vec![],
        );
        let err = dynamic.expand("2", expansion).unwrap_err();
        assert!(matches!(err, ExpansionError::UnresolvedLink { missing, .. } if missing == "nope"));
        assert!(!dynamic.has_node("2.a"));
    }

    #[test]
    fn test_link_back_to_parent_is_rejected() {
        let mut dynamic = base();
        let expansion = Expansion::new(
            Prompt::new().with_node("a", PromptNode::new("Concat").with_link("a", "2", 0)),
            vec![],
        );
        assert!(matches!(
            dynamic.expand("2", expansion),
            Err(ExpansionError::SelfReference { .. })
        ));
    }

    #[test]
    fn test_cycle_inside_expansion_is_rejected() {
        let mut dynamic = base();
        let expansion = Expansion::new(
            Prompt::new()
                .with_node("a", PromptNode::new("Concat").with_link("a", "b", 0))
                .with_node("b", PromptNode::new("Concat").with_link("a", "a", 0)),
            vec![],
        );
        assert!(matches!(
            dynamic.expand("2", expansion),
            Err(ExpansionError::Cycle { .. })
        ));
    }

    #[test]
    fn test_repeated_expansion_collides() {
        let mut dynamic = base();
        dynamic.expand("2", chain()).unwrap();
        assert!(matches!(
            dynamic.expand("2", chain()),
            Err(ExpansionError::IdCollision { .. })
        ));
    }
}
