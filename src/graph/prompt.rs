// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The immutable prompt graph as submitted by a client.
//!
//! A prompt is a JSON object mapping node ids to `{ "class_type", "inputs" }`.
//! Inputs are either literal JSON values or links in the wire form
//! `["<node id>", <output index>]`. Node order follows the submitted object and
//! is used as the scheduler's tie-break.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

pub type NodeId = String;

/// Reference to output `1` of node `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link(pub NodeId, pub usize);

impl Link {
    pub fn new(node_id: impl Into<NodeId>, output: usize) -> Self {
        Link(node_id.into(), output)
    }

    pub fn node_id(&self) -> &str {
        &self.0
    }

    pub fn output(&self) -> usize {
        self.1
    }
}

/// A node input: a link to another node's output or a literal value.
///
/// Links are tried first, so a two-element array of `[string, integer]` is
/// always read as a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(Link),
    Literal(Value),
}

impl InputValue {
    pub fn link(node_id: impl Into<NodeId>, output: usize) -> Self {
        InputValue::Link(Link::new(node_id, output))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        InputValue::Literal(value.into())
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            InputValue::Link(link) => Some(link),
            InputValue::Literal(_) => None,
        }
    }
}

/// One node of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputValue>,
}

impl PromptNode {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: BTreeMap::new(),
        }
    }

    /// Builder-style literal input.
    pub fn with_literal(mut self, slot: &str, value: impl Into<Value>) -> Self {
        self.inputs
            .insert(slot.to_string(), InputValue::literal(value));
        self
    }

    /// Builder-style link input.
    pub fn with_link(mut self, slot: &str, node_id: &str, output: usize) -> Self {
        self.inputs
            .insert(slot.to_string(), InputValue::link(node_id, output));
        self
    }

    /// Iterate over `(slot, link)` pairs.
    pub fn links(&self) -> impl Iterator<Item = (&str, &Link)> {
        self.inputs
            .iter()
            .filter_map(|(slot, value)| value.as_link().map(|link| (slot.as_str(), link)))
    }
}

/// An ordered set of nodes keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Prompt {
    nodes: Vec<(NodeId, PromptNode)>,
    index: HashMap<NodeId, usize>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any node already registered under `id`.
    pub fn insert(&mut self, id: impl Into<NodeId>, node: PromptNode) {
        let id = id.into();
        match self.index.get(&id) {
            Some(&position) => self.nodes[position].1 = node,
            None => {
                self.index.insert(id.clone(), self.nodes.len());
                self.nodes.push((id, node));
            }
        }
    }

    pub fn with_node(mut self, id: impl Into<NodeId>, node: PromptNode) -> Self {
        self.insert(id, node);
        self
    }

    pub fn get(&self, id: &str) -> Option<&PromptNode> {
        self.index.get(id).map(|&position| &self.nodes[position].1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of the node in submission order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &PromptNode)> {
        self.nodes.iter().map(|(id, node)| (id, node))
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parse a prompt from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl TryFrom<Map<String, Value>> for Prompt {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut prompt = Prompt::new();
        for (id, value) in map {
            let node: PromptNode = serde_json::from_value(value)?;
            prompt.insert(id, node);
        }
        Ok(prompt)
    }
}

impl From<Prompt> for Map<String, Value> {
    fn from(prompt: Prompt) -> Self {
        prompt
            .nodes
            .into_iter()
            .filter_map(|(id, node)| serde_json::to_value(node).ok().map(|value| (id, value)))
            .collect()
    }
}
