// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural cache keys.
//!
//! A node's fingerprint is the SHA-256 of its type tag, its literal inputs in
//! canonical JSON, and the fingerprint and output index behind every link. Node
//! ids never enter the hash, so identical subgraphs share keys across
//! submissions and between an original node and an ephemeral copy of it.

use crate::cache::Fingerprint;
use crate::config::NodeRegistry;
use crate::errors::ExecutionError;
use crate::graph::{DynamicPrompt, InputValue, NodeId};
use crate::traits::NodeInputs;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Memoizing fingerprint calculator scoped to one submission.
#[derive(Debug)]
pub struct Fingerprinter {
    /// Mixed into non-idempotent nodes so they never match a stored entry
    nonce: String,
    memo: HashMap<NodeId, Fingerprint>,
    visiting: HashSet<NodeId>,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::with_nonce(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_nonce(nonce: impl Into<String>) -> Self {
        Self {
            nonce: nonce.into(),
            memo: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Fingerprint> {
        self.memo.get(id)
    }

    pub fn fingerprint(
        &mut self,
        prompt: &DynamicPrompt,
        registry: &NodeRegistry,
        id: &str,
    ) -> Result<Fingerprint, ExecutionError> {
        if let Some(known) = self.memo.get(id) {
            return Ok(known.clone());
        }
        if !self.visiting.insert(id.to_string()) {
            return Err(ExecutionError::DependencyCycle(id.to_string()));
        }
        let computed = self.compute(prompt, registry, id);
        self.visiting.remove(id);

        let fingerprint = computed?;
        self.memo.insert(id.to_string(), fingerprint.clone());
        Ok(fingerprint)
    }

    fn compute(
        &mut self,
        prompt: &DynamicPrompt,
        registry: &NodeRegistry,
        id: &str,
    ) -> Result<Fingerprint, ExecutionError> {
        let node = prompt
            .get_node(id)
            .ok_or_else(|| ExecutionError::UnknownNode(id.to_string()))?;
        let capability = registry
            .get(&node.class_type)
            .ok_or_else(|| ExecutionError::NodeTypeNotRegistered(node.class_type.clone()))?;

        let mut hasher = Sha256::new();
        hasher.update(b"class_type\0");
        hasher.update(node.class_type.as_bytes());

        // Defaults count as literals so an omitted optional slot hashes the
        // same as one set to its default.
        let literals = literal_inputs(prompt, registry, id)?;
        let mut slots: BTreeMap<String, InputValue> = node.inputs.clone();
        for (slot, value) in literals.iter() {
            slots
                .entry(slot.clone())
                .or_insert_with(|| InputValue::Literal(value.clone()));
        }

        for (slot, value) in slots.iter() {
            hasher.update(b"\0input\0");
            hasher.update(slot.as_bytes());
            match value {
                InputValue::Link(link) => {
                    let upstream = self.fingerprint(prompt, registry, link.node_id())?;
                    hasher.update(b"\0link\0");
                    hasher.update(upstream.as_str().as_bytes());
                    hasher.update(link.output().to_le_bytes());
                }
                InputValue::Literal(literal) => {
                    hasher.update(b"\0literal\0");
                    hasher.update(canonical_json(literal).as_bytes());
                }
            }
        }

        if let Some(salt) = capability.fingerprint_salt(&literals) {
            hasher.update(b"\0salt\0");
            hasher.update(salt.as_bytes());
        }
        if !capability.idempotent() {
            hasher.update(b"\0nonce\0");
            hasher.update(self.nonce.as_bytes());
            hasher.update(id.as_bytes());
        }

        Ok(Fingerprint::new(hex(&hasher.finalize())))
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Literal inputs of `id` with declared defaults filled in for absent slots.
pub fn literal_inputs(
    prompt: &DynamicPrompt,
    registry: &NodeRegistry,
    id: &str,
) -> Result<NodeInputs, ExecutionError> {
    let node = prompt
        .get_node(id)
        .ok_or_else(|| ExecutionError::UnknownNode(id.to_string()))?;
    let capability = registry
        .get(&node.class_type)
        .ok_or_else(|| ExecutionError::NodeTypeNotRegistered(node.class_type.clone()))?;

    let mut inputs: NodeInputs = node
        .inputs
        .iter()
        .filter_map(|(slot, value)| match value {
            InputValue::Literal(literal) => Some((slot.clone(), literal.clone())),
            InputValue::Link(_) => None,
        })
        .collect();
    for spec in capability.inputs() {
        if let Some(default) = spec.default {
            if !node.inputs.contains_key(&spec.name) {
                inputs.insert(spec.name, default);
            }
        }
    }
    Ok(inputs)
}

/// JSON text with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Expansion, Prompt, PromptNode};
    use crate::nodes::builtin_registry;
    use serde_json::json;
    use std::sync::Arc;

    fn chain(first: i64) -> Prompt {
        Prompt::new()
            .with_node("1", PromptNode::new("Int").with_literal("value", first))
            .with_node("2", PromptNode::new("Int").with_literal("value", 10))
            .with_node(
                "3",
                PromptNode::new("Add").with_link("a", "1", 0).with_link("b", "2", 0),
            )
            .with_node("4", PromptNode::new("Preview").with_link("value", "3", 0))
    }

    fn all(prompt: Prompt) -> HashMap<String, Fingerprint> {
        let dynamic = DynamicPrompt::new(Arc::new(prompt));
        let registry = builtin_registry();
        let mut fingerprinter = Fingerprinter::with_nonce("n");
        ["1", "2", "3", "4"]
            .into_iter()
            .map(|id| {
                (
                    id.to_string(),
                    fingerprinter.fingerprint(&dynamic, &registry, id).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_identical_graphs_share_fingerprints() {
        assert_eq!(all(chain(1)), all(chain(1)));
    }

    #[test]
    fn test_literal_change_propagates_downstream_only() {
        let before = all(chain(1));
        let after = all(chain(2));

        assert_ne!(before["1"], after["1"]);
        assert_eq!(before["2"], after["2"]);
        assert_ne!(before["3"], after["3"]);
        assert_ne!(before["4"], after["4"]);
    }

    #[test]
    fn test_node_ids_do_not_affect_fingerprint() {
        let renamed = Prompt::new()
            .with_node("x", PromptNode::new("Int").with_literal("value", 1))
            .with_node("y", PromptNode::new("Int").with_literal("value", 10))
            .with_node(
                "z",
                PromptNode::new("Add").with_link("a", "x", 0).with_link("b", "y", 0),
            );
        let dynamic = DynamicPrompt::new(Arc::new(renamed));
        let mut fingerprinter = Fingerprinter::with_nonce("other");

        let z = fingerprinter
            .fingerprint(&dynamic, &builtin_registry(), "z")
            .unwrap();
        assert_eq!(z, all(chain(1))["3"]);
    }

    #[test]
    fn test_ephemeral_copy_matches_original() {
        let original = Prompt::new()
            .with_node("1", PromptNode::new("String").with_literal("value", "ab"))
            .with_node(
                "2",
                PromptNode::new("Concat")
                    .with_link("a", "1", 0)
                    .with_link("b", "1", 0),
            )
            .with_node(
                "3",
                PromptNode::new("Repeat")
                    .with_link("value", "1", 0)
                    .with_literal("count", 2),
            );
        let mut dynamic = DynamicPrompt::new(Arc::new(original));
        dynamic
            .expand(
                "3",
                Expansion::new(
                    Prompt::new().with_node(
                        "c",
                        PromptNode::new("Concat")
                            .with_link("a", "1", 0)
                            .with_link("b", "1", 0),
                    ),
                    vec![InputValue::link("c", 0)],
                ),
            )
            .unwrap();

        let registry = builtin_registry();
        let mut fingerprinter = Fingerprinter::new();
        assert_eq!(
            fingerprinter.fingerprint(&dynamic, &registry, "2").unwrap(),
            fingerprinter.fingerprint(&dynamic, &registry, "3.c").unwrap()
        );
    }

    #[test]
    fn test_non_idempotent_nodes_differ_per_submission() {
        let prompt = Prompt::new().with_node("1", PromptNode::new("Fail"));
        let dynamic = DynamicPrompt::new(Arc::new(prompt));
        let registry = builtin_registry();

        let first = Fingerprinter::new()
            .fingerprint(&dynamic, &registry, "1")
            .unwrap();
        let second = Fingerprinter::new()
            .fingerprint(&dynamic, &registry, "1")
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_defaults_hash_like_explicit_values() {
        let implicit = Prompt::new().with_node(
            "1",
            PromptNode::new("Concat")
                .with_literal("a", "x")
                .with_literal("b", "y"),
        );
        let explicit = Prompt::new().with_node(
            "1",
            PromptNode::new("Concat")
                .with_literal("a", "x")
                .with_literal("b", "y")
                .with_literal("separator", ""),
        );
        let registry = builtin_registry();
        let fp = |prompt: Prompt| {
            Fingerprinter::with_nonce("n")
                .fingerprint(&DynamicPrompt::new(Arc::new(prompt)), &registry, "1")
                .unwrap()
        };

        assert_eq!(fp(implicit), fp(explicit));
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"d": [1, {"y": 2, "x": 1}], "c": null}});
        assert_eq!(
            canonical_json(&a),
            r#"{"a":{"c":null,"d":[1,{"x":1,"y":2}]},"b":1}"#
        );
    }
}
