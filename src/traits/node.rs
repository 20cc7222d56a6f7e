// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The capability contract every node type implements.
//!
//! The executor never knows what a node computes. It reads the declared slots to
//! validate and schedule, hands the resolved inputs to [`NodeCapability::invoke`],
//! and gets back either outputs or an [`Expansion`] to splice into the prompt.

use crate::engine::events::ExecutionEvent;
use crate::errors::NodeError;
use crate::graph::{Expansion, NodeId, SubmissionId};
use crate::traits::EventSink;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Slot type tag that matches any other type.
pub const ANY_TYPE: &str = "*";

/// A declared input slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSpec {
    pub name: String,
    pub kind: String,
    pub required: bool,
    /// Producer runs only when `check_lazy_status` asks for this slot
    pub lazy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl InputSpec {
    pub fn required(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            required: true,
            lazy: false,
            default: None,
        }
    }

    pub fn optional(name: &str, kind: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A declared output slot; its position is the link output index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSpec {
    pub name: String,
    pub kind: String,
}

impl OutputSpec {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Whether a value of type `actual` may feed a slot of type `expected`.
pub fn types_compatible(expected: &str, actual: &str) -> bool {
    expected == ANY_TYPE || actual == ANY_TYPE || expected == actual
}

/// Resolved input values handed to a node, keyed by slot name.
///
/// Unevaluated lazy slots and unconnected optional slots are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInputs(BTreeMap<String, Value>);

impl NodeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: impl Into<String>, value: Value) {
        self.0.insert(slot.into(), value);
    }

    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.0.get(slot)
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.0.contains_key(slot)
    }

    pub fn require(&self, slot: &str) -> Result<&Value, NodeError> {
        self.get(slot)
            .ok_or_else(|| NodeError::MissingInput(slot.to_string()))
    }

    pub fn require_f64(&self, slot: &str) -> Result<f64, NodeError> {
        self.require(slot)?
            .as_f64()
            .ok_or_else(|| NodeError::invalid(slot, "expected a number"))
    }

    pub fn require_i64(&self, slot: &str) -> Result<i64, NodeError> {
        self.require(slot)?
            .as_i64()
            .ok_or_else(|| NodeError::invalid(slot, "expected an integer"))
    }

    pub fn require_str(&self, slot: &str) -> Result<&str, NodeError> {
        self.require(slot)?
            .as_str()
            .ok_or_else(|| NodeError::invalid(slot, "expected a string"))
    }

    pub fn require_bool(&self, slot: &str) -> Result<bool, NodeError> {
        self.require(slot)?
            .as_bool()
            .ok_or_else(|| NodeError::invalid(slot, "expected a boolean"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for NodeInputs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        NodeInputs(iter.into_iter().collect())
    }
}

/// Values produced by one invocation, positionally matching `outputs()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeOutput {
    pub values: Vec<Value>,
    /// Payload surfaced in history when the node is an output node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<Value>,
}

impl NodeOutput {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, ui: None }
    }

    pub fn single(value: impl Into<Value>) -> Self {
        Self::new(vec![value.into()])
    }

    pub fn ui(ui: Value) -> Self {
        Self {
            values: Vec::new(),
            ui: Some(ui),
        }
    }
}

/// What a node returns: its outputs, or a subgraph that will produce them.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeResult {
    Output(NodeOutput),
    Expand(Expansion),
}

/// Per-invocation context handed to a capability.
pub struct NodeContext {
    pub submission_id: SubmissionId,
    pub node_id: NodeId,
    pub display_node: NodeId,
    cancel: CancellationToken,
    events: Arc<dyn EventSink>,
}

impl NodeContext {
    pub fn new(
        submission_id: SubmissionId,
        node_id: NodeId,
        display_node: NodeId,
        cancel: CancellationToken,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            submission_id,
            node_id,
            display_node,
            cancel,
            events,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the submission is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Report progress of a long-running invocation.
    pub fn progress(&self, value: u64, max: u64) {
        self.events.emit(ExecutionEvent::NodeProgress {
            submission_id: self.submission_id.clone(),
            node_id: self.node_id.clone(),
            display_node: self.display_node.clone(),
            value,
            max,
        });
    }
}

/// A node type registered with the engine.
#[async_trait]
pub trait NodeCapability: Send + Sync {
    /// Type tag used as `class_type` in prompts.
    fn class_type(&self) -> &'static str;

    fn inputs(&self) -> Vec<InputSpec>;

    fn outputs(&self) -> Vec<OutputSpec>;

    /// Output nodes are execution targets and contribute `ui` to history.
    fn is_output_node(&self) -> bool {
        false
    }

    /// Non-idempotent nodes are never served from or stored in the cache.
    fn idempotent(&self) -> bool {
        true
    }

    /// Extra fingerprint material computed from literal inputs, used to force
    /// re-execution when state outside the prompt has changed.
    fn fingerprint_salt(&self, _literals: &NodeInputs) -> Option<String> {
        None
    }

    /// Lazy slots this node needs before it can run, given the inputs resolved
    /// so far. An empty list means the node is ready.
    fn check_lazy_status(&self, _inputs: &NodeInputs) -> Vec<String> {
        Vec::new()
    }

    /// Estimated memory held by a cached copy of `output`, in bytes.
    fn estimate_footprint(&self, output: &NodeOutput) -> usize {
        serde_json::to_vec(output).map(|bytes| bytes.len()).unwrap_or(0)
    }

    async fn invoke(&self, inputs: NodeInputs, ctx: &NodeContext) -> Result<NodeResult, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_type_matches_everything() {
        assert!(types_compatible("*", "NUMBER"));
        assert!(types_compatible("STRING", "*"));
        assert!(types_compatible("STRING", "STRING"));
        assert!(!types_compatible("STRING", "NUMBER"));
    }

    #[test]
    fn test_inputs_accessors() {
        let inputs: NodeInputs = [
            ("a".to_string(), json!(2)),
            ("b".to_string(), json!("x")),
        ]
        .into_iter()
        .collect();

        assert_eq!(inputs.require_i64("a").unwrap(), 2);
        assert_eq!(inputs.require_f64("a").unwrap(), 2.0);
        assert_eq!(inputs.require_str("b").unwrap(), "x");
        assert_eq!(
            inputs.require("c").unwrap_err(),
            NodeError::MissingInput("c".to_string())
        );
        assert!(matches!(
            inputs.require_str("a"),
            Err(NodeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_input_spec_builders() {
        let spec = InputSpec::optional("on_true", ANY_TYPE).lazy();
        assert!(!spec.required);
        assert!(spec.lazy);
    }
}
