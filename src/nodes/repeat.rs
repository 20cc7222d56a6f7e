// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::NodeError;
use crate::graph::{Expansion, InputValue, Prompt, PromptNode};
use crate::nodes::primitives::{NUMBER, STRING};
use crate::traits::{InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec};
use async_trait::async_trait;

/// Repeats `value` `count` times by expanding into a chain of `Concat` nodes.
///
/// A count of one returns the value directly; a count of `n` injects `n - 1`
/// nodes, each appending one more copy to the previous result.
pub struct RepeatNode;

#[async_trait]
impl NodeCapability for RepeatNode {
    fn class_type(&self) -> &'static str {
        "Repeat"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("value", STRING),
            InputSpec::required("count", NUMBER),
            InputSpec::optional("separator", STRING).with_default(""),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("STRING", STRING)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let value = inputs.require_str("value")?;
        let count = inputs.require_i64("count")?;
        let separator = match inputs.get("separator") {
            Some(_) => inputs.require_str("separator")?,
            None => "",
        };
        if count < 1 {
            return Err(NodeError::invalid("count", "must be at least 1"));
        }
        if count == 1 {
            return Ok(NodeResult::Output(NodeOutput::single(value)));
        }

        let mut nodes = Prompt::new();
        let mut previous = InputValue::literal(value);
        for step in 0..count - 1 {
            let mut node = PromptNode::new("Concat")
                .with_literal("b", value)
                .with_literal("separator", separator);
            node.inputs.insert("a".to_string(), previous);
            let id = format!("concat{}", step);
            nodes.insert(id.clone(), node);
            previous = InputValue::link(id, 0);
        }

        Ok(NodeResult::Expand(Expansion::new(nodes, vec![previous])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::{context, inputs, output};
    use serde_json::json;

    #[tokio::test]
    async fn test_single_repeat_returns_directly() {
        let result = RepeatNode
            .invoke(inputs(json!({"value": "ab", "count": 1})), &context())
            .await;
        assert_eq!(output(result), vec![json!("ab")]);
    }

    #[tokio::test]
    async fn test_expands_into_concat_chain() {
        let result = RepeatNode
            .invoke(inputs(json!({"value": "ab", "count": 4})), &context())
            .await
            .unwrap();
        let NodeResult::Expand(expansion) = result else {
            panic!("expected an expansion");
        };

        assert_eq!(expansion.nodes.len(), 3);
        assert_eq!(expansion.outputs, vec![InputValue::link("concat2", 0)]);
        let last = expansion.nodes.get("concat2").unwrap();
        assert_eq!(last.inputs["a"], InputValue::link("concat1", 0));
        let first = expansion.nodes.get("concat0").unwrap();
        assert_eq!(first.inputs["a"], InputValue::literal("ab"));
    }

    #[tokio::test]
    async fn test_zero_count_is_invalid() {
        let err = RepeatNode
            .invoke(inputs(json!({"value": "ab", "count": 0})), &context())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput { .. }));
    }
}
