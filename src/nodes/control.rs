// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::NodeError;
use crate::nodes::primitives::BOOLEAN;
use crate::traits::{
    InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec, ANY_TYPE,
};
use async_trait::async_trait;

/// Forwards `on_true` or `on_false` depending on `condition`.
///
/// Both branches are lazy: only the producer of the selected branch runs.
pub struct SwitchNode;

impl SwitchNode {
    fn branch(inputs: &NodeInputs) -> Result<&'static str, NodeError> {
        Ok(if inputs.require_bool("condition")? {
            "on_true"
        } else {
            "on_false"
        })
    }
}

#[async_trait]
impl NodeCapability for SwitchNode {
    fn class_type(&self) -> &'static str {
        "Switch"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("condition", BOOLEAN),
            InputSpec::required("on_true", ANY_TYPE).lazy(),
            InputSpec::required("on_false", ANY_TYPE).lazy(),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("VALUE", ANY_TYPE)]
    }

    fn check_lazy_status(&self, inputs: &NodeInputs) -> Vec<String> {
        match Self::branch(inputs) {
            Ok(branch) if !inputs.contains(branch) => vec![branch.to_string()],
            _ => Vec::new(),
        }
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let branch = Self::branch(&inputs)?;
        let value = inputs.require(branch)?.clone();
        Ok(NodeResult::Output(NodeOutput::single(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::{context, inputs, output};
    use serde_json::json;

    #[test]
    fn test_requests_only_the_selected_branch() {
        assert_eq!(
            SwitchNode.check_lazy_status(&inputs(json!({"condition": false}))),
            vec!["on_false".to_string()]
        );
        assert!(SwitchNode
            .check_lazy_status(&inputs(json!({"condition": true, "on_true": 1})))
            .is_empty());
    }

    #[tokio::test]
    async fn test_forwards_selected_value() {
        let result = SwitchNode
            .invoke(inputs(json!({"condition": true, "on_true": "yes"})), &context())
            .await;
        assert_eq!(output(result), vec![json!("yes")]);
    }
}
