// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::NodeError;
use crate::traits::{
    InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec, ANY_TYPE,
};
use async_trait::async_trait;
use serde_json::json;

/// Output node: surfaces `value` in history as `{"values": [value]}`.
pub struct PreviewNode;

#[async_trait]
impl NodeCapability for PreviewNode {
    fn class_type(&self) -> &'static str {
        "Preview"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::required("value", ANY_TYPE)]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        Vec::new()
    }

    fn is_output_node(&self) -> bool {
        true
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let value = inputs.require("value")?.clone();
        Ok(NodeResult::Output(NodeOutput::ui(json!({ "values": [value] }))))
    }
}
