// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::NodeError;
use crate::nodes::primitives::STRING;
use crate::traits::{
    InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec, ANY_TYPE,
};
use async_trait::async_trait;
use serde_json::Value;

/// Joins `a` and `b` with an optional separator.
pub struct ConcatNode;

#[async_trait]
impl NodeCapability for ConcatNode {
    fn class_type(&self) -> &'static str {
        "Concat"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("a", STRING),
            InputSpec::required("b", STRING),
            InputSpec::optional("separator", STRING).with_default(""),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("STRING", STRING)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let a = inputs.require_str("a")?;
        let b = inputs.require_str("b")?;
        let separator = match inputs.get("separator") {
            Some(_) => inputs.require_str("separator")?,
            None => "",
        };
        Ok(NodeResult::Output(NodeOutput::single(format!(
            "{}{}{}",
            a, separator, b
        ))))
    }
}

/// Replaces every `{value}` in `template` with `value`.
///
/// Strings are inserted as-is; anything else is rendered as JSON.
pub struct TemplateNode;

#[async_trait]
impl NodeCapability for TemplateNode {
    fn class_type(&self) -> &'static str {
        "Template"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("template", STRING),
            InputSpec::required("value", ANY_TYPE),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("STRING", STRING)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let template = inputs.require_str("template")?;
        let rendered = match inputs.require("value")? {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Ok(NodeResult::Output(NodeOutput::single(
            template.replace("{value}", &rendered),
        )))
    }
}
