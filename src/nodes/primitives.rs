// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Constant sources: each returns its `value` literal unchanged.

use crate::errors::NodeError;
use crate::traits::{InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec};
use async_trait::async_trait;
use serde_json::json;

pub const NUMBER: &str = "NUMBER";
pub const STRING: &str = "STRING";
pub const BOOLEAN: &str = "BOOLEAN";

pub struct IntNode;

#[async_trait]
impl NodeCapability for IntNode {
    fn class_type(&self) -> &'static str {
        "Int"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::required("value", NUMBER)]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("INT", NUMBER)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let value = inputs.require_i64("value")?;
        Ok(NodeResult::Output(NodeOutput::single(value)))
    }
}

pub struct FloatNode;

#[async_trait]
impl NodeCapability for FloatNode {
    fn class_type(&self) -> &'static str {
        "Float"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::required("value", NUMBER)]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("FLOAT", NUMBER)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let value = inputs.require_f64("value")?;
        Ok(NodeResult::Output(NodeOutput::single(json!(value))))
    }
}

pub struct StringNode;

#[async_trait]
impl NodeCapability for StringNode {
    fn class_type(&self) -> &'static str {
        "String"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::required("value", STRING)]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("STRING", STRING)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let value = inputs.require_str("value")?;
        Ok(NodeResult::Output(NodeOutput::single(value)))
    }
}
