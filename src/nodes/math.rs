// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::NodeError;
use crate::nodes::primitives::NUMBER;
use crate::traits::{InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Integer arithmetic while both operands are integers, float otherwise.
fn combine(
    inputs: &NodeInputs,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, NodeError> {
    let a = inputs.require("a")?;
    let b = inputs.require("b")?;

    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return int_op(a, b)
            .map(Value::from)
            .ok_or_else(|| NodeError::Failed(format!("integer overflow combining {} and {}", a, b)));
    }

    let a = inputs.require_f64("a")?;
    let b = inputs.require_f64("b")?;
    Ok(json!(float_op(a, b)))
}

fn binary_inputs() -> Vec<InputSpec> {
    vec![InputSpec::required("a", NUMBER), InputSpec::required("b", NUMBER)]
}

pub struct AddNode;

#[async_trait]
impl NodeCapability for AddNode {
    fn class_type(&self) -> &'static str {
        "Add"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        binary_inputs()
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("SUM", NUMBER)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let sum = combine(&inputs, i64::checked_add, |a, b| a + b)?;
        Ok(NodeResult::Output(NodeOutput::single(sum)))
    }
}

pub struct MultiplyNode;

#[async_trait]
impl NodeCapability for MultiplyNode {
    fn class_type(&self) -> &'static str {
        "Multiply"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        binary_inputs()
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("PRODUCT", NUMBER)]
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let product = combine(&inputs, i64::checked_mul, |a, b| a * b)?;
        Ok(NodeResult::Output(NodeOutput::single(product)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::{context, inputs, output};

    #[tokio::test]
    async fn test_integer_and_float_arithmetic() {
        let ctx = context();
        assert_eq!(
            output(AddNode.invoke(inputs(json!({"a": 2, "b": 3})), &ctx).await),
            vec![json!(5)]
        );
        assert_eq!(
            output(AddNode.invoke(inputs(json!({"a": 2, "b": 0.5})), &ctx).await),
            vec![json!(2.5)]
        );
        assert_eq!(
            output(MultiplyNode.invoke(inputs(json!({"a": 4, "b": -3})), &ctx).await),
            vec![json!(-12)]
        );
    }

    #[tokio::test]
    async fn test_overflow_fails() {
        let err = MultiplyNode
            .invoke(inputs(json!({"a": i64::MAX, "b": 2})), &context())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Failed(_)));
    }

    #[tokio::test]
    async fn test_non_numeric_operand() {
        let err = AddNode
            .invoke(inputs(json!({"a": "x", "b": 1})), &context())
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::invalid("a", "expected a number"));
    }
}
