// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::NodeError;
use crate::nodes::primitives::STRING;
use crate::traits::{
    InputSpec, NodeCapability, NodeContext, NodeInputs, NodeResult, OutputSpec, ANY_TYPE,
};
use async_trait::async_trait;

const DEFAULT_MESSAGE: &str = "failure requested";

/// Always fails with `message`. Useful for exercising failure isolation.
///
/// `value` is accepted and ignored so the node can sit in the middle of a
/// chain. The node is never cached, so every submission fails afresh.
pub struct FailNode;

#[async_trait]
impl NodeCapability for FailNode {
    fn class_type(&self) -> &'static str {
        "Fail"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::optional("value", ANY_TYPE),
            InputSpec::optional("message", STRING).with_default(DEFAULT_MESSAGE),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("VALUE", ANY_TYPE)]
    }

    fn idempotent(&self) -> bool {
        false
    }

    async fn invoke(&self, inputs: NodeInputs, _ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let message = inputs
            .get("message")
            .and_then(|message| message.as_str())
            .unwrap_or(DEFAULT_MESSAGE);
        Err(NodeError::Failed(message.to_string()))
    }
}
