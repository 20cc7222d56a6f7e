// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::NodeError;
use crate::nodes::primitives::NUMBER;
use crate::traits::{
    InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec, ANY_TYPE,
};
use async_trait::async_trait;
use std::time::Duration;

const PROGRESS_STEPS: u64 = 10;

/// Waits `millis` milliseconds, then forwards `value`.
///
/// Stands in for nodes that suspend on external work. The wait reports
/// progress in ten steps and stops early if the submission is cancelled.
pub struct DelayNode;

#[async_trait]
impl NodeCapability for DelayNode {
    fn class_type(&self) -> &'static str {
        "Delay"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("value", ANY_TYPE),
            InputSpec::optional("millis", NUMBER).with_default(0),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![OutputSpec::new("VALUE", ANY_TYPE)]
    }

    async fn invoke(&self, inputs: NodeInputs, ctx: &NodeContext) -> Result<NodeResult, NodeError> {
        let value = inputs.require("value")?.clone();
        let millis = match inputs.get("millis") {
            Some(_) => inputs.require_i64("millis")?,
            None => 0,
        };
        let millis = u64::try_from(millis)
            .map_err(|_| NodeError::invalid("millis", "must not be negative"))?;

        let step = Duration::from_millis(millis) / PROGRESS_STEPS as u32;
        for done in 1..=PROGRESS_STEPS {
            tokio::select! {
                _ = ctx.cancelled() => return Err(NodeError::Cancelled),
                _ = tokio::time::sleep(step) => ctx.progress(done, PROGRESS_STEPS),
            }
        }

        Ok(NodeResult::Output(NodeOutput::single(value)))
    }
}
