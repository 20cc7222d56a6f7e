// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::graph::prompt::{NodeId, Prompt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type SubmissionId = String;

/// A prompt plus the queueing metadata a client sends with it.
///
/// Matches the `/prompt` request body of node-graph front ends:
///
/// ```json
/// { "prompt": { ... }, "client_id": "ui-1", "prompt_id": "...", "front": false }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub prompt: Prompt,
    #[serde(default, rename = "prompt_id", skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<SubmissionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub extra_data: Value,
    #[serde(default)]
    pub front: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_execution_targets: Option<Vec<NodeId>>,
}

impl Submission {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            submission_id: None,
            client_id: None,
            extra_data: Value::Null,
            front: false,
            priority: 0,
            partial_execution_targets: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<SubmissionId>) -> Self {
        self.submission_id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn at_front(mut self) -> Self {
        self.front = true;
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_targets(mut self, targets: Vec<NodeId>) -> Self {
        self.partial_execution_targets = Some(targets);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_defaults() {
        let submission: Submission = serde_json::from_str(
            r#"{"prompt": {"1": {"class_type": "Int", "inputs": {"value": 1}}}}"#,
        )
        .unwrap();

        assert_eq!(submission.prompt.len(), 1);
        assert_eq!(submission.priority, 0);
        assert!(!submission.front);
        assert!(submission.submission_id.is_none());
        assert!(submission.extra_data.is_null());
    }

    #[test]
    fn test_envelope_reads_prompt_id() {
        let submission: Submission = serde_json::from_str(
            r#"{"prompt": {}, "prompt_id": "abc", "client_id": "ui", "front": true, "priority": 3}"#,
        )
        .unwrap();

        assert_eq!(submission.submission_id.as_deref(), Some("abc"));
        assert_eq!(submission.client_id.as_deref(), Some("ui"));
        assert!(submission.front);
        assert_eq!(submission.priority, 3);
    }
}
