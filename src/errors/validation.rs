// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use thiserror::Error;

/// Errors found while validating a submitted prompt.
///
/// Validation accumulates every problem it finds so a client can fix a
/// prompt in one pass; a submission that produces any of these never
/// reaches the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A circular dependency was detected between nodes
    #[error("Cyclic dependency detected: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// The cycle path, closed by repeating its first node
        cycle: Vec<String>,
    },

    /// An input links to a node that is not part of the prompt
    #[error("Node '{node_id}' input '{input}' links to '{missing}' which does not exist")]
    UnresolvedLink {
        node_id: String,
        input: String,
        missing: String,
    },

    /// No capability is registered for the node's class type
    #[error("Node '{node_id}' has unknown class type '{class_type}'")]
    UnknownNodeType { node_id: String, class_type: String },

    #[error("Node '{node_id}' ({class_type}) is missing required input '{input}'")]
    MissingRequiredInput {
        node_id: String,
        class_type: String,
        input: String,
    },

    /// A link addresses an output position the producer does not declare
    #[error(
        "Node '{node_id}' input '{input}' links to output {output} of '{source_node}', which declares only {available} output(s)"
    )]
    OutputOutOfRange {
        node_id: String,
        input: String,
        source_node: String,
        output: usize,
        available: usize,
    },

    #[error(
        "Node '{node_id}' input '{input}' expects {expected} but output {output} of '{source_node}' produces {actual}"
    )]
    TypeMismatch {
        node_id: String,
        input: String,
        source_node: String,
        output: usize,
        expected: String,
        actual: String,
    },

    #[error("Prompt has no output nodes")]
    NoOutputs,

    /// A partial execution target is missing or is not an output node
    #[error("Partial execution target '{node_id}' is not an output node of this prompt")]
    InvalidTarget { node_id: String },
}

impl ValidationError {
    /// The node the error is attributed to, when there is one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ValidationError::CyclicDependency { cycle } => cycle.first().map(String::as_str),
            ValidationError::UnresolvedLink { node_id, .. }
            | ValidationError::UnknownNodeType { node_id, .. }
            | ValidationError::MissingRequiredInput { node_id, .. }
            | ValidationError::OutputOutOfRange { node_id, .. }
            | ValidationError::TypeMismatch { node_id, .. }
            | ValidationError::InvalidTarget { node_id } => Some(node_id),
            ValidationError::NoOutputs => None,
        }
    }
}
