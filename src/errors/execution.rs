// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while a submission executes.
//!
//! Node capabilities report failures as [`NodeError`]. The executor wraps those,
//! along with registry, resource and expansion problems, in [`ExecutionError`] and
//! records the result against the node as a [`NodeFailure`]. None of these abort
//! the submission; they only stop the failed node's dependent subtree.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure returned by a node capability's `invoke`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("missing input '{0}'")]
    MissingInput(String),

    #[error("input '{name}' is invalid: {message}")]
    InvalidInput { name: String, message: String },

    #[error("{0}")]
    Failed(String),

    /// The node observed its cancellation token and stopped early
    #[error("cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        NodeError::InvalidInput {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Failure raised by a resource manager around a node invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resource unavailable for '{node_id}': {message}")]
pub struct ResourceError {
    pub node_id: String,
    pub message: String,
}

/// Problems with a node's dynamic expansion payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("expanded node id '{node_id}' collides with an existing node")]
    IdCollision { node_id: String },

    #[error("expanded node '{node_id}' input '{input}' links to unknown node '{missing}'")]
    UnresolvedLink {
        node_id: String,
        input: String,
        missing: String,
    },

    /// An injected node links back to the node that produced the expansion
    #[error("expanded node '{node_id}' links back to its originating node")]
    SelfReference { node_id: String },

    #[error("expansion contains a cycle: {}", cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("expansion maps {actual} output(s) but the node declares {expected}")]
    OutputArity { expected: usize, actual: usize },
}

/// Engine-level failure attributed to a single node.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("node type '{0}' is not registered")]
    NodeTypeNotRegistered(String),

    #[error("node '{0}' is not part of the prompt")]
    UnknownNode(String),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    /// The node returned a different number of outputs than it declares
    #[error("node returned {actual} output(s) but declares {expected}")]
    OutputArity { expected: usize, actual: usize },

    #[error("output {output} of upstream node '{upstream}' is not available")]
    MissingUpstreamOutput { upstream: String, output: usize },

    #[error("dependency cycle detected while scheduling node '{0}'")]
    DependencyCycle(String),
}

/// Why a node ended in the errored state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// The node itself (or the infrastructure around it) failed
    Execution { message: String },
    /// The node was skipped because a node it depends on failed
    UpstreamFailed { upstream: String },
}

/// A failed node as recorded in submission history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub node_id: String,
    pub class_type: String,
    pub display_node: String,
    /// The node whose expansion injected this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub cause: FailureCause,
}

impl NodeFailure {
    pub fn is_skipped(&self) -> bool {
        matches!(self.cause, FailureCause::UpstreamFailed { .. })
    }
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::Execution { message } => write!(
                f,
                "Node '{}' ({}) failed: {}",
                self.node_id, self.class_type, message
            ),
            FailureCause::UpstreamFailed { upstream } => write!(
                f,
                "Node '{}' ({}) skipped due to upstream failure in '{}'",
                self.node_id, self.class_type, upstream
            ),
        }
    }
}
