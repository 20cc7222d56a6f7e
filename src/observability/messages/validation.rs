// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for prompt validation warnings and errors.
//!
//! This module contains message types for logging events related to:
//! * Cyclic dependency detection
//! * Rejected submissions
//! * Literal inputs given for slots a node does not declare

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Cyclic dependency detected in a prompt.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use promptwood::observability::messages::validation::CyclicDependencyDetected;
///
/// let cycle = vec!["1".to_string(), "2".to_string(), "1".to_string()];
/// let msg = CyclicDependencyDetected { cycle: &cycle };
///
/// tracing::error!("{}", msg);
/// ```
pub struct CyclicDependencyDetected<'a> {
    pub cycle: &'a [String],
}

impl Display for CyclicDependencyDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cyclic dependency detected: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CyclicDependencyDetected<'_> {
    fn log(&self) {
        tracing::error!(
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "cycle",
            span_name = name,
            cycle_length = self.cycle.len(),
        )
    }
}

/// Submission refused at the front door.
///
/// # Log Level
/// `warn!` - Client error, nothing was queued
pub struct SubmissionRejected<'a> {
    pub submission_id: &'a str,
    pub error_count: usize,
    pub first_error: &'a dyn Display,
}

impl Display for SubmissionRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rejected submission {} with {} validation error(s), first: {}",
            self.submission_id, self.error_count, self.first_error
        )
    }
}

impl StructuredLog for SubmissionRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            submission_id = self.submission_id,
            error_count = self.error_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "rejected",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

/// A literal was supplied for a slot the node type does not declare.
///
/// # Log Level
/// `warn!` - The value is ignored
pub struct UnknownInputIgnored<'a> {
    pub node_id: &'a str,
    pub class_type: &'a str,
    pub input: &'a str,
}

impl Display for UnknownInputIgnored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring input '{}' on node '{}': {} declares no such slot",
            self.input, self.node_id, self.class_type
        )
    }
}

impl StructuredLog for UnknownInputIgnored<'_> {
    fn log(&self) {
        tracing::warn!(
            node_id = self.node_id,
            class_type = self.class_type,
            input = self.input,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("unknown_input", span_name = name, node_id = self.node_id)
    }
}
