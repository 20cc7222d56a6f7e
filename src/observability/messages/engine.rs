// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for submission execution and node lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Submission start, completion and cancellation
//! * Node dispatch, cache hits, failures and skips
//! * Lazy input requests and dynamic expansion
//! * Worker lifecycle

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Submission execution started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use promptwood::observability::messages::engine::SubmissionStarted;
///
/// let msg = SubmissionStarted {
///     submission_id: "c0ffee",
///     node_count: 5,
///     target_count: 1,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct SubmissionStarted<'a> {
    pub submission_id: &'a str,
    pub node_count: usize,
    pub target_count: usize,
}

impl Display for SubmissionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Executing submission {}: {} nodes, {} output target(s)",
            self.submission_id, self.node_count, self.target_count
        )
    }
}

impl StructuredLog for SubmissionStarted<'_> {
    fn log(&self) {
        tracing::info!(
            submission_id = self.submission_id,
            node_count = self.node_count,
            target_count = self.target_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "submission",
            span_name = name,
            submission_id = self.submission_id,
            node_count = self.node_count,
        )
    }
}

/// Submission reached a terminal status.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SubmissionCompleted<'a> {
    pub submission_id: &'a str,
    pub status: &'a str,
    pub duration: Duration,
    pub executed: usize,
    pub cached: usize,
    pub failed: usize,
}

impl Display for SubmissionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Submission {} finished with status {} in {:?}: {} executed, {} cached, {} failed",
            self.submission_id, self.status, self.duration, self.executed, self.cached, self.failed
        )
    }
}

impl StructuredLog for SubmissionCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            submission_id = self.submission_id,
            status = self.status,
            duration_ms = self.duration.as_millis() as u64,
            executed = self.executed,
            cached = self.cached,
            failed = self.failed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "submission_completed",
            span_name = name,
            submission_id = self.submission_id,
            status = self.status,
        )
    }
}

/// Submission was cancelled; undispatched nodes are marked cancelled.
///
/// # Log Level
/// `warn!` - Execution stopped early at a client's request
pub struct SubmissionCancelled<'a> {
    pub submission_id: &'a str,
    pub cancelled_nodes: usize,
}

impl Display for SubmissionCancelled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Submission {} interrupted, {} pending node(s) cancelled",
            self.submission_id, self.cancelled_nodes
        )
    }
}

impl StructuredLog for SubmissionCancelled<'_> {
    fn log(&self) {
        tracing::warn!(
            submission_id = self.submission_id,
            cancelled_nodes = self.cancelled_nodes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "submission_cancelled",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

/// Node handed to its capability for execution.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeDispatched<'a> {
    pub submission_id: &'a str,
    pub node_id: &'a str,
    pub class_type: &'a str,
}

impl Display for NodeDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Executing node '{}' ({})", self.node_id, self.class_type)
    }
}

impl StructuredLog for NodeDispatched<'_> {
    fn log(&self) {
        tracing::debug!(
            submission_id = self.submission_id,
            node_id = self.node_id,
            class_type = self.class_type,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node",
            span_name = name,
            node_id = self.node_id,
            class_type = self.class_type,
        )
    }
}

/// Node outputs served from the cache.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeCacheHit<'a> {
    pub node_id: &'a str,
    pub fingerprint: &'a str,
}

impl Display for NodeCacheHit<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' served from cache ({})",
            self.node_id, self.fingerprint
        )
    }
}

impl StructuredLog for NodeCacheHit<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            fingerprint = self.fingerprint,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("cache_hit", span_name = name, node_id = self.node_id)
    }
}

/// Node failed during execution.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct NodeExecutionFailed<'a> {
    pub node_id: &'a str,
    pub class_type: &'a str,
    pub error: &'a dyn Display,
}

impl Display for NodeExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' ({}) failed: {}",
            self.node_id, self.class_type, self.error
        )
    }
}

impl StructuredLog for NodeExecutionFailed<'_> {
    fn log(&self) {
        tracing::error!(
            node_id = self.node_id,
            class_type = self.class_type,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "node_failed",
            span_name = name,
            node_id = self.node_id,
            class_type = self.class_type,
        )
    }
}

/// Dependents of a failed node were skipped.
///
/// # Log Level
/// `warn!` - Work was abandoned but the submission continues
pub struct DependentsSkipped<'a> {
    pub failed_node: &'a str,
    pub skipped: &'a [String],
}

impl Display for DependentsSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping {} node(s) downstream of failed node '{}': [{}]",
            self.skipped.len(),
            self.failed_node,
            self.skipped.join(", ")
        )
    }
}

impl StructuredLog for DependentsSkipped<'_> {
    fn log(&self) {
        tracing::warn!(
            failed_node = self.failed_node,
            skipped_count = self.skipped.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "dependents_skipped",
            span_name = name,
            failed_node = self.failed_node,
        )
    }
}

/// Node asked for lazy inputs that have not been evaluated yet.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct LazyInputsRequested<'a> {
    pub node_id: &'a str,
    pub slots: &'a [String],
}

impl Display for LazyInputsRequested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' requested lazy input(s) [{}]",
            self.node_id,
            self.slots.join(", ")
        )
    }
}

impl StructuredLog for LazyInputsRequested<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            slots = self.slots.join(","),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("lazy_inputs", span_name = name, node_id = self.node_id)
    }
}

/// Node result carried an expansion that was spliced into the prompt.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeExpanded<'a> {
    pub node_id: &'a str,
    pub injected: usize,
}

impl Display for NodeExpanded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' expanded into {} ephemeral node(s)",
            self.node_id, self.injected
        )
    }
}

impl StructuredLog for NodeExpanded<'_> {
    fn log(&self) {
        tracing::debug!(node_id = self.node_id, injected = self.injected, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("expansion", span_name = name, node_id = self.node_id)
    }
}

/// Staged nodes can never become ready.
///
/// # Log Level
/// `error!` - Indicates a cycle introduced at runtime
pub struct ExecutionStalled<'a> {
    pub submission_id: &'a str,
    pub nodes: &'a [String],
}

impl Display for ExecutionStalled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Submission {} stalled with {} unrunnable node(s): [{}]",
            self.submission_id,
            self.nodes.len(),
            self.nodes.join(", ")
        )
    }
}

impl StructuredLog for ExecutionStalled<'_> {
    fn log(&self) {
        tracing::error!(
            submission_id = self.submission_id,
            stalled = self.nodes.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "stalled",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

/// Worker loop started or stopped.
///
/// # Log Level
/// `info!` - Service lifecycle
pub struct WorkerLifecycle {
    pub running: bool,
}

impl Display for WorkerLifecycle {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.running {
            write!(f, "Execution worker started")
        } else {
            write!(f, "Execution worker stopped")
        }
    }
}

impl StructuredLog for WorkerLifecycle {
    fn log(&self) {
        tracing::info!(running = self.running, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("worker", span_name = name)
    }
}

/// The worker finished a submission the queue no longer tracks.
///
/// # Log Level
/// `warn!` - The outcome is dropped
pub struct OutcomeNotRecorded<'a> {
    pub submission_id: &'a str,
    pub error: &'a dyn Display,
}

impl Display for OutcomeNotRecorded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropping outcome of submission {}: {}",
            self.submission_id, self.error
        )
    }
}

impl StructuredLog for OutcomeNotRecorded<'_> {
    fn log(&self) {
        tracing::warn!(
            submission_id = self.submission_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "record",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_completed_display() {
        let msg = SubmissionCompleted {
            submission_id: "abc",
            status: "success",
            duration: Duration::from_millis(5),
            executed: 3,
            cached: 2,
            failed: 0,
        };
        assert_eq!(
            msg.to_string(),
            "Submission abc finished with status success in 5ms: 3 executed, 2 cached, 0 failed"
        );
    }

    #[test]
    fn test_dependents_skipped_display() {
        let skipped = vec!["3".to_string(), "4".to_string()];
        let msg = DependentsSkipped {
            failed_node: "2",
            skipped: &skipped,
        };
        assert_eq!(
            msg.to_string(),
            "Skipping 2 node(s) downstream of failed node '2': [3, 4]"
        );
    }
}
