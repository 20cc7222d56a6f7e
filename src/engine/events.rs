// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution events and the stock [`EventSink`] implementations.
//!
//! Events serialize as `{"type": "...", "data": {...}}`, the shape node-graph
//! front ends expect on their progress socket.

use crate::errors::NodeFailure;
use crate::graph::{NodeId, SubmissionId};
use crate::queue::SubmissionStatus;
use crate::traits::EventSink;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ExecutionEvent {
    SubmissionStarted {
        submission_id: SubmissionId,
    },
    /// Nodes whose outputs were served from the cache
    NodesCached {
        submission_id: SubmissionId,
        nodes: Vec<NodeId>,
    },
    NodeStarted {
        submission_id: SubmissionId,
        node_id: NodeId,
        display_node: NodeId,
    },
    NodeProgress {
        submission_id: SubmissionId,
        node_id: NodeId,
        display_node: NodeId,
        value: u64,
        max: u64,
    },
    NodeFinished {
        submission_id: SubmissionId,
        node_id: NodeId,
        display_node: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        ui: Option<Value>,
    },
    NodeErrored {
        submission_id: SubmissionId,
        failure: NodeFailure,
    },
    SubmissionInterrupted {
        submission_id: SubmissionId,
    },
    SubmissionComplete {
        submission_id: SubmissionId,
        status: SubmissionStatus,
    },
}

impl ExecutionEvent {
    pub fn submission_id(&self) -> &str {
        match self {
            ExecutionEvent::SubmissionStarted { submission_id }
            | ExecutionEvent::NodesCached { submission_id, .. }
            | ExecutionEvent::NodeStarted { submission_id, .. }
            | ExecutionEvent::NodeProgress { submission_id, .. }
            | ExecutionEvent::NodeFinished { submission_id, .. }
            | ExecutionEvent::NodeErrored { submission_id, .. }
            | ExecutionEvent::SubmissionInterrupted { submission_id }
            | ExecutionEvent::SubmissionComplete { submission_id, .. } => submission_id,
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ExecutionEvent) {}
}

/// Writes every event to the log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ExecutionEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::debug!(
                submission_id = event.submission_id(),
                event = %json,
                "execution event"
            ),
            Err(e) => tracing::warn!(error = %e, "unserializable execution event"),
        }
    }
}

/// Forwards events over an unbounded channel.
///
/// A dropped receiver is not an error; events are silently discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ExecutionEvent) {
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory; handy for inspecting a run after the fact.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ExecutionEvent) {
        self.events.lock().push(event);
    }
}
