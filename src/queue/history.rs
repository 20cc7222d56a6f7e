// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::events::ExecutionEvent;
use crate::engine::NodeState;
use crate::errors::NodeFailure;
use crate::graph::{NodeId, SubmissionId};
use crate::queue::SubmissionStatus;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// What the executor reports for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    /// `ui` payloads of output nodes, by node id
    pub outputs: BTreeMap<NodeId, Value>,
    pub errors: Vec<NodeFailure>,
    /// Terminal state of every staged node, ephemeral ones included
    pub node_states: BTreeMap<NodeId, NodeState>,
    /// Nodes served from the cache
    pub cached: Vec<NodeId>,
    /// Nodes whose capability was invoked, in invocation order
    pub executed: Vec<NodeId>,
    /// Submission-level events emitted while running
    pub messages: Vec<ExecutionEvent>,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

impl SubmissionOutcome {
    pub fn new(status: SubmissionStatus) -> Self {
        let now = unix_millis();
        Self {
            status,
            outputs: BTreeMap::new(),
            errors: Vec::new(),
            node_states: BTreeMap::new(),
            cached: Vec::new(),
            executed: Vec::new(),
            messages: Vec::new(),
            started_at_ms: now,
            finished_at_ms: now,
        }
    }

    pub fn state_of(&self, node_id: &str) -> Option<NodeState> {
        self.node_states.get(node_id).copied()
    }
}

/// A finished submission as kept in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub submission_id: SubmissionId,
    pub number: u64,
    pub priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub extra_data: Value,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}

/// Bounded, insertion-ordered store of history records.
#[derive(Debug)]
pub struct History {
    capacity: usize,
    order: VecDeque<SubmissionId>,
    records: HashMap<SubmissionId, HistoryRecord>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            records: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, returning the ids of records dropped to stay in bounds.
    ///
    /// Recording an id that is already present replaces it and moves it to
    /// the newest position.
    pub fn push(&mut self, record: HistoryRecord) -> Vec<SubmissionId> {
        let id = record.submission_id.clone();
        if self.records.insert(id.clone(), record).is_some() {
            self.order.retain(|existing| existing != &id);
        }
        self.order.push_back(id);

        let mut evicted = Vec::new();
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.records.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn get(&self, id: &str) -> Option<&HistoryRecord> {
        self.records.get(id)
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<HistoryRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    pub fn delete(&mut self, id: &str) -> bool {
        if self.records.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
