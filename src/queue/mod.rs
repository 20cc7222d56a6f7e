// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Priority-aware prompt queue with bounded execution history.
//!
//! Submitters and the worker share one [`PromptQueue`]. Every state change
//! happens under a single `parking_lot` mutex; the worker parks in
//! [`PromptQueue::next`] on a tokio `Notify` until work arrives.
//!
//! # Dispatch order
//!
//! 1. **Front**: submissions flagged `front` jump every pending entry; the most
//!    recent `front` submission goes first
//! 2. **Priority**: higher priority first
//! 3. **Enqueue number**: earlier submissions first
//!
//! A running submission is never displaced; `front` only reorders what is
//! still waiting.

pub mod history;

pub use history::{unix_millis, History, HistoryRecord, SubmissionOutcome};

use crate::config::ValidatedPrompt;
use crate::errors::QueueError;
use crate::graph::{Submission, SubmissionId};
use crate::observability::messages::queue::{
    CancelRequested, HistoryRecorded, SubmissionDequeued, SubmissionQueued,
};
use crate::observability::messages::StructuredLog;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Success,
    Error,
    Cancelled,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Running => "running",
            SubmissionStatus::Success => "success",
            SubmissionStatus::Error => "error",
            SubmissionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending | SubmissionStatus::Running)
    }
}

/// Queueing metadata for a submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitOptions {
    /// Client-chosen id; a UUID v4 is generated when absent
    pub submission_id: Option<SubmissionId>,
    pub priority: i64,
    pub front: bool,
    pub client_id: Option<String>,
    pub extra_data: Value,
}

impl From<&Submission> for SubmitOptions {
    fn from(submission: &Submission) -> Self {
        Self {
            submission_id: submission.submission_id.clone(),
            priority: submission.priority,
            front: submission.front,
            client_id: submission.client_id.clone(),
            extra_data: submission.extra_data.clone(),
        }
    }
}

/// A validated prompt waiting in, or taken from, the queue.
#[derive(Debug, Clone)]
pub struct QueuedPrompt {
    pub submission_id: SubmissionId,
    pub number: u64,
    pub priority: i64,
    pub front: bool,
    pub client_id: Option<String>,
    pub extra_data: Value,
    pub prompt: ValidatedPrompt,
}

/// A queued prompt handed to the worker with its cancellation token.
#[derive(Debug, Clone)]
pub struct DispatchedPrompt {
    pub job: QueuedPrompt,
    pub cancel: CancellationToken,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The submission had not started; it was removed and recorded as cancelled
    RemovedPending,
    /// The submission is running; its token was triggered
    SignalledRunning,
}

/// Summary of one entry for queue listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntryInfo {
    pub submission_id: SubmissionId,
    pub number: u64,
    pub priority: i64,
    pub front: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub node_count: usize,
}

impl From<&QueuedPrompt> for QueueEntryInfo {
    fn from(job: &QueuedPrompt) -> Self {
        Self {
            submission_id: job.submission_id.clone(),
            number: job.number,
            priority: job.priority,
            front: job.front,
            client_id: job.client_id.clone(),
            node_count: job.prompt.prompt().len(),
        }
    }
}

/// Running and pending entries, pending in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub running: Vec<QueueEntryInfo>,
    pub pending: Vec<QueueEntryInfo>,
}

/// Heap entry; the greatest entry is dispatched next.
#[derive(Debug)]
struct PendingEntry {
    job: QueuedPrompt,
    /// Set for `front` submissions; later front submissions rank higher
    front_rank: Option<u64>,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.job.number == other.job.number
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.front_rank, other.front_rank) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => self
                .job
                .priority
                .cmp(&other.job.priority)
                // Lower enqueue number wins ties
                .then_with(|| other.job.number.cmp(&self.job.number)),
        }
    }
}

#[derive(Debug)]
struct RunningEntry {
    job: QueuedPrompt,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct QueueState {
    pending: BinaryHeap<PendingEntry>,
    running: HashMap<SubmissionId, RunningEntry>,
    history: History,
    next_number: u64,
    next_front: u64,
}

impl QueueState {
    fn is_pending(&self, id: &str) -> bool {
        self.pending.iter().any(|entry| entry.job.submission_id == id)
    }

    fn record(&mut self, record: HistoryRecord) {
        let submission_id = record.submission_id.clone();
        let status = record.outcome.status;
        let evicted = self.history.push(record);
        HistoryRecorded {
            submission_id: &submission_id,
            status: status.as_str(),
            history_len: self.history.len(),
            evicted: evicted.first().map(String::as_str),
        }
        .log();
    }
}

#[derive(Debug)]
pub struct PromptQueue {
    state: Mutex<QueueState>,
    available: Notify,
    recorded: Notify,
    closed: CancellationToken,
}

impl PromptQueue {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: BinaryHeap::new(),
                running: HashMap::new(),
                history: History::new(history_capacity),
                next_number: 0,
                next_front: 0,
            }),
            available: Notify::new(),
            recorded: Notify::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Enqueue a validated prompt and return its submission id.
    pub fn submit(
        &self,
        prompt: ValidatedPrompt,
        options: SubmitOptions,
    ) -> Result<SubmissionId, QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let submission_id = options
            .submission_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut state = self.state.lock();
        if state.running.contains_key(&submission_id) || state.is_pending(&submission_id) {
            return Err(QueueError::DuplicateSubmission(submission_id));
        }

        let number = state.next_number;
        state.next_number += 1;
        let front_rank = if options.front {
            state.next_front += 1;
            Some(state.next_front)
        } else {
            None
        };

        state.pending.push(PendingEntry {
            job: QueuedPrompt {
                submission_id: submission_id.clone(),
                number,
                priority: options.priority,
                front: options.front,
                client_id: options.client_id,
                extra_data: options.extra_data,
                prompt,
            },
            front_rank,
        });

        SubmissionQueued {
            submission_id: &submission_id,
            number,
            priority: options.priority,
            front: options.front,
            pending: state.pending.len(),
        }
        .log();
        drop(state);

        self.available.notify_one();
        Ok(submission_id)
    }

    /// Take the next submission without waiting.
    pub fn try_next(&self) -> Option<DispatchedPrompt> {
        if self.closed.is_cancelled() {
            return None;
        }

        let mut state = self.state.lock();
        let entry = state.pending.pop()?;
        let cancel = self.closed.child_token();
        let job = entry.job;

        SubmissionDequeued {
            submission_id: &job.submission_id,
            number: job.number,
            remaining: state.pending.len(),
        }
        .log();

        state.running.insert(
            job.submission_id.clone(),
            RunningEntry {
                job: job.clone(),
                cancel: cancel.clone(),
            },
        );
        Some(DispatchedPrompt { job, cancel })
    }

    /// Wait for the next submission; `None` once the queue is closed.
    pub async fn next(&self) -> Option<DispatchedPrompt> {
        loop {
            if let Some(dispatched) = self.try_next() {
                return Some(dispatched);
            }
            tokio::select! {
                _ = self.available.notified() => {}
                _ = self.closed.cancelled() => return None,
            }
        }
    }

    /// Cancel a pending or running submission.
    pub fn cancel(&self, submission_id: &str) -> Result<CancelOutcome, QueueError> {
        let mut state = self.state.lock();

        if let Some(running) = state.running.get(submission_id) {
            running.cancel.cancel();
            CancelRequested {
                submission_id,
                running: true,
            }
            .log();
            return Ok(CancelOutcome::SignalledRunning);
        }

        let job = state
            .pending
            .iter()
            .find(|entry| entry.job.submission_id == submission_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| QueueError::NotFound(submission_id.to_string()))?;
        state
            .pending
            .retain(|entry| entry.job.submission_id != submission_id);

        CancelRequested {
            submission_id,
            running: false,
        }
        .log();
        state.record(history_record(
            &job,
            SubmissionOutcome::new(SubmissionStatus::Cancelled),
        ));
        drop(state);

        self.recorded.notify_waiters();
        Ok(CancelOutcome::RemovedPending)
    }

    /// Cancel every running submission, returning how many were signalled.
    pub fn interrupt(&self) -> usize {
        let state = self.state.lock();
        for (submission_id, running) in &state.running {
            running.cancel.cancel();
            CancelRequested {
                submission_id,
                running: true,
            }
            .log();
        }
        state.running.len()
    }

    /// Move a running submission to history.
    pub fn record(
        &self,
        submission_id: &str,
        outcome: SubmissionOutcome,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        let running = state
            .running
            .remove(submission_id)
            .ok_or_else(|| QueueError::NotFound(submission_id.to_string()))?;
        state.record(history_record(&running.job, outcome));
        drop(state);

        self.recorded.notify_waiters();
        Ok(())
    }

    /// All history records (oldest first), or the one for `submission_id`.
    pub fn history(&self, submission_id: Option<&str>) -> Vec<HistoryRecord> {
        let state = self.state.lock();
        match submission_id {
            Some(id) => state.history.get(id).cloned().into_iter().collect(),
            None => state.history.all(),
        }
    }

    pub fn history_entry(&self, submission_id: &str) -> Option<HistoryRecord> {
        self.state.lock().history.get(submission_id).cloned()
    }

    /// Wait until `submission_id` has a history record.
    ///
    /// Returns `None` if the id is unknown, or if the queue closes before the
    /// submission runs.
    pub async fn wait_for(&self, submission_id: &str) -> Option<HistoryRecord> {
        loop {
            let notified = self.recorded.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state.lock();
                if let Some(record) = state.history.get(submission_id) {
                    return Some(record.clone());
                }
                let running = state.running.contains_key(submission_id);
                let pending = state.is_pending(submission_id);
                if !running && !(pending && !self.closed.is_cancelled()) {
                    return None;
                }
            }

            notified.await;
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        let mut pending: Vec<&PendingEntry> = state.pending.iter().collect();
        pending.sort_by(|a, b| b.cmp(a));

        let mut running: Vec<QueueEntryInfo> = state
            .running
            .values()
            .map(|entry| QueueEntryInfo::from(&entry.job))
            .collect();
        running.sort_by_key(|info| info.number);

        QueueSnapshot {
            running,
            pending: pending
                .into_iter()
                .map(|entry| QueueEntryInfo::from(&entry.job))
                .collect(),
        }
    }

    /// Drop every pending submission without recording it.
    ///
    /// Callers waiting on a dropped id are woken and see `None`.
    pub fn clear_pending(&self) -> usize {
        let mut state = self.state.lock();
        let cleared = state.pending.len();
        state.pending.clear();
        drop(state);

        self.recorded.notify_waiters();
        cleared
    }

    pub fn delete_history(&self, submission_id: &str) -> bool {
        self.state.lock().history.delete(submission_id)
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    /// Number of pending submissions.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn running_count(&self) -> usize {
        self.state.lock().running.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.state.lock().history.capacity()
    }

    /// Stop handing out work and cancel whatever is running.
    pub fn close(&self) {
        self.closed.cancel();
        self.available.notify_waiters();
        self.recorded.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

fn history_record(job: &QueuedPrompt, outcome: SubmissionOutcome) -> HistoryRecord {
    HistoryRecord {
        submission_id: job.submission_id.clone(),
        number: job.number,
        priority: job.priority,
        client_id: job.client_id.clone(),
        extra_data: job.extra_data.clone(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate_prompt;
    use crate::graph::{Prompt, PromptNode};
    use crate::nodes::builtin_registry;
    use std::sync::Arc;
    use std::time::Duration;

    fn validated() -> ValidatedPrompt {
        let prompt = Prompt::new()
            .with_node("1", PromptNode::new("Int").with_literal("value", 1))
            .with_node("2", PromptNode::new("Preview").with_link("value", "1", 0));
        validate_prompt(&builtin_registry(), prompt, None).unwrap()
    }

    fn options(id: &str, priority: i64, front: bool) -> SubmitOptions {
        SubmitOptions {
            submission_id: Some(id.to_string()),
            priority,
            front,
            ..Default::default()
        }
    }

    fn drain(queue: &PromptQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.try_next())
            .map(|dispatched| dispatched.job.submission_id)
            .collect()
    }

    #[test]
    fn test_priority_then_enqueue_order() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("low", 0, false)).unwrap();
        queue.submit(validated(), options("high", 5, false)).unwrap();
        queue.submit(validated(), options("low2", 0, false)).unwrap();
        queue.submit(validated(), options("mid", 2, false)).unwrap();

        assert_eq!(drain(&queue), vec!["high", "mid", "low", "low2"]);
    }

    #[test]
    fn test_front_jumps_pending_but_not_running() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("running", 0, false)).unwrap();
        let running = queue.try_next().unwrap();
        queue.submit(validated(), options("waiting", 9, false)).unwrap();
        queue.submit(validated(), options("front1", 0, true)).unwrap();
        queue.submit(validated(), options("front2", 0, true)).unwrap();

        assert_eq!(running.job.submission_id, "running");
        assert_eq!(queue.running_count(), 1);
        assert_eq!(drain(&queue), vec!["front2", "front1", "waiting"]);
    }

    #[test]
    fn test_generated_ids_and_duplicates() {
        let queue = PromptQueue::new(10);
        let generated = queue.submit(validated(), SubmitOptions::default()).unwrap();
        assert_eq!(generated.len(), 36);

        queue.submit(validated(), options("x", 0, false)).unwrap();
        assert!(matches!(
            queue.submit(validated(), options("x", 0, false)),
            Err(QueueError::DuplicateSubmission(id)) if id == "x"
        ));
    }

    #[test]
    fn test_cancel_pending_records_cancelled() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("a", 0, false)).unwrap();
        queue.submit(validated(), options("b", 0, false)).unwrap();

        assert_eq!(queue.cancel("a").unwrap(), CancelOutcome::RemovedPending);
        assert_eq!(queue.len(), 1);
        let record = queue.history_entry("a").unwrap();
        assert_eq!(record.outcome.status, SubmissionStatus::Cancelled);
        assert!(matches!(queue.cancel("zzz"), Err(QueueError::NotFound(_))));
    }

    #[test]
    fn test_cancel_running_triggers_token() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("a", 0, false)).unwrap();
        let dispatched = queue.try_next().unwrap();

        assert_eq!(queue.cancel("a").unwrap(), CancelOutcome::SignalledRunning);
        assert!(dispatched.cancel.is_cancelled());
    }

    #[test]
    fn test_interrupt_cancels_running_only() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("a", 0, false)).unwrap();
        queue.submit(validated(), options("b", 0, false)).unwrap();
        let dispatched = queue.try_next().unwrap();

        assert_eq!(queue.interrupt(), 1);
        assert!(dispatched.cancel.is_cancelled());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_record_moves_running_to_history() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("a", 3, false)).unwrap();
        queue.try_next().unwrap();

        queue
            .record("a", SubmissionOutcome::new(SubmissionStatus::Success))
            .unwrap();

        assert_eq!(queue.running_count(), 0);
        let history = queue.history(None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].priority, 3);
        assert_eq!(queue.history(Some("a")).len(), 1);
        assert!(queue.history(Some("b")).is_empty());
        assert!(queue
            .record("a", SubmissionOutcome::new(SubmissionStatus::Success))
            .is_err());
    }

    #[test]
    fn test_history_cap_through_queue() {
        let queue = PromptQueue::new(10_000);
        for n in 0..10_001 {
            let id = format!("s{}", n);
            queue.submit(validated(), options(&id, 0, false)).unwrap();
            queue.try_next().unwrap();
            queue
                .record(&id, SubmissionOutcome::new(SubmissionStatus::Success))
                .unwrap();
        }

        assert!(queue.history_entry("s0").is_none());
        assert!(queue.history_entry("s10000").is_some());
        assert_eq!(queue.history(None).len(), 10_000);
    }

    #[test]
    fn test_snapshot_lists_dispatch_order() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("r", 0, false)).unwrap();
        queue.try_next().unwrap();
        queue.submit(validated(), options("a", 0, false)).unwrap();
        queue.submit(validated(), options("b", 4, false)).unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.running[0].submission_id, "r");
        let pending: Vec<_> = snapshot
            .pending
            .iter()
            .map(|info| info.submission_id.as_str())
            .collect();
        assert_eq!(pending, vec!["b", "a"]);
        assert_eq!(snapshot.pending[0].node_count, 2);
    }

    #[test]
    fn test_clear_pending_and_history() {
        let queue = PromptQueue::new(10);
        queue.submit(validated(), options("a", 0, false)).unwrap();
        queue.submit(validated(), options("b", 0, false)).unwrap();
        queue.cancel("b").unwrap();

        assert_eq!(queue.clear_pending(), 1);
        assert!(queue.is_empty());
        assert!(queue.delete_history("b"));
        queue.clear_history();
        assert!(queue.history(None).is_empty());
    }

    #[tokio::test]
    async fn test_next_waits_for_submission() {
        let queue = Arc::new(PromptQueue::new(10));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await.map(|d| d.job.submission_id) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.submit(validated(), options("late", 0, false)).unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_close_releases_waiters() {
        let queue = Arc::new(PromptQueue::new(10));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await.is_none() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        assert!(tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap());
        assert!(matches!(
            queue.submit(validated(), SubmitOptions::default()),
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_wait_for_returns_recorded_outcome() {
        let queue = Arc::new(PromptQueue::new(10));
        queue.submit(validated(), options("a", 0, false)).unwrap();
        queue.try_next().unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_for("a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue
            .record("a", SubmissionOutcome::new(SubmissionStatus::Error))
            .unwrap();

        let record = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(record.outcome.status, SubmissionStatus::Error);
        assert!(queue.wait_for("unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_cleared_submission_returns_none() {
        let queue = Arc::new(PromptQueue::new(10));
        queue.submit(validated(), options("a", 0, false)).unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_for("a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.clear_pending(), 1);

        let record = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_none());
        assert!(queue.history(None).is_empty());
    }
}
