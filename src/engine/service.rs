// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The front door of the engine.
//!
//! [`ExecutionService`] owns the registry, the cache, the queue and the worker
//! that drains it. Callers submit prompts, cancel them and read history through
//! it; validation happens here, before anything reaches the queue.
//!
//! # Examples
//!
//! ```rust
//! use promptwood::config::EngineConfig;
//! use promptwood::engine::events::NullSink;
//! use promptwood::engine::service::ExecutionService;
//! use promptwood::graph::{Prompt, PromptNode, Submission};
//! use promptwood::queue::SubmissionStatus;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let service = ExecutionService::from_config(&EngineConfig::default(), Arc::new(NullSink));
//! service.spawn_worker();
//!
//! let prompt = Prompt::new()
//!     .with_node("1", PromptNode::new("Int").with_literal("value", 2))
//!     .with_node("2", PromptNode::new("Preview").with_link("value", "1", 0));
//! let id = service.submit(Submission::new(prompt)).unwrap();
//!
//! let record = service.wait_for(&id).await.unwrap();
//! assert_eq!(record.outcome.status, SubmissionStatus::Success);
//! service.shutdown().await;
//! # }
//! ```

use crate::cache::{CacheStats, OutputCache};
use crate::config::{validate_prompt, EngineConfig, NodeRegistry, RuntimeBuilder, ValidatedPrompt};
use crate::engine::executor::Executor;
use crate::engine::worker::Worker;
use crate::errors::{QueueError, ValidationError};
use crate::graph::{NodeId, Prompt, Submission, SubmissionId};
use crate::observability::messages::validation::SubmissionRejected;
use crate::observability::messages::StructuredLog;
use crate::queue::{CancelOutcome, HistoryRecord, PromptQueue, QueueSnapshot, SubmitOptions};
use crate::traits::{EventSink, NoopResources, ResourceManager};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct ExecutionService {
    registry: Arc<NodeRegistry>,
    cache: Arc<dyn OutputCache>,
    queue: Arc<PromptQueue>,
    executor: Executor,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionService {
    pub fn new(
        registry: NodeRegistry,
        cache: Arc<dyn OutputCache>,
        queue: PromptQueue,
        events: Arc<dyn EventSink>,
        resources: Arc<dyn ResourceManager>,
    ) -> Self {
        let registry = Arc::new(registry);
        let executor = Executor::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            events,
            resources,
        );
        Self {
            registry,
            cache,
            queue: Arc::new(queue),
            executor,
            worker: Mutex::new(None),
        }
    }

    /// Service with the built-in nodes and the configured cache and history
    /// bound.
    pub fn from_config(cfg: &EngineConfig, events: Arc<dyn EventSink>) -> Self {
        let (registry, cache, queue) = RuntimeBuilder::from_config(cfg);
        Self::new(registry, cache, queue, events, Arc::new(NoopResources))
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<PromptQueue> {
        &self.queue
    }

    /// Check a prompt without queueing it.
    pub fn validate(
        &self,
        prompt: Prompt,
        partial_targets: Option<&[NodeId]>,
    ) -> Result<ValidatedPrompt, Vec<ValidationError>> {
        validate_prompt(&self.registry, prompt, partial_targets)
    }

    /// Validate and enqueue a submission.
    pub fn submit(&self, submission: Submission) -> Result<SubmissionId, QueueError> {
        let options = SubmitOptions::from(&submission);
        let validated = validate_prompt(
            &self.registry,
            submission.prompt,
            submission.partial_execution_targets.as_deref(),
        )
        .map_err(|errors| {
            if let Some(first) = errors.first() {
                SubmissionRejected {
                    submission_id: options.submission_id.as_deref().unwrap_or("-"),
                    error_count: errors.len(),
                    first_error: first,
                }
                .log();
            }
            QueueError::Rejected(errors)
        })?;

        self.queue.submit(validated, options)
    }

    pub fn cancel(&self, submission_id: &str) -> Result<CancelOutcome, QueueError> {
        self.queue.cancel(submission_id)
    }

    /// Cancel whatever is running now.
    pub fn interrupt(&self) -> usize {
        self.queue.interrupt()
    }

    pub fn history(&self, submission_id: Option<&str>) -> Vec<HistoryRecord> {
        self.queue.history(submission_id)
    }

    pub fn history_entry(&self, submission_id: &str) -> Option<HistoryRecord> {
        self.queue.history_entry(submission_id)
    }

    pub async fn wait_for(&self, submission_id: &str) -> Option<HistoryRecord> {
        self.queue.wait_for(submission_id).await
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    pub fn clear_pending(&self) -> usize {
        self.queue.clear_pending()
    }

    pub fn delete_history(&self, submission_id: &str) -> bool {
        self.queue.delete_history(submission_id)
    }

    pub fn clear_history(&self) {
        self.queue.clear_history()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Start the worker. Returns false if one is already running.
    pub fn spawn_worker(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let handle = Worker::new(Arc::clone(&self.queue), self.executor.clone()).spawn();
        *worker = Some(handle);
        true
    }

    /// Close the queue, cancel the running submission and wait for the worker.
    pub async fn shutdown(&self) {
        self.queue.close();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            // A worker that panicked has nothing left to record.
            let _ = handle.await;
        }
    }
}
