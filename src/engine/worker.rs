// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::executor::Executor;
use crate::observability::messages::engine::{OutcomeNotRecorded, WorkerLifecycle};
use crate::observability::messages::StructuredLog;
use crate::queue::PromptQueue;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// The single consumer of a [`PromptQueue`].
///
/// Submissions run one at a time: the worker takes the next one, executes it to
/// a terminal status and moves it to history before asking for another. The
/// loop ends when the queue is closed.
pub struct Worker {
    queue: Arc<PromptQueue>,
    executor: Executor,
}

impl Worker {
    pub fn new(queue: Arc<PromptQueue>, executor: Executor) -> Self {
        Self { queue, executor }
    }

    pub async fn run(self) {
        WorkerLifecycle { running: true }.log();

        while let Some(dispatched) = self.queue.next().await {
            let job = &dispatched.job;
            let outcome = self
                .executor
                .execute(job, &dispatched.cancel)
                .instrument(tracing::info_span!("submission", submission_id = %job.submission_id))
                .await;

            if let Err(error) = self.queue.record(&job.submission_id, outcome) {
                OutcomeNotRecorded {
                    submission_id: &job.submission_id,
                    error: &error,
                }
                .log();
            }
        }

        WorkerLifecycle { running: false }.log();
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
