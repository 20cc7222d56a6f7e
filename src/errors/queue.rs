// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ValidationError;
use thiserror::Error;

/// Errors returned by the prompt queue and the service front door.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The submission failed validation and was never enqueued
    #[error("submission rejected with {} validation error(s)", .0.len())]
    Rejected(Vec<ValidationError>),

    #[error("submission id '{0}' is already pending or running")]
    DuplicateSubmission(String),

    #[error("no pending or running submission with id '{0}'")]
    NotFound(String),

    /// The queue was closed by a service shutdown
    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            QueueError::Rejected(errors) => errors,
            _ => &[],
        }
    }
}
