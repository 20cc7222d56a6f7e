// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for queue admission, dispatch, cancellation and history.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Submission accepted into the pending queue.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SubmissionQueued<'a> {
    pub submission_id: &'a str,
    pub number: u64,
    pub priority: i64,
    pub front: bool,
    pub pending: usize,
}

impl Display for SubmissionQueued<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Queued submission {} (#{}, priority {}{}), {} pending",
            self.submission_id,
            self.number,
            self.priority,
            if self.front { ", front" } else { "" },
            self.pending
        )
    }
}

impl StructuredLog for SubmissionQueued<'_> {
    fn log(&self) {
        tracing::info!(
            submission_id = self.submission_id,
            number = self.number,
            priority = self.priority,
            front = self.front,
            pending = self.pending,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "queue_submit",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

pub struct SubmissionDequeued<'a> {
    pub submission_id: &'a str,
    pub number: u64,
    pub remaining: usize,
}

impl Display for SubmissionDequeued<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatching submission {} (#{}), {} still pending",
            self.submission_id, self.number, self.remaining
        )
    }
}

impl StructuredLog for SubmissionDequeued<'_> {
    fn log(&self) {
        tracing::debug!(
            submission_id = self.submission_id,
            number = self.number,
            remaining = self.remaining,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "queue_next",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

/// Cancellation requested for a pending or running submission.
///
/// # Log Level
/// `info!` - Client-driven state change
pub struct CancelRequested<'a> {
    pub submission_id: &'a str,
    pub running: bool,
}

impl Display for CancelRequested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.running {
            write!(f, "Signalled cancellation of running submission {}", self.submission_id)
        } else {
            write!(f, "Removed pending submission {}", self.submission_id)
        }
    }
}

impl StructuredLog for CancelRequested<'_> {
    fn log(&self) {
        tracing::info!(
            submission_id = self.submission_id,
            running = self.running,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "queue_cancel",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

/// Outcome appended to history, possibly pushing out the oldest record.
///
/// # Log Level
/// `debug!` - Bookkeeping detail
pub struct HistoryRecorded<'a> {
    pub submission_id: &'a str,
    pub status: &'a str,
    pub history_len: usize,
    pub evicted: Option<&'a str>,
}

impl Display for HistoryRecorded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Recorded submission {} as {} ({} in history)",
            self.submission_id, self.status, self.history_len
        )?;
        if let Some(evicted) = self.evicted {
            write!(f, ", dropped oldest record {}", evicted)?;
        }
        Ok(())
    }
}

impl StructuredLog for HistoryRecorded<'_> {
    fn log(&self) {
        tracing::debug!(
            submission_id = self.submission_id,
            status = self.status,
            history_len = self.history_len,
            evicted = self.evicted,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "history",
            span_name = name,
            submission_id = self.submission_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_display_marks_front() {
        let msg = SubmissionQueued {
            submission_id: "a",
            number: 3,
            priority: 0,
            front: true,
            pending: 2,
        };
        assert_eq!(msg.to_string(), "Queued submission a (#3, priority 0, front), 2 pending");
    }

    #[test]
    fn test_history_recorded_mentions_eviction() {
        let msg = HistoryRecorded {
            submission_id: "new",
            status: "success",
            history_len: 10,
            evicted: Some("old"),
        };
        assert!(msg.to_string().ends_with("dropped oldest record old"));
    }
}
