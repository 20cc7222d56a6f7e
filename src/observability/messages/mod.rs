// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `engine` - submission execution and node lifecycle events
//! * `queue` - submission admission, dispatch, cancellation and history
//! * `cache` - eviction and admission decisions of the output caches
//! * `validation` - prompt validation failures

use tracing::Span;

pub mod cache;
pub mod engine;
pub mod queue;
pub mod validation;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message at its level with structured fields attached.
    fn log(&self);

    /// Build a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
