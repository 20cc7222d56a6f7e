// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::events::ExecutionEvent;

/// Destination for execution events.
///
/// `emit` is fire-and-forget: implementations must not block and must swallow
/// delivery failures, so an absent listener never stalls execution.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ExecutionEvent);
}
