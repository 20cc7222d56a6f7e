// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod queue;
mod validation;

pub use config::ConfigError;
pub use execution::{
    ExecutionError, ExpansionError, FailureCause, NodeError, NodeFailure, ResourceError,
};
pub use queue::QueueError;
pub use validation::ValidationError;
