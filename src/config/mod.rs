// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod node_registry;
mod runtime;
mod validation;

pub mod consts;

pub use loader::{
    load_config, load_submission, parse_submission, CacheConfig, CachePolicy, EngineConfig,
    EvictionOrder, QueueConfig,
};
pub use node_registry::NodeRegistry;
pub use runtime::RuntimeBuilder;
pub use validation::{validate_prompt, ValidatedPrompt};
