// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod cache;      // output cache policies
pub mod config;     // engine config, registry, validation
pub mod engine;     // scheduler, executor, worker
pub mod errors;     // error handling
pub mod graph;      // prompts and dynamic expansion
pub mod nodes;      // built-in node types
pub mod observability;
pub mod queue;      // prompt queue and history
pub mod traits;     // node, resource and event contracts
