// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod events;
pub mod execution_list;
pub mod executor;
pub mod fingerprint;
pub mod frontier;
pub mod service;
pub mod worker;

pub use execution_list::NodeState;
pub use executor::Executor;
pub use service::ExecutionService;
pub use worker::Worker;
