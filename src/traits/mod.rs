// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod events;
pub mod node;
pub mod resources;

pub use events::EventSink;
pub use node::{
    InputSpec, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, OutputSpec,
    ANY_TYPE,
};
pub use resources::{NoopResources, ResourceManager, ResourceRequest};
