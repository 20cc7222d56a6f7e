// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ResourceError;
use async_trait::async_trait;

/// The node about to run or that just ran.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'a> {
    pub node_id: &'a str,
    pub class_type: &'a str,
}

/// Hooks around every node invocation for preparing and releasing heavy
/// resources such as loaded models or device memory.
///
/// `release` runs after every invocation whose `acquire` succeeded, whether the
/// invocation itself succeeded or not.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn acquire(&self, request: ResourceRequest<'_>) -> Result<(), ResourceError>;

    async fn release(&self, request: ResourceRequest<'_>);
}

/// Resource manager that has nothing to manage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResources;

#[async_trait]
impl ResourceManager for NoopResources {
    async fn acquire(&self, _request: ResourceRequest<'_>) -> Result<(), ResourceError> {
        Ok(())
    }

    async fn release(&self, _request: ResourceRequest<'_>) {}
}
