// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph model: submitted prompts, the submission envelope, and the dynamic
//! overlay that tracks nodes injected during execution.

pub mod cycles;
pub mod dynamic;
pub mod prompt;
pub mod submission;

pub use dynamic::{DynamicPrompt, Expansion, SplicedExpansion};
pub use prompt::{InputValue, Link, NodeId, Prompt, PromptNode};
pub use submission::{Submission, SubmissionId};
