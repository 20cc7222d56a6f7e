// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! All diagnostic and operational log text in promptwood lives here as message
//! structs implementing `Display` and [`messages::StructuredLog`], so call sites
//! never carry magic strings and every event logs the same structured fields.
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - submission execution and node lifecycle
//! * `messages::queue` - queue admission, dispatch and history
//! * `messages::cache` - cache eviction and admission
//! * `messages::validation` - prompt validation failures
//!
//! # Usage
//!
//! ```rust
//! use promptwood::observability::messages::StructuredLog;
//! use promptwood::observability::messages::engine::NodeDispatched;
//!
//! NodeDispatched {
//!     submission_id: "abc",
//!     node_id: "4",
//!     class_type: "Add",
//! }
//! .log();
//! ```

pub mod messages;
