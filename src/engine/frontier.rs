// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Priority frontier of ready nodes.
//!
//! Ready nodes are dispatched in a deterministic order derived from where they
//! sit in the submission:
//!
//! - **Original nodes** carry a one-element order key, their position in the
//!   submitted prompt
//! - **Ephemeral nodes** extend their parent's key with their own position in
//!   the expansion, so they sort immediately after the parent and before the
//!   parent's later siblings
//!
//! Keys compare lexicographically, so `[1] < [1, 0] < [1, 1] < [2]`.
//!
//! # Examples
//!
//! ```rust
//! use promptwood::engine::frontier::{OrderKey, ReadyFrontier, ReadyTask};
//!
//! let mut frontier = ReadyFrontier::new();
//! frontier.push(ReadyTask::new(2, OrderKey::root(2)));
//! frontier.push(ReadyTask::new(5, OrderKey::root(1).child(0)));
//! frontier.push(ReadyTask::new(1, OrderKey::root(1)));
//!
//! assert_eq!(frontier.pop(), Some(1));
//! assert_eq!(frontier.pop(), Some(5));
//! assert_eq!(frontier.pop(), Some(2));
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Index path locating a node in submission order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey(Vec<u32>);

impl OrderKey {
    pub fn root(position: u32) -> Self {
        OrderKey(vec![position])
    }

    /// Key for the `position`th node injected by the node holding `self`.
    pub fn child(&self, position: u32) -> Self {
        let mut path = self.0.clone();
        path.push(position);
        OrderKey(path)
    }
}

/// A node that is ready to run, identified by its execution-list slot.
#[derive(Debug, Clone)]
pub struct ReadyTask {
    pub slot: usize,
    pub order: OrderKey,
}

impl ReadyTask {
    pub fn new(slot: usize, order: OrderKey) -> Self {
        Self { slot, order }
    }
}

impl PartialEq for ReadyTask {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl Eq for ReadyTask {}

impl PartialOrd for ReadyTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyTask {
    /// `BinaryHeap` is a max-heap: the smallest order key must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .order
            .cmp(&self.order)
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

#[derive(Debug, Default)]
pub struct ReadyFrontier {
    heap: BinaryHeap<ReadyTask>,
}

impl ReadyFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: ReadyTask) {
        self.heap.push(task);
    }

    /// Remove and return the slot of the earliest ready node.
    pub fn pop(&mut self) -> Option<usize> {
        self.heap.pop().map(|task| task.slot)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
