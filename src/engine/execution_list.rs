// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-submission scheduler state.
//!
//! The execution list is an arena of every node the submission knows about,
//! original and ephemeral, addressed by stable slots. Nodes enter the schedule
//! only when *staged*: staging an output target stages everything it links to,
//! except producers of lazy slots, which are staged only when the consuming
//! node asks for them. A staged node waits on its non-terminal upstreams and
//! enters the [`ReadyFrontier`] the moment the last one completes.
//!
//! Expansion never rewrites an entry: injected nodes are appended as new slots
//! and the originating node is parked back in `blocked` until they finish.

use crate::config::NodeRegistry;
use crate::engine::frontier::{OrderKey, ReadyFrontier, ReadyTask};
use crate::errors::ExecutionError;
use crate::graph::{DynamicPrompt, NodeId, Prompt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Blocked,
    Ready,
    Running,
    Done,
    Cached,
    Errored,
    Cancelled,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeState::Done | NodeState::Cached | NodeState::Errored | NodeState::Cancelled
        )
    }

    /// Terminal with outputs available to dependents.
    pub fn is_success(&self) -> bool {
        matches!(self, NodeState::Done | NodeState::Cached)
    }
}

/// A staged node that can never run because a node it links to already failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub node: NodeId,
    pub upstream: NodeId,
}

#[derive(Debug)]
struct Entry {
    id: NodeId,
    order: OrderKey,
    state: NodeState,
    staged: bool,
    waiting_on: HashSet<usize>,
    dependents: HashSet<usize>,
    /// Lazy slots whose producers have been requested
    strong_lazy: HashSet<String>,
    children: u32,
}

impl Entry {
    fn new(id: NodeId, order: OrderKey) -> Self {
        Self {
            id,
            order,
            state: NodeState::Blocked,
            staged: false,
            waiting_on: HashSet::new(),
            dependents: HashSet::new(),
            strong_lazy: HashSet::new(),
            children: 0,
        }
    }
}

#[derive(Debug)]
pub struct ExecutionList {
    entries: Vec<Entry>,
    index: HashMap<NodeId, usize>,
    frontier: ReadyFrontier,
}

impl ExecutionList {
    /// Register every node of `prompt`, unstaged, in submission order.
    pub fn new(prompt: &Prompt) -> Self {
        let mut list = Self {
            entries: Vec::with_capacity(prompt.len()),
            index: HashMap::with_capacity(prompt.len()),
            frontier: ReadyFrontier::new(),
        };
        for (position, id) in prompt.ids().enumerate() {
            list.push_entry(id.clone(), OrderKey::root(position as u32));
        }
        list
    }

    fn push_entry(&mut self, id: NodeId, order: OrderKey) -> usize {
        let slot = self.entries.len();
        self.index.insert(id.clone(), slot);
        self.entries.push(Entry::new(id, order));
        slot
    }

    /// Register a node injected by `parent`'s expansion.
    pub fn register_ephemeral(&mut self, id: &str, parent: &str) -> Result<usize, ExecutionError> {
        if let Some(&slot) = self.index.get(id) {
            return Ok(slot);
        }
        let parent_slot = self.slot_of(parent)?;
        let position = self.entries[parent_slot].children;
        self.entries[parent_slot].children += 1;
        let order = self.entries[parent_slot].order.child(position);
        Ok(self.push_entry(id.to_string(), order))
    }

    pub fn slot_of(&self, id: &str) -> Result<usize, ExecutionError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ExecutionError::UnknownNode(id.to_string()))
    }

    pub fn id(&self, slot: usize) -> &str {
        &self.entries[slot].id
    }

    pub fn state(&self, id: &str) -> Option<NodeState> {
        self.index.get(id).map(|&slot| self.entries[slot].state)
    }

    /// States of every staged node.
    pub fn states(&self) -> BTreeMap<NodeId, NodeState> {
        self.entries
            .iter()
            .filter(|entry| entry.staged)
            .map(|entry| (entry.id.clone(), entry.state))
            .collect()
    }

    /// Stage `id` and everything it needs.
    pub fn stage(
        &mut self,
        prompt: &DynamicPrompt,
        registry: &NodeRegistry,
        id: &str,
    ) -> Result<Vec<UpstreamFailure>, ExecutionError> {
        let slot = self.slot_of(id)?;
        self.stage_from(prompt, registry, vec![slot])
    }

    fn stage_from(
        &mut self,
        prompt: &DynamicPrompt,
        registry: &NodeRegistry,
        mut stack: Vec<usize>,
    ) -> Result<Vec<UpstreamFailure>, ExecutionError> {
        let mut failures = Vec::new();

        while let Some(slot) = stack.pop() {
            if self.entries[slot].staged {
                continue;
            }
            self.entries[slot].staged = true;

            let id = self.entries[slot].id.clone();
            let node = prompt
                .get_node(&id)
                .ok_or_else(|| ExecutionError::UnknownNode(id.clone()))?;
            let lazy: HashSet<String> = registry
                .get(&node.class_type)
                .map(|capability| {
                    capability
                        .inputs()
                        .into_iter()
                        .filter(|spec| spec.lazy)
                        .map(|spec| spec.name)
                        .collect()
                })
                .unwrap_or_default();

            let mut poisoned = false;
            for (input, link) in node.links() {
                if lazy.contains(input) && !self.entries[slot].strong_lazy.contains(input) {
                    continue;
                }
                let upstream = self.slot_of(link.node_id())?;
                poisoned |= self.add_dependency(slot, upstream, &mut stack, &mut failures);
            }

            if !poisoned {
                self.ready_if_unblocked(slot);
            }
        }

        Ok(failures)
    }

    /// Make `slot` wait on `upstream`. Returns true if `upstream` already failed.
    fn add_dependency(
        &mut self,
        slot: usize,
        upstream: usize,
        stack: &mut Vec<usize>,
        failures: &mut Vec<UpstreamFailure>,
    ) -> bool {
        match self.entries[upstream].state {
            NodeState::Done | NodeState::Cached => false,
            NodeState::Errored | NodeState::Cancelled => {
                failures.push(UpstreamFailure {
                    node: self.entries[slot].id.clone(),
                    upstream: self.entries[upstream].id.clone(),
                });
                true
            }
            NodeState::Blocked | NodeState::Ready | NodeState::Running => {
                self.entries[slot].waiting_on.insert(upstream);
                self.entries[upstream].dependents.insert(slot);
                if !self.entries[upstream].staged {
                    stack.push(upstream);
                }
                false
            }
        }
    }

    fn ready_if_unblocked(&mut self, slot: usize) {
        let entry = &mut self.entries[slot];
        if entry.staged && entry.state == NodeState::Blocked && entry.waiting_on.is_empty() {
            entry.state = NodeState::Ready;
            self.frontier
                .push(ReadyTask::new(slot, entry.order.clone()));
        }
    }

    /// Take the earliest ready node and mark it running.
    pub fn pop_ready(&mut self) -> Option<(usize, NodeId)> {
        while let Some(slot) = self.frontier.pop() {
            let entry = &mut self.entries[slot];
            if entry.state == NodeState::Ready {
                entry.state = NodeState::Running;
                return Some((slot, entry.id.clone()));
            }
        }
        None
    }

    /// Mark `slot` done or cached and release the nodes waiting on it.
    pub fn complete(&mut self, slot: usize, state: NodeState) {
        debug_assert!(state.is_success());
        self.entries[slot].state = state;

        let dependents: Vec<usize> = self.entries[slot].dependents.iter().copied().collect();
        for dependent in dependents {
            self.entries[dependent].waiting_on.remove(&slot);
            self.ready_if_unblocked(dependent);
        }
    }

    /// Park a running node until `upstreams` complete.
    ///
    /// Used when a node asks for lazy inputs and when it has expanded into
    /// ephemeral nodes it must wait for.
    pub fn wait_on(
        &mut self,
        prompt: &DynamicPrompt,
        registry: &NodeRegistry,
        slot: usize,
        upstreams: &[NodeId],
    ) -> Result<Vec<UpstreamFailure>, ExecutionError> {
        self.entries[slot].state = NodeState::Blocked;

        let mut stack = Vec::new();
        let mut failures = Vec::new();
        let mut poisoned = false;
        for upstream in upstreams {
            let upstream = self.slot_of(upstream)?;
            poisoned |= self.add_dependency(slot, upstream, &mut stack, &mut failures);
        }

        failures.extend(self.stage_from(prompt, registry, stack)?);
        if !poisoned {
            self.ready_if_unblocked(slot);
        }
        Ok(failures)
    }

    /// Mark lazy `inputs` of a running node as required and park it until
    /// their producers complete.
    pub fn request_lazy(
        &mut self,
        prompt: &DynamicPrompt,
        registry: &NodeRegistry,
        slot: usize,
        inputs: &[String],
    ) -> Result<Vec<UpstreamFailure>, ExecutionError> {
        let id = self.entries[slot].id.clone();
        let node = prompt
            .get_node(&id)
            .ok_or_else(|| ExecutionError::UnknownNode(id.clone()))?;

        let mut producers = Vec::new();
        for input in inputs {
            self.entries[slot].strong_lazy.insert(input.clone());
            if let Some(link) = node.inputs.get(input).and_then(|value| value.as_link()) {
                producers.push(link.node_id().to_string());
            }
        }
        self.wait_on(prompt, registry, slot, &producers)
    }

    /// Mark `slot` errored and every staged node depending on it, directly or
    /// transitively. Returns the ids of the skipped dependents.
    pub fn fail(&mut self, slot: usize) -> Vec<NodeId> {
        self.entries[slot].state = NodeState::Errored;

        let mut skipped = Vec::new();
        let mut stack: Vec<usize> = self.entries[slot].dependents.iter().copied().collect();
        stack.sort_unstable();
        while let Some(dependent) = stack.pop() {
            if self.entries[dependent].state.is_terminal() {
                continue;
            }
            self.entries[dependent].state = NodeState::Errored;
            skipped.push(self.entries[dependent].id.clone());
            stack.extend(self.entries[dependent].dependents.iter().copied());
        }
        skipped
    }

    /// Cancel every staged node that has not finished.
    pub fn cancel_pending(&mut self) -> Vec<NodeId> {
        self.frontier.clear();
        self.entries
            .iter_mut()
            .filter(|entry| entry.staged && !entry.state.is_terminal())
            .map(|entry| {
                entry.state = NodeState::Cancelled;
                entry.id.clone()
            })
            .collect()
    }

    /// Staged nodes still waiting; non-empty only when nothing is ready.
    pub fn stalled(&self) -> Vec<usize> {
        if !self.frontier.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.staged && !entry.state.is_terminal())
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Every staged node has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| !entry.staged || entry.state.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PromptNode;
    use crate::nodes::builtin_registry;
    use std::sync::Arc;

    fn int(value: i64) -> PromptNode {
        PromptNode::new("Int").with_literal("value", value)
    }

    fn add(a: &str, b: &str) -> PromptNode {
        PromptNode::new("Add").with_link("a", a, 0).with_link("b", b, 0)
    }

    fn preview(source: &str) -> PromptNode {
        PromptNode::new("Preview").with_link("value", source, 0)
    }

    /// Drive the list to completion, completing nodes in pop order.
    fn run(list: &mut ExecutionList) -> Vec<NodeId> {
        let mut order = Vec::new();
        while let Some((slot, id)) = list.pop_ready() {
            order.push(id);
            list.complete(slot, NodeState::Done);
        }
        order
    }

    #[test]
    fn test_order_respects_dependencies_and_submission_order() {
        // Output listed first, producers later and out of order.
        let prompt = Prompt::new()
            .with_node("out", preview("sum"))
            .with_node("sum", add("b", "a"))
            .with_node("b", int(2))
            .with_node("a", int(1));
        let dynamic = DynamicPrompt::new(Arc::new(prompt.clone()));
        let registry = builtin_registry();

        let mut list = ExecutionList::new(&prompt);
        assert!(list.stage(&dynamic, &registry, "out").unwrap().is_empty());
        let order = run(&mut list);

        assert_eq!(order, vec!["b", "a", "sum", "out"]);
        assert!(list.is_finished());
    }

    #[test]
    fn test_every_node_runs_after_its_dependencies() {
        // Layered graph with cross links; each node depends on two earlier ones.
        let mut prompt = Prompt::new();
        for n in (0..12).rev() {
            let id = n.to_string();
            let node = if n < 3 {
                int(n)
            } else {
                add(&(n - 1).to_string(), &(n / 2).to_string())
            };
            prompt.insert(id, node);
        }
        prompt.insert("out", preview("11"));
        let dynamic = DynamicPrompt::new(Arc::new(prompt.clone()));
        let registry = builtin_registry();

        let mut list = ExecutionList::new(&prompt);
        list.stage(&dynamic, &registry, "out").unwrap();
        let order = run(&mut list);
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        for id in &order {
            let node = prompt.get(id).unwrap();
            for (_, link) in node.links() {
                assert!(
                    position[link.node_id()] < position[id.as_str()],
                    "{} ran before its dependency {}",
                    id,
                    link.node_id()
                );
            }
        }
    }

    #[test]
    fn test_unreferenced_nodes_are_not_staged() {
        let prompt = Prompt::new()
            .with_node("1", int(1))
            .with_node("2", int(2))
            .with_node("3", preview("1"));
        let dynamic = DynamicPrompt::new(Arc::new(prompt.clone()));

        let mut list = ExecutionList::new(&prompt);
        list.stage(&dynamic, &builtin_registry(), "3").unwrap();
        assert_eq!(run(&mut list), vec!["1", "3"]);
        assert!(!list.states().contains_key("2"));
    }

    #[test]
    fn test_lazy_producer_is_staged_only_on_request() {
        let prompt = Prompt::new()
            .with_node("yes", int(1))
            .with_node("no", int(2))
            .with_node(
                "switch",
                PromptNode::new("Switch")
                    .with_literal("condition", true)
                    .with_link("on_true", "yes", 0)
                    .with_link("on_false", "no", 0),
            )
            .with_node("out", preview("switch"));
        let dynamic = DynamicPrompt::new(Arc::new(prompt.clone()));
        let registry = builtin_registry();

        let mut list = ExecutionList::new(&prompt);
        list.stage(&dynamic, &registry, "out").unwrap();

        let (slot, id) = list.pop_ready().unwrap();
        assert_eq!(id, "switch");
        list.request_lazy(&dynamic, &registry, slot, &["on_true".to_string()])
            .unwrap();
        assert_eq!(list.state("yes"), Some(NodeState::Ready));
        assert_eq!(list.state("switch"), Some(NodeState::Blocked));

        assert_eq!(run(&mut list), vec!["yes", "switch", "out"]);
        assert!(!list.states().contains_key("no"));
    }

    #[test]
    fn test_fail_skips_transitive_dependents_only() {
        let prompt = Prompt::new()
            .with_node("a1", int(1))
            .with_node("a2", add("a1", "a1"))
            .with_node("a3", preview("a2"))
            .with_node("b1", int(2))
            .with_node("b2", preview("b1"));
        let dynamic = DynamicPrompt::new(Arc::new(prompt.clone()));
        let registry = builtin_registry();

        let mut list = ExecutionList::new(&prompt);
        list.stage(&dynamic, &registry, "a3").unwrap();
        list.stage(&dynamic, &registry, "b2").unwrap();

        let (slot, id) = list.pop_ready().unwrap();
        assert_eq!(id, "a1");
        let mut skipped = list.fail(slot);
        skipped.sort();
        assert_eq!(skipped, vec!["a2", "a3"]);

        assert_eq!(run(&mut list), vec!["b1", "b2"]);
        assert_eq!(list.state("a3"), Some(NodeState::Errored));
        assert!(list.is_finished());
    }

    #[test]
    fn test_ephemeral_nodes_run_before_later_originals() {
        let prompt = Prompt::new()
            .with_node("1", int(1))
            .with_node("2", int(2))
            .with_node("3", preview("1"))
            .with_node("4", preview("2"));
        let mut dynamic = DynamicPrompt::new(Arc::new(prompt.clone()));
        let registry = builtin_registry();

        let mut list = ExecutionList::new(&prompt);
        list.stage(&dynamic, &registry, "3").unwrap();
        list.stage(&dynamic, &registry, "4").unwrap();

        let (slot, id) = list.pop_ready().unwrap();
        assert_eq!(id, "1");
        let spliced = dynamic
            .expand(
                "1",
                crate::graph::Expansion::new(
                    Prompt::new().with_node("x", int(5)),
                    vec![crate::graph::InputValue::link("x", 0)],
                ),
            )
            .unwrap();
        for injected in &spliced.node_ids {
            list.register_ephemeral(injected, "1").unwrap();
        }
        list.wait_on(&dynamic, &registry, slot, &spliced.node_ids)
            .unwrap();

        assert_eq!(run(&mut list), vec!["1.x", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_cancel_pending_and_stall_detection() {
        let prompt = Prompt::new()
            .with_node("1", int(1))
            .with_node("2", preview("1"));
        let dynamic = DynamicPrompt::new(Arc::new(prompt.clone()));

        let mut list = ExecutionList::new(&prompt);
        list.stage(&dynamic, &builtin_registry(), "2").unwrap();
        assert!(list.stalled().is_empty());

        let (slot, _) = list.pop_ready().unwrap();
        // Put "1" back to blocked without anything to wait on: nothing can progress.
        list.entries[slot].state = NodeState::Blocked;
        list.entries[slot].waiting_on.insert(slot);
        assert_eq!(list.stalled().len(), 2);

        let cancelled = list.cancel_pending();
        assert_eq!(cancelled, vec!["1", "2"]);
        assert!(list.is_finished());
    }
}
