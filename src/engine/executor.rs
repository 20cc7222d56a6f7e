// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Drives one submission from its output targets to a [`SubmissionOutcome`].
//!
//! The loop pops the earliest ready node from the [`ExecutionList`] and settles
//! it in one of four ways:
//!
//! 1. **Expansion pending**: the node expanded earlier and its injected nodes
//!    have finished, so its outputs are read from them without invoking again
//! 2. **Cache hit**: the output stored under the node's fingerprint is reused
//! 3. **Lazy request**: the capability asked for lazy inputs that have not been
//!    evaluated yet, so the node is parked until their producers finish
//! 4. **Invocation**: the capability runs inside `acquire`/`release` of the
//!    resource manager and returns outputs, an expansion, or an error
//!
//! A failure errors the node and skips everything downstream of it. Sibling
//! branches keep running. Cancellation is checked between dispatches.

use crate::cache::{CachedOutput, Fingerprint, OutputCache};
use crate::config::NodeRegistry;
use crate::engine::events::ExecutionEvent;
use crate::engine::execution_list::{ExecutionList, NodeState, UpstreamFailure};
use crate::engine::fingerprint::{literal_inputs, Fingerprinter};
use crate::errors::{ExecutionError, ExpansionError, FailureCause, NodeError, NodeFailure};
use crate::graph::{DynamicPrompt, Expansion, InputValue, NodeId, PromptNode};
use crate::observability::messages::engine::{
    DependentsSkipped, ExecutionStalled, LazyInputsRequested, NodeCacheHit, NodeDispatched,
    NodeExecutionFailed, NodeExpanded, SubmissionCancelled, SubmissionCompleted,
    SubmissionStarted,
};
use crate::observability::messages::StructuredLog;
use crate::queue::{unix_millis, QueuedPrompt, SubmissionOutcome, SubmissionStatus};
use crate::traits::{
    EventSink, NodeCapability, NodeContext, NodeInputs, NodeOutput, NodeResult, ResourceManager,
    ResourceRequest,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Executes validated prompts against a registry, a cache and a resource manager.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<NodeRegistry>,
    cache: Arc<dyn OutputCache>,
    events: Arc<dyn EventSink>,
    resources: Arc<dyn ResourceManager>,
}

impl Executor {
    pub fn new(
        registry: Arc<NodeRegistry>,
        cache: Arc<dyn OutputCache>,
        events: Arc<dyn EventSink>,
        resources: Arc<dyn ResourceManager>,
    ) -> Self {
        Self {
            registry,
            cache,
            events,
            resources,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<dyn OutputCache> {
        &self.cache
    }

    /// Run `job` to completion. Never fails as a whole: node errors and
    /// cancellation are reported in the outcome.
    pub async fn execute(&self, job: &QueuedPrompt, cancel: &CancellationToken) -> SubmissionOutcome {
        Run::new(self, job, cancel).drive().await
    }
}

/// Mutable state of one submission, owned by the worker while it runs.
struct Run<'a> {
    submission_id: &'a str,
    targets: &'a [NodeId],
    cancel: &'a CancellationToken,
    registry: &'a NodeRegistry,
    cache: &'a dyn OutputCache,
    resources: &'a dyn ResourceManager,
    events: &'a Arc<dyn EventSink>,
    prompt: DynamicPrompt,
    list: ExecutionList,
    fingerprints: Fingerprinter,
    /// Cache hits looked up before the first dispatch
    prefetched: HashMap<NodeId, CachedOutput>,
    results: HashMap<NodeId, Arc<NodeOutput>>,
    /// Output mappings of nodes waiting on their own expansion
    expansions: HashMap<NodeId, Vec<InputValue>>,
    cancelled: bool,
    outcome: SubmissionOutcome,
}

impl<'a> Run<'a> {
    fn new(executor: &'a Executor, job: &'a QueuedPrompt, cancel: &'a CancellationToken) -> Self {
        let original = Arc::clone(job.prompt.prompt());
        Self {
            submission_id: &job.submission_id,
            targets: job.prompt.targets(),
            cancel,
            registry: &executor.registry,
            cache: executor.cache.as_ref(),
            resources: executor.resources.as_ref(),
            events: &executor.events,
            list: ExecutionList::new(&original),
            prompt: DynamicPrompt::new(original),
            fingerprints: Fingerprinter::new(),
            prefetched: HashMap::new(),
            results: HashMap::new(),
            expansions: HashMap::new(),
            cancelled: false,
            outcome: SubmissionOutcome::new(SubmissionStatus::Running),
        }
    }

    async fn drive(mut self) -> SubmissionOutcome {
        let started = Instant::now();
        SubmissionStarted {
            submission_id: self.submission_id,
            node_count: self.prompt.original().len(),
            target_count: self.targets.len(),
        }
        .log();
        self.emit(
            ExecutionEvent::SubmissionStarted {
                submission_id: self.submission_id.to_string(),
            },
            true,
        );

        self.prepare_cache();
        for target in self.targets {
            let staged = self.list.stage(&self.prompt, self.registry, target);
            self.after_staging(target, staged);
        }
        self.prefetch();

        loop {
            if self.cancel.is_cancelled() {
                self.cancel_remaining();
                break;
            }

            let Some((slot, id)) = self.list.pop_ready() else {
                let stalled = self.list.stalled();
                if stalled.is_empty() {
                    break;
                }
                self.fail_stalled(stalled);
                continue;
            };

            self.dispatch(slot, &id).await;
        }

        self.finish(started)
    }

    /// Tell the cache which fingerprints this submission can still use.
    fn prepare_cache(&mut self) {
        let ids: Vec<NodeId> = self.prompt.original().ids().cloned().collect();
        let live: HashSet<Fingerprint> = ids
            .iter()
            .filter_map(|id| {
                self.fingerprints
                    .fingerprint(&self.prompt, self.registry, id)
                    .ok()
            })
            .collect();
        self.cache.retain_for_submission(&live);
        self.cache.evict_if_needed();
    }

    /// Look up every staged node once so cache hits can be announced up front.
    fn prefetch(&mut self) {
        let states = self.list.states();
        let staged: Vec<NodeId> = self
            .prompt
            .original()
            .ids()
            .filter(|id| states.contains_key(id.as_str()))
            .cloned()
            .collect();

        let mut cached = Vec::new();
        for id in staged {
            let idempotent = self
                .prompt
                .get_node(&id)
                .and_then(|node| self.registry.get(&node.class_type))
                .is_some_and(|capability| capability.idempotent());
            if !idempotent {
                continue;
            }
            let Ok(fingerprint) = self.fingerprints.fingerprint(&self.prompt, self.registry, &id)
            else {
                continue;
            };
            if let Some(entry) = self.cache.get(&fingerprint) {
                self.prefetched.insert(id.clone(), entry);
                cached.push(id);
            }
        }

        self.emit(
            ExecutionEvent::NodesCached {
                submission_id: self.submission_id.to_string(),
                nodes: cached,
            },
            true,
        );
    }

    async fn dispatch(&mut self, slot: usize, id: &str) {
        let Some(node) = self.prompt.get_node(id).cloned() else {
            self.fail_execution(slot, ExecutionError::UnknownNode(id.to_string()));
            return;
        };
        let Some(capability) = self.registry.get(&node.class_type).cloned() else {
            self.fail_execution(
                slot,
                ExecutionError::NodeTypeNotRegistered(node.class_type.clone()),
            );
            return;
        };

        if let Some(mapping) = self.expansions.remove(id) {
            self.settle_expansion(slot, id, capability.as_ref(), &mapping);
            return;
        }

        let fingerprint = match self.fingerprints.fingerprint(&self.prompt, self.registry, id) {
            Ok(fingerprint) => fingerprint,
            Err(error) => {
                self.fail_execution(slot, error);
                return;
            }
        };

        if capability.idempotent() {
            let hit = match self.prefetched.remove(id) {
                Some(entry) => Some(entry),
                None => self.cache.get(&fingerprint),
            };
            if let Some(entry) = hit {
                NodeCacheHit {
                    node_id: id,
                    fingerprint: fingerprint.short(),
                }
                .log();
                self.outcome.cached.push(id.to_string());
                self.store(slot, id, capability.as_ref(), entry.output, NodeState::Cached);
                return;
            }
        }

        let inputs = match self.resolve_inputs(id, &node, capability.as_ref()) {
            Ok(inputs) => inputs,
            Err(error) => {
                self.fail_execution(slot, error);
                return;
            }
        };

        let requested: Vec<String> = capability
            .check_lazy_status(&inputs)
            .into_iter()
            .filter(|input| {
                !inputs.contains(input)
                    && node.inputs.get(input).is_some_and(|value| value.as_link().is_some())
            })
            .collect();
        if !requested.is_empty() {
            LazyInputsRequested {
                node_id: id,
                slots: &requested,
            }
            .log();
            let staged = self
                .list
                .request_lazy(&self.prompt, self.registry, slot, &requested);
            self.after_parking(slot, staged);
            return;
        }

        self.invoke(slot, id, &node, capability, inputs, fingerprint)
            .await;
    }

    async fn invoke(
        &mut self,
        slot: usize,
        id: &str,
        node: &PromptNode,
        capability: Arc<dyn NodeCapability>,
        inputs: NodeInputs,
        fingerprint: Fingerprint,
    ) {
        let display = self.prompt.display_node(id).to_string();
        NodeDispatched {
            submission_id: self.submission_id,
            node_id: id,
            class_type: &node.class_type,
        }
        .log();
        self.emit(
            ExecutionEvent::NodeStarted {
                submission_id: self.submission_id.to_string(),
                node_id: id.to_string(),
                display_node: display.clone(),
            },
            false,
        );

        let request = ResourceRequest {
            node_id: id,
            class_type: &node.class_type,
        };
        let resources = self.resources;
        if let Err(error) = resources.acquire(request).await {
            self.fail_execution(slot, ExecutionError::Resource(error));
            return;
        }

        let context = NodeContext::new(
            self.submission_id.to_string(),
            id.to_string(),
            display,
            self.cancel.clone(),
            Arc::clone(self.events),
        );
        let result = capability.invoke(inputs, &context).await;
        resources.release(request).await;
        self.outcome.executed.push(id.to_string());

        let declared = capability.outputs().len();
        match result {
            Ok(NodeResult::Output(output)) => {
                if output.values.len() != declared {
                    self.fail_execution(
                        slot,
                        ExecutionError::OutputArity {
                            expected: declared,
                            actual: output.values.len(),
                        },
                    );
                    return;
                }
                let output = Arc::new(output);
                if capability.idempotent() {
                    let footprint = capability.estimate_footprint(&output);
                    self.cache
                        .put(fingerprint, CachedOutput::new(Arc::clone(&output), footprint));
                }
                self.store(slot, id, capability.as_ref(), output, NodeState::Done);
            }
            Ok(NodeResult::Expand(expansion)) => {
                if expansion.outputs.len() != declared {
                    self.fail_execution(
                        slot,
                        ExecutionError::Expansion(ExpansionError::OutputArity {
                            expected: declared,
                            actual: expansion.outputs.len(),
                        }),
                    );
                    return;
                }
                self.splice(slot, id, expansion);
            }
            // The token fired and the node honoured it; the loop cancels it
            // along with everything still pending.
            Err(NodeError::Cancelled) if self.cancel.is_cancelled() => {}
            Err(error) => self.fail_execution(slot, ExecutionError::Node(error)),
        }
    }

    /// Splice an expansion and park its originating node until the injected
    /// nodes feeding its outputs are done.
    fn splice(&mut self, slot: usize, id: &str, expansion: Expansion) {
        let spliced = match self.prompt.expand(id, expansion) {
            Ok(spliced) => spliced,
            Err(error) => {
                self.fail_execution(slot, ExecutionError::Expansion(error));
                return;
            }
        };

        for injected in &spliced.node_ids {
            if let Err(error) = self.list.register_ephemeral(injected, id) {
                self.fail_execution(slot, error);
                return;
            }
        }
        NodeExpanded {
            node_id: id,
            injected: spliced.node_ids.len(),
        }
        .log();

        let mut waits: Vec<NodeId> = Vec::new();
        for value in &spliced.outputs {
            if let Some(link) = value.as_link() {
                if !waits.iter().any(|w| w == link.node_id()) {
                    waits.push(link.node_id().to_string());
                }
            }
        }
        // Injected output nodes run even when no output maps to them.
        for injected in &spliced.node_ids {
            let is_output = self
                .prompt
                .get_node(injected)
                .and_then(|node| self.registry.get(&node.class_type))
                .is_some_and(|capability| capability.is_output_node());
            if is_output && !waits.contains(injected) {
                waits.push(injected.clone());
            }
        }

        self.expansions.insert(id.to_string(), spliced.outputs);
        let staged = self.list.wait_on(&self.prompt, self.registry, slot, &waits);
        self.after_parking(slot, staged);
    }

    /// Build the outputs of an expanded node from the nodes it injected.
    fn settle_expansion(
        &mut self,
        slot: usize,
        id: &str,
        capability: &dyn NodeCapability,
        mapping: &[InputValue],
    ) {
        let mut values = Vec::with_capacity(mapping.len());
        for value in mapping {
            match value {
                InputValue::Literal(literal) => values.push(literal.clone()),
                InputValue::Link(link) => match self.upstream_value(link.node_id(), link.output()) {
                    Ok(value) => values.push(value),
                    Err(error) => {
                        self.fail_execution(slot, error);
                        return;
                    }
                },
            }
        }

        let output = Arc::new(NodeOutput::new(values));
        if capability.idempotent() {
            if let Some(fingerprint) = self.fingerprints.get(id).cloned() {
                let footprint = capability.estimate_footprint(&output);
                self.cache
                    .put(fingerprint, CachedOutput::new(Arc::clone(&output), footprint));
            }
        }
        self.store(slot, id, capability, output, NodeState::Done);
    }

    fn resolve_inputs(
        &self,
        id: &str,
        node: &PromptNode,
        capability: &dyn NodeCapability,
    ) -> Result<NodeInputs, ExecutionError> {
        let lazy: HashSet<String> = capability
            .inputs()
            .into_iter()
            .filter(|spec| spec.lazy)
            .map(|spec| spec.name)
            .collect();

        let mut inputs = literal_inputs(&self.prompt, self.registry, id)?;
        for (input, link) in node.links() {
            if lazy.contains(input) && !self.results.contains_key(link.node_id()) {
                // Unevaluated lazy slots are left out for check_lazy_status.
                continue;
            }
            inputs.insert(input, self.upstream_value(link.node_id(), link.output())?);
        }
        Ok(inputs)
    }

    fn upstream_value(&self, upstream: &str, output: usize) -> Result<serde_json::Value, ExecutionError> {
        self.results
            .get(upstream)
            .and_then(|result| result.values.get(output))
            .cloned()
            .ok_or_else(|| ExecutionError::MissingUpstreamOutput {
                upstream: upstream.to_string(),
                output,
            })
    }

    fn store(
        &mut self,
        slot: usize,
        id: &str,
        capability: &dyn NodeCapability,
        output: Arc<NodeOutput>,
        state: NodeState,
    ) {
        if capability.is_output_node() {
            if let Some(ui) = &output.ui {
                self.outcome.outputs.insert(id.to_string(), ui.clone());
            }
        }
        self.emit(
            ExecutionEvent::NodeFinished {
                submission_id: self.submission_id.to_string(),
                node_id: id.to_string(),
                display_node: self.prompt.display_node(id).to_string(),
                ui: output.ui.clone(),
            },
            false,
        );
        self.results.insert(id.to_string(), output);
        self.list.complete(slot, state);
    }

    fn after_staging(
        &mut self,
        target: &str,
        staged: Result<Vec<UpstreamFailure>, ExecutionError>,
    ) {
        match staged {
            Ok(failures) => self.skip_poisoned(failures),
            Err(error) => {
                if let Ok(slot) = self.list.slot_of(target) {
                    self.fail_execution(slot, error);
                }
            }
        }
    }

    fn after_parking(
        &mut self,
        slot: usize,
        staged: Result<Vec<UpstreamFailure>, ExecutionError>,
    ) {
        match staged {
            Ok(failures) => self.skip_poisoned(failures),
            Err(error) => self.fail_execution(slot, error),
        }
    }

    /// Error staged nodes that link to something that already failed.
    fn skip_poisoned(&mut self, failures: Vec<UpstreamFailure>) {
        for failure in failures {
            let Ok(slot) = self.list.slot_of(&failure.node) else {
                continue;
            };
            if self.list.state(&failure.node).is_some_and(|s| s.is_terminal()) {
                continue;
            }
            let root = self.root_failure(&failure.upstream);
            self.fail_slot(slot, FailureCause::UpstreamFailed { upstream: root });
        }
    }

    /// The node whose own execution failed, following skip records upstream.
    fn root_failure(&self, id: &str) -> NodeId {
        self.outcome
            .errors
            .iter()
            .find(|failure| failure.node_id == id)
            .and_then(|failure| match &failure.cause {
                FailureCause::UpstreamFailed { upstream } => Some(upstream.clone()),
                FailureCause::Execution { .. } => None,
            })
            .unwrap_or_else(|| id.to_string())
    }

    fn fail_stalled(&mut self, stalled: Vec<usize>) {
        let ids: Vec<NodeId> = stalled.iter().map(|&slot| self.list.id(slot).to_string()).collect();
        ExecutionStalled {
            submission_id: self.submission_id,
            nodes: &ids,
        }
        .log();
        for (slot, id) in stalled.into_iter().zip(ids) {
            if self.list.state(&id).is_some_and(|s| s.is_terminal()) {
                continue;
            }
            self.fail_execution(slot, ExecutionError::DependencyCycle(id));
        }
    }

    fn fail_execution(&mut self, slot: usize, error: ExecutionError) {
        let id = self.list.id(slot).to_string();
        let class_type = self.class_type_of(&id);
        NodeExecutionFailed {
            node_id: &id,
            class_type: &class_type,
            error: &error,
        }
        .log();
        self.fail_slot(
            slot,
            FailureCause::Execution {
                message: error.to_string(),
            },
        );
    }

    fn fail_slot(&mut self, slot: usize, cause: FailureCause) {
        let id = self.list.id(slot).to_string();
        let root = match &cause {
            FailureCause::Execution { .. } => id.clone(),
            FailureCause::UpstreamFailed { upstream } => upstream.clone(),
        };

        let failure = self.failure_for(&id, cause);
        if !failure.is_skipped() {
            self.emit(
                ExecutionEvent::NodeErrored {
                    submission_id: self.submission_id.to_string(),
                    failure: failure.clone(),
                },
                true,
            );
        }
        self.outcome.errors.push(failure);

        let skipped = self.list.fail(slot);
        if skipped.is_empty() {
            return;
        }
        DependentsSkipped {
            failed_node: &id,
            skipped: &skipped,
        }
        .log();
        for dependent in skipped {
            let failure = self.failure_for(
                &dependent,
                FailureCause::UpstreamFailed {
                    upstream: root.clone(),
                },
            );
            self.outcome.errors.push(failure);
        }
    }

    fn failure_for(&self, id: &str, cause: FailureCause) -> NodeFailure {
        NodeFailure {
            node_id: id.to_string(),
            class_type: self.class_type_of(id),
            display_node: self.prompt.display_node(id).to_string(),
            parent: self.prompt.parent_of(id).map(str::to_string),
            cause,
        }
    }

    fn class_type_of(&self, id: &str) -> String {
        self.prompt
            .get_node(id)
            .map(|node| node.class_type.clone())
            .unwrap_or_default()
    }

    fn cancel_remaining(&mut self) {
        let cancelled = self.list.cancel_pending();
        SubmissionCancelled {
            submission_id: self.submission_id,
            cancelled_nodes: cancelled.len(),
        }
        .log();
        self.cancelled = true;
        self.emit(
            ExecutionEvent::SubmissionInterrupted {
                submission_id: self.submission_id.to_string(),
            },
            true,
        );
    }

    fn finish(mut self, started: Instant) -> SubmissionOutcome {
        let status = if self.cancelled {
            SubmissionStatus::Cancelled
        } else if self.outcome.errors.is_empty() {
            SubmissionStatus::Success
        } else {
            SubmissionStatus::Error
        };

        self.emit(
            ExecutionEvent::SubmissionComplete {
                submission_id: self.submission_id.to_string(),
                status,
            },
            true,
        );

        let failed = self
            .outcome
            .errors
            .iter()
            .filter(|failure| !failure.is_skipped())
            .count();
        SubmissionCompleted {
            submission_id: self.submission_id,
            status: status.as_str(),
            duration: started.elapsed(),
            executed: self.outcome.executed.len(),
            cached: self.outcome.cached.len(),
            failed,
        }
        .log();

        self.outcome.status = status;
        self.outcome.node_states = self.list.states();
        self.outcome.finished_at_ms = unix_millis();
        self.outcome
    }

    /// Emit to the sink; submission-level events are also kept for history.
    fn emit(&mut self, event: ExecutionEvent, keep: bool) {
        if keep {
            self.outcome.messages.push(event.clone());
        }
        self.events.emit(event);
    }
}
