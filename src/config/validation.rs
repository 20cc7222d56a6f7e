// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Prompt validation run once at submission.
//!
//! Validation checks every node against the registry and the link graph
//! against itself, collecting all errors rather than stopping at the first:
//!
//! - **Node types**: each `class_type` must be registered
//! - **Required inputs**: each required slot without a default must be set
//! - **Links**: each link must name a node of the prompt, an output index the
//!   producer declares, and a type the consuming slot accepts (`"*"` matches
//!   anything)
//! - **Acyclicity**: the link graph must not contain a cycle; the first cycle
//!   found is reported as a closed path
//! - **Targets**: at least one output node must be executed, and any partial
//!   execution target must be an output node
//!
//! Literals for slots a node does not declare are logged and ignored. Only a
//! [`ValidatedPrompt`] can be queued, so the executor never sees a prompt that
//! failed these checks.

use crate::config::NodeRegistry;
use crate::errors::ValidationError;
use crate::graph::cycles::{find_cycle, Adjacency};
use crate::graph::{InputValue, NodeId, Prompt, PromptNode};
use crate::observability::messages::validation::{CyclicDependencyDetected, UnknownInputIgnored};
use crate::observability::messages::StructuredLog;
use crate::traits::node::types_compatible;
use std::sync::Arc;

/// A prompt that passed validation, with the output nodes it will execute.
#[derive(Debug, Clone)]
pub struct ValidatedPrompt {
    prompt: Arc<Prompt>,
    targets: Vec<NodeId>,
}

impl ValidatedPrompt {
    pub fn prompt(&self) -> &Arc<Prompt> {
        &self.prompt
    }

    /// Output nodes to execute, in submission order.
    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }
}

/// Validate `prompt` against `registry`.
///
/// `partial_targets` restricts execution to the named output nodes; otherwise
/// every output node in the prompt is a target.
pub fn validate_prompt(
    registry: &NodeRegistry,
    prompt: Prompt,
    partial_targets: Option<&[NodeId]>,
) -> Result<ValidatedPrompt, Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (node_id, node) in prompt.iter() {
        errors.extend(validate_node(registry, &prompt, node_id, node));
    }

    if let Err(cycle_errors) = validate_acyclic_graph(&prompt) {
        errors.extend(cycle_errors);
    }

    let targets = match resolve_targets(registry, &prompt, partial_targets) {
        Ok(targets) => targets,
        Err(target_errors) => {
            errors.extend(target_errors);
            Vec::new()
        }
    };

    if errors.is_empty() {
        Ok(ValidatedPrompt {
            prompt: Arc::new(prompt),
            targets,
        })
    } else {
        Err(errors)
    }
}

fn validate_node(
    registry: &NodeRegistry,
    prompt: &Prompt,
    node_id: &str,
    node: &PromptNode,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let Some(capability) = registry.get(&node.class_type) else {
        errors.push(ValidationError::UnknownNodeType {
            node_id: node_id.to_string(),
            class_type: node.class_type.clone(),
        });
        return errors;
    };
    let specs = capability.inputs();

    for spec in &specs {
        if spec.required && spec.default.is_none() && !node.inputs.contains_key(&spec.name) {
            errors.push(ValidationError::MissingRequiredInput {
                node_id: node_id.to_string(),
                class_type: node.class_type.clone(),
                input: spec.name.clone(),
            });
        }
    }

    for (slot, value) in &node.inputs {
        let spec = specs.iter().find(|spec| &spec.name == slot);
        if spec.is_none() {
            UnknownInputIgnored {
                node_id,
                class_type: &node.class_type,
                input: slot,
            }
            .log();
        }

        let InputValue::Link(link) = value else {
            continue;
        };
        let Some(source) = prompt.get(link.node_id()) else {
            errors.push(ValidationError::UnresolvedLink {
                node_id: node_id.to_string(),
                input: slot.clone(),
                missing: link.node_id().to_string(),
            });
            continue;
        };
        // An unregistered producer is reported on its own node.
        let Some(producer) = registry.get(&source.class_type) else {
            continue;
        };

        let outputs = producer.outputs();
        let Some(output) = outputs.get(link.output()) else {
            errors.push(ValidationError::OutputOutOfRange {
                node_id: node_id.to_string(),
                input: slot.clone(),
                source_node: link.node_id().to_string(),
                output: link.output(),
                available: outputs.len(),
            });
            continue;
        };

        if let Some(spec) = spec {
            if !types_compatible(&spec.kind, &output.kind) {
                errors.push(ValidationError::TypeMismatch {
                    node_id: node_id.to_string(),
                    input: slot.clone(),
                    source_node: link.node_id().to_string(),
                    output: link.output(),
                    expected: spec.kind.clone(),
                    actual: output.kind.clone(),
                });
            }
        }
    }

    errors
}

/// Rejects the prompt if its links form a cycle.
///
/// Edges run from a node to the producers it links to, lazy links included: a
/// lazy slot may still be requested at runtime.
fn validate_acyclic_graph(prompt: &Prompt) -> Result<(), Vec<ValidationError>> {
    let graph: Adjacency = prompt
        .iter()
        .map(|(id, node)| {
            (
                id.as_str(),
                node.links().map(|(_, link)| link.node_id()).collect(),
            )
        })
        .collect();

    match find_cycle(prompt.ids().map(String::as_str), &graph) {
        Some(cycle) => {
            CyclicDependencyDetected { cycle: &cycle }.log();
            Err(vec![ValidationError::CyclicDependency { cycle }])
        }
        None => Ok(()),
    }
}

fn resolve_targets(
    registry: &NodeRegistry,
    prompt: &Prompt,
    partial_targets: Option<&[NodeId]>,
) -> Result<Vec<NodeId>, Vec<ValidationError>> {
    let is_output = |id: &str| {
        prompt
            .get(id)
            .and_then(|node| registry.get(&node.class_type))
            .is_some_and(|capability| capability.is_output_node())
    };

    let targets: Vec<NodeId> = match partial_targets {
        Some(requested) => {
            let invalid: Vec<ValidationError> = requested
                .iter()
                .filter(|id| !is_output(id))
                .map(|id| ValidationError::InvalidTarget {
                    node_id: id.clone(),
                })
                .collect();
            if !invalid.is_empty() {
                return Err(invalid);
            }
            // Keep submission order and drop duplicates.
            prompt
                .ids()
                .filter(|id| requested.contains(id))
                .cloned()
                .collect()
        }
        None => prompt.ids().filter(|id| is_output(id)).cloned().collect(),
    };

    if targets.is_empty() {
        return Err(vec![ValidationError::NoOutputs]);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::builtin_registry;

    fn number(id: &str, value: i64) -> (String, PromptNode) {
        (
            id.to_string(),
            PromptNode::new("Int").with_literal("value", value),
        )
    }

    fn prompt(nodes: Vec<(String, PromptNode)>) -> Prompt {
        nodes
            .into_iter()
            .fold(Prompt::new(), |p, (id, node)| p.with_node(id, node))
    }

    fn preview(source: &str) -> PromptNode {
        PromptNode::new("Preview").with_link("value", source, 0)
    }

    #[test]
    fn test_valid_linear_chain() {
        let p = prompt(vec![
            number("1", 2),
            (
                "2".into(),
                PromptNode::new("Add")
                    .with_link("a", "1", 0)
                    .with_literal("b", 3),
            ),
            ("3".into(), preview("2")),
        ]);

        let validated = validate_prompt(&builtin_registry(), p, None).unwrap();
        assert_eq!(validated.targets(), ["3".to_string()]);
        assert_eq!(validated.prompt().len(), 3);
    }

    #[test]
    fn test_unknown_node_type() {
        let p = prompt(vec![
            ("1".into(), PromptNode::new("Teleport")),
            ("2".into(), preview("1")),
        ]);

        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnknownNodeType {
                node_id: "1".into(),
                class_type: "Teleport".into()
            }]
        );
    }

    #[test]
    fn test_missing_required_input() {
        let p = prompt(vec![
            ("1".into(), PromptNode::new("Add").with_literal("a", 1)),
            ("2".into(), preview("1")),
        ]);

        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert!(matches!(
            &errors[..],
            [ValidationError::MissingRequiredInput { input, .. }] if input == "b"
        ));
    }

    #[test]
    fn test_unresolved_link() {
        let p = prompt(vec![("2".into(), preview("404"))]);

        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnresolvedLink {
                node_id: "2".into(),
                input: "value".into(),
                missing: "404".into()
            }]
        );
    }

    #[test]
    fn test_output_index_out_of_range() {
        let p = prompt(vec![
            number("1", 1),
            (
                "2".into(),
                PromptNode::new("Preview").with_link("value", "1", 3),
            ),
        ]);

        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert!(matches!(
            &errors[..],
            [ValidationError::OutputOutOfRange { output: 3, available: 1, .. }]
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let p = prompt(vec![
            number("1", 1),
            (
                "2".into(),
                PromptNode::new("Concat")
                    .with_link("a", "1", 0)
                    .with_literal("b", "x"),
            ),
            ("3".into(), preview("2")),
        ]);

        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert!(matches!(
            &errors[..],
            [ValidationError::TypeMismatch { expected, actual, .. }]
                if expected == "STRING" && actual == "NUMBER"
        ));
    }

    #[test]
    fn test_cycle_is_rejected_with_path() {
        let p = prompt(vec![
            (
                "1".into(),
                PromptNode::new("Add")
                    .with_link("a", "2", 0)
                    .with_literal("b", 1),
            ),
            (
                "2".into(),
                PromptNode::new("Add")
                    .with_link("a", "1", 0)
                    .with_literal("b", 1),
            ),
            ("3".into(), preview("2")),
        ]);

        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::CyclicDependency {
                cycle: vec!["1".into(), "2".into(), "1".into()]
            }]
        );
    }

    #[test]
    fn test_no_output_nodes() {
        let p = prompt(vec![number("1", 1)]);
        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoOutputs]);
    }

    #[test]
    fn test_partial_targets_must_be_output_nodes() {
        let p = prompt(vec![
            number("1", 1),
            ("2".into(), preview("1")),
            ("3".into(), preview("1")),
        ]);
        let registry = builtin_registry();

        let validated =
            validate_prompt(&registry, p.clone(), Some(&["3".to_string()])).unwrap();
        assert_eq!(validated.targets(), ["3".to_string()]);

        let errors = validate_prompt(&registry, p, Some(&["1".to_string()])).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidTarget {
                node_id: "1".into()
            }]
        );
    }

    #[test]
    fn test_errors_accumulate_across_nodes() {
        let p = prompt(vec![
            ("1".into(), PromptNode::new("Nope")),
            ("2".into(), PromptNode::new("Add").with_literal("a", 1)),
            ("3".into(), preview("missing")),
        ]);

        let errors = validate_prompt(&builtin_registry(), p, None).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_unknown_literal_slot_is_ignored() {
        let p = prompt(vec![
            (
                "1".into(),
                PromptNode::new("Int")
                    .with_literal("value", 1)
                    .with_literal("extra", true),
            ),
            ("2".into(), preview("1")),
        ]);

        assert!(validate_prompt(&builtin_registry(), p, None).is_ok());
    }
}
