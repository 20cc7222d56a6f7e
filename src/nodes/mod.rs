// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in node types.
//!
//! | Type | Inputs | Outputs | Notes |
//! |------|--------|---------|-------|
//! | `Int`, `Float` | `value` | `NUMBER` | constants |
//! | `String` | `value` | `STRING` | constant |
//! | `Add`, `Multiply` | `a`, `b` | `NUMBER` | integer math while both operands are integers |
//! | `Concat` | `a`, `b`, `separator?` | `STRING` | |
//! | `Template` | `template`, `value` | `STRING` | substitutes `{value}` |
//! | `Switch` | `condition`, lazy `on_true`, lazy `on_false` | `*` | runs one branch |
//! | `Repeat` | `value`, `count`, `separator?` | `STRING` | expands into a `Concat` chain |
//! | `Delay` | `value`, `millis?` | `*` | suspends, reports progress, honours cancellation |
//! | `Fail` | `value?`, `message?` | `*` | always fails, never cached |
//! | `Preview` | `value` | - | output node |

mod control;
mod delay;
mod fail;
mod math;
mod preview;
mod primitives;
mod repeat;
mod text;

pub use control::SwitchNode;
pub use delay::DelayNode;
pub use fail::FailNode;
pub use math::{AddNode, MultiplyNode};
pub use preview::PreviewNode;
pub use primitives::{FloatNode, IntNode, StringNode, BOOLEAN, NUMBER, STRING};
pub use repeat::RepeatNode;
pub use text::{ConcatNode, TemplateNode};

use crate::config::NodeRegistry;
use std::sync::Arc;

/// Registry holding every built-in node type.
pub fn builtin_registry() -> NodeRegistry {
    NodeRegistry::new()
        .with(Arc::new(IntNode))
        .with(Arc::new(FloatNode))
        .with(Arc::new(StringNode))
        .with(Arc::new(AddNode))
        .with(Arc::new(MultiplyNode))
        .with(Arc::new(ConcatNode))
        .with(Arc::new(TemplateNode))
        .with(Arc::new(SwitchNode))
        .with(Arc::new(RepeatNode))
        .with(Arc::new(DelayNode))
        .with(Arc::new(FailNode))
        .with(Arc::new(PreviewNode))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lists_every_type() {
        assert_eq!(
            builtin_registry().class_types(),
            vec![
                "Add", "Concat", "Delay", "Fail", "Float", "Int", "Multiply", "Preview", "Repeat",
                "String", "Switch", "Template"
            ]
        );
    }

    #[test]
    fn test_only_preview_is_an_output_node() {
        let registry = builtin_registry();
        let outputs: Vec<&str> = registry
            .class_types()
            .into_iter()
            .filter(|t| registry.get(t).is_some_and(|c| c.is_output_node()))
            .collect();
        assert_eq!(outputs, vec!["Preview"]);
    }
}
