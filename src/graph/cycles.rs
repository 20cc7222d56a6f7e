// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cycle detection over link graphs.
//!
//! Used both when a prompt is admitted and when an expansion is spliced into a
//! running prompt.

use std::collections::{BTreeMap, HashSet};

/// Adjacency from a node to the nodes it links to, in a stable order.
pub type Adjacency<'a> = BTreeMap<&'a str, Vec<&'a str>>;

/// Find one cycle in `graph`, returned as a closed path (`[a, b, a]`).
///
/// Roots are visited in `roots` order so the reported cycle is deterministic.
/// Edges to nodes missing from `graph` are ignored; dangling links are reported
/// separately by validation.
pub fn find_cycle<'a>(
    roots: impl IntoIterator<Item = &'a str>,
    graph: &Adjacency<'a>,
) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for root in roots {
        if !visited.contains(root) {
            if let Some(cycle) =
                dfs_cycle_detection(root, graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(cycle);
            }
        }
    }

    None
}

/// Depth-first search with an explicit recursion stack.
///
/// A neighbor already on the recursion stack closes a back edge; the cycle is
/// the path segment from that neighbor to the current node, closed by the
/// neighbor again.
fn dfs_cycle_detection<'a>(
    node: &'a str,
    graph: &Adjacency<'a>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !graph.contains_key(neighbor) {
                continue;
            }
            if !visited.contains(neighbor) {
                if let Some(cycle) = dfs_cycle_detection(neighbor, graph, visited, rec_stack, path)
                {
                    return Some(cycle);
                }
            } else if rec_stack.contains(neighbor) {
                let cycle_start = path.iter().position(|&x| x == neighbor).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[cycle_start..].iter().map(|id| id.to_string()).collect();
                cycle.push(neighbor.to_string());
                return Some(cycle);
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}
