// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cycle detection over directed graphs.
//!
//! The connectivity engine projects committed edges onto their owning
//! nodes and asks this module whether the projection still forms a DAG.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::hash::Hash;

/// Adjacency lists keyed by node, in insertion order.
pub type Adjacency<N> = IndexMap<N, Vec<N>>;

/// Build adjacency lists from directed `(from, to)` pairs.
///
/// Every endpoint gets an entry so sinks are part of the graph, and
/// repeated pairs collapse into a single arc.
pub fn adjacency<N, I>(pairs: I) -> Adjacency<N>
where
    N: Copy + Eq + Hash,
    I: IntoIterator<Item = (N, N)>,
{
    let mut graph = Adjacency::new();
    for (from, to) in pairs {
        let arcs: &mut Vec<N> = graph.entry(from).or_default();
        if !arcs.contains(&to) {
            arcs.push(to);
        }
        graph.entry(to).or_default();
    }
    graph
}

/// Find every cycle reachable by depth-first search.
///
/// Each cycle is the slice of the active path starting at the node that
/// was re-entered, ending at the node that re-entered it. All components
/// are searched, not only the one holding the most recent arc.
pub fn detect_cycles<N>(graph: &Adjacency<N>) -> Vec<Vec<N>>
where
    N: Copy + Eq + Hash,
{
    let mut search = CycleSearch {
        graph,
        visited: HashSet::new(),
        on_stack: HashSet::new(),
        path: Vec::new(),
        cycles: Vec::new(),
    };

    for node in graph.keys() {
        if !search.visited.contains(node) {
            search.visit(*node);
        }
    }

    search.cycles
}

struct CycleSearch<'a, N> {
    graph: &'a Adjacency<N>,
    visited: HashSet<N>,
    on_stack: HashSet<N>,
    path: Vec<N>,
    cycles: Vec<Vec<N>>,
}

impl<N> CycleSearch<'_, N>
where
    N: Copy + Eq + Hash,
{
    fn visit(&mut self, node: N) {
        self.visited.insert(node);
        self.on_stack.insert(node);
        self.path.push(node);

        let graph = self.graph;
        if let Some(neighbors) = graph.get(&node) {
            for &next in neighbors {
                if !self.visited.contains(&next) {
                    self.visit(next);
                } else if self.on_stack.contains(&next) {
                    if let Some(start) = self.path.iter().position(|n| *n == next) {
                        self.cycles.push(self.path[start..].to_vec());
                    }
                }
            }
        }

        self.on_stack.remove(&node);
        self.path.pop();
    }
}
