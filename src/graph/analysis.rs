//! Type Graph Analysis
//!
//! Computes strongly connected components (SCCs) to find recursive types, and
//! finds cycles made only of required edges, which no finite instance can satisfy.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use std::collections::HashSet;

use super::{TypeEdge, TypeGraph};
use crate::model::TypeId;

/// Types that can reach themselves through their own content
pub fn recursive_types(graph: &TypeGraph) -> Vec<TypeId> {
    let mut out: Vec<TypeId> = cyclic_components(&graph.graph)
        .into_iter()
        .flatten()
        .filter_map(|idx| graph.graph.node_weight(idx).copied())
        .collect();
    out.sort();
    out
}

/// A cycle of required edges reachable from `start`, if one exists
///
/// Returns the members of the offending component, sorted.
pub fn required_cycle(graph: &TypeGraph, start: TypeId) -> Option<Vec<TypeId>> {
    let &start_idx = graph.node_indices.get(&start)?;

    // Node indices survive filter_map because every node is kept
    let required: DiGraph<TypeId, TypeEdge> = graph.graph.filter_map(
        |_, node| Some(*node),
        |_, edge| edge.required.then(|| edge.clone()),
    );

    let mut reachable = HashSet::new();
    let mut dfs = Dfs::new(&required, start_idx);
    while let Some(idx) = dfs.next(&required) {
        reachable.insert(idx);
    }

    cyclic_components(&required)
        .into_iter()
        .find(|scc| scc.iter().any(|idx| reachable.contains(idx)))
        .map(|scc| {
            let mut members: Vec<TypeId> = scc
                .into_iter()
                .filter_map(|idx| required.node_weight(idx).copied())
                .collect();
            members.sort();
            members
        })
}

/// SCCs with more than one member, plus single nodes with a self-loop
fn cyclic_components(graph: &DiGraph<TypeId, TypeEdge>) -> Vec<Vec<NodeIndex>> {
    kosaraju_scc(graph)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1
                || graph
                    .edges_directed(scc[0], Direction::Outgoing)
                    .any(|e| e.target() == scc[0])
        })
        .collect()
}
