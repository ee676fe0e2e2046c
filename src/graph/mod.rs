//! Type Dependency Graph
//!
//! petgraph view of the schema's type graph: one node per declared type (named or
//! anonymous), one edge per child element whose type is declared. Handles cycles
//! correctly (SCCs), which is what recursive schemas need.
//!
//! Shared between:
//! - the descriptor renderer (reports recursive types)
//! - the instance generator (rejects schemas whose required content never ends and
//!   expands each choice through the alternative `FiniteRanks` picks)

pub mod analysis;
pub mod finite;

pub use analysis::{recursive_types, required_cycle};
pub use finite::FiniteRanks;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{Compositor, ModelGroup, Particle, SchemaModel, TypeId};

/// Edge payload: the child element that creates the dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEdge {
    pub element: String,
    /// True when a minimal instance must contain this child
    pub required: bool,
}

/// The type dependency graph
pub struct TypeGraph {
    pub(crate) graph: DiGraph<TypeId, TypeEdge>,
    pub(crate) node_indices: HashMap<TypeId, NodeIndex>,
    finite: FiniteRanks,
}

impl TypeGraph {
    /// Build the graph for every type in the model
    pub fn build(model: &SchemaModel) -> Self {
        let types = model.all_types();
        let mut graph = DiGraph::with_capacity(types.len(), types.len() * 2);
        let mut node_indices = HashMap::with_capacity(types.len());
        let finite = FiniteRanks::compute(model);

        for ty in types {
            node_indices.insert(ty.id, graph.add_node(ty.id));
        }

        for ty in types {
            let Some(content) = &ty.content else {
                continue;
            };
            let from = node_indices[&ty.id];
            let mut edges = Vec::new();
            let walk = EdgeWalk {
                owner: ty.id,
                finite: &finite,
            };
            walk.collect(content, content.min_occurs > 0, &mut edges);
            for (target, edge) in edges {
                if let Some(&to) = node_indices.get(&target) {
                    graph.add_edge(from, to, edge);
                }
            }
        }

        Self {
            graph,
            node_indices,
            finite,
        }
    }

    /// Finite-instance ranks the required edges were derived from
    pub fn finite(&self) -> &FiniteRanks {
        &self.finite
    }

    pub fn type_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Walks one type's content model, marking edges required the way the instance
/// generator expands it: every particle of a sequence/all, the chosen alternative
/// of a choice.
struct EdgeWalk<'a> {
    owner: TypeId,
    finite: &'a FiniteRanks,
}

impl EdgeWalk<'_> {
    fn collect(&self, group: &ModelGroup, required: bool, out: &mut Vec<(TypeId, TypeEdge)>) {
        let chosen = match group.compositor {
            Compositor::Choice => Some(self.finite.choice_alternative(group, self.owner)),
            Compositor::Sequence | Compositor::All => None,
        };
        for (position, particle) in group.particles.iter().enumerate() {
            let taken = chosen.map_or(true, |c| c == position);
            let particle_required = required && taken && particle.min_occurs() > 0;
            match particle {
                Particle::Element(e) => {
                    if let Some(target) = e.element.type_ref.declared() {
                        out.push((
                            target,
                            TypeEdge {
                                element: e.element.name.clone(),
                                required: particle_required,
                            },
                        ));
                    }
                }
                Particle::Group(g) => self.collect(g, particle_required, out),
            }
        }
    }
}
