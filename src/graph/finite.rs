//! Finite Minimal Content
//!
//! Least fixpoint over the content models: a type gets rank `r` once its required
//! content can be built from built-ins and types ranked below `r`. Types left
//! without a rank have no finite instance.
//!
//! A choice expands to its first alternative buildable below the owning type's
//! rank, so a minimal expansion strictly descends in rank and always ends.

use std::collections::HashMap;

use crate::model::{Compositor, ModelGroup, Particle, SchemaModel, TypeId};

/// Rank of every type with a finite minimal instance
#[derive(Debug, Clone, Default)]
pub struct FiniteRanks {
    ranks: HashMap<TypeId, usize>,
}

impl FiniteRanks {
    pub fn compute(model: &SchemaModel) -> Self {
        let mut ranks: HashMap<TypeId, usize> = HashMap::new();
        let mut round = 0;
        loop {
            round += 1;
            // Everything ranked so far sits below `round`
            let ready: Vec<TypeId> = model
                .all_types()
                .iter()
                .filter(|ty| !ranks.contains_key(&ty.id))
                .filter(|ty| match &ty.content {
                    Some(content) => {
                        content.min_occurs == 0 || group_buildable(content, &ranks, round)
                    }
                    None => true,
                })
                .map(|ty| ty.id)
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                ranks.insert(id, round);
            }
        }
        Self { ranks }
    }

    pub fn is_finite(&self, id: TypeId) -> bool {
        self.ranks.contains_key(&id)
    }

    pub fn rank(&self, id: TypeId) -> Option<usize> {
        self.ranks.get(&id).copied()
    }

    /// Index of the alternative a choice inside the content of `owner` expands to
    ///
    /// Falls back to the first alternative when none is buildable.
    pub fn choice_alternative(&self, group: &ModelGroup, owner: TypeId) -> usize {
        let bound = self.rank(owner).unwrap_or(usize::MAX);
        group
            .particles
            .iter()
            .position(|p| particle_buildable(p, &self.ranks, bound))
            .unwrap_or(0)
    }
}

fn particle_buildable(particle: &Particle, ranks: &HashMap<TypeId, usize>, bound: usize) -> bool {
    if particle.min_occurs() == 0 {
        return true;
    }
    match particle {
        Particle::Element(e) => match e.element.type_ref.declared() {
            Some(id) => ranks.get(&id).is_some_and(|&rank| rank < bound),
            None => true,
        },
        Particle::Group(g) => group_buildable(g, ranks, bound),
    }
}

fn group_buildable(group: &ModelGroup, ranks: &HashMap<TypeId, usize>, bound: usize) -> bool {
    match group.compositor {
        Compositor::Choice => {
            group.particles.is_empty()
                || group
                    .particles
                    .iter()
                    .any(|p| particle_buildable(p, ranks, bound))
        }
        Compositor::Sequence | Compositor::All => group
            .particles
            .iter()
            .all(|p| particle_buildable(p, ranks, bound)),
    }
}
