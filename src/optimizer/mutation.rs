//! Graph mutations and the sampler that proposes them.

use crate::agent::{AgentId, Specialization};
use crate::error::{Error, Result};
use crate::graph::CoordinationGraph;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Largest reweight step in either direction.
pub const MAX_REWEIGHT_DELTA: f64 = 0.3;

/// Weight range for newly added edges.
const NEW_EDGE_WEIGHT: std::ops::RangeInclusive<f64> = 0.1..=1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationFamily {
    Edge,
    Node,
}

/// One local change to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    AddEdge {
        src: AgentId,
        dst: AgentId,
        weight: f64,
    },
    RemoveEdge {
        src: AgentId,
        dst: AgentId,
    },
    ReweightEdge {
        src: AgentId,
        dst: AgentId,
        from: f64,
        to: f64,
    },
    /// Replace `node` with a fresh node `replacement` of another specialization.
    SwapSpecialization {
        node: AgentId,
        replacement: AgentId,
        from: Specialization,
        to: Specialization,
    },
}

impl Mutation {
    pub fn family(&self) -> MutationFamily {
        match self {
            Mutation::SwapSpecialization { .. } => MutationFamily::Node,
            _ => MutationFamily::Edge,
        }
    }

    /// Apply to `graph`. Structural errors leave the graph unchanged.
    pub fn apply(&self, graph: &mut CoordinationGraph) -> Result<()> {
        match self {
            Mutation::AddEdge { src, dst, weight } => graph.add_edge(*src, *dst, *weight),
            Mutation::RemoveEdge { src, dst } => graph.remove_edge(*src, *dst).map(|_| ()),
            Mutation::ReweightEdge { src, dst, to, .. } => graph.set_edge_weight(*src, *dst, *to),
            Mutation::SwapSpecialization {
                node,
                replacement,
                to,
                ..
            } => {
                let fresh = graph
                    .node(*node)
                    .ok_or(Error::UnknownNode { id: *node })?
                    .respecialized(*replacement, to.clone());
                graph.replace_node(*node, fresh).map(|_| ())
            }
        }
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mutation::AddEdge { src, dst, weight } => {
                write!(f, "add {} -> {} ({:.2})", src.short(), dst.short(), weight)
            }
            Mutation::RemoveEdge { src, dst } => {
                write!(f, "remove {} -> {}", src.short(), dst.short())
            }
            Mutation::ReweightEdge { src, dst, from, to } => write!(
                f,
                "reweight {} -> {} ({:.2} -> {:.2})",
                src.short(),
                dst.short(),
                from,
                to
            ),
            Mutation::SwapSpecialization {
                node,
                replacement,
                from,
                to,
            } => write!(
                f,
                "swap {} {} -> {} {}",
                node.short(),
                from,
                replacement.short(),
                to
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeMove {
    Add,
    Remove,
    Reweight,
}

/// Proposes mutations, favouring sparsely connected nodes.
///
/// A focal node is drawn with weight `1 / (1 + active degree)`; the mutation
/// is then built around it.
pub struct MutationSampler {
    rng: StdRng,
}

impl MutationSampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Uniform choice among the enabled families.
    pub fn choose_family(&mut self, families: &[MutationFamily]) -> Option<MutationFamily> {
        families.choose(&mut self.rng).copied()
    }

    /// Propose a mutation of `family`, or `None` when the graph offers none.
    pub fn propose(
        &mut self,
        graph: &CoordinationGraph,
        family: MutationFamily,
    ) -> Option<Mutation> {
        let focal = self.focal_node(graph)?;
        match family {
            MutationFamily::Edge => self.propose_edge(graph, focal),
            MutationFamily::Node => self.propose_swap(graph, focal),
        }
    }

    fn focal_node(&mut self, graph: &CoordinationGraph) -> Option<AgentId> {
        let ids = graph.node_ids();
        let weights: Vec<f64> = ids
            .iter()
            .map(|&id| 1.0 / (1.0 + graph.active_degree(id) as f64))
            .collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        Some(ids[dist.sample(&mut self.rng)])
    }

    fn propose_edge(&mut self, graph: &CoordinationGraph, focal: AgentId) -> Option<Mutation> {
        let addable: Vec<(AgentId, AgentId)> = graph
            .addable_pairs()
            .into_iter()
            .filter(|(src, dst)| *src == focal || *dst == focal)
            .collect();
        let incident: Vec<(AgentId, AgentId, f64)> = graph
            .edges()
            .into_iter()
            .filter(|(src, dst, _)| *src == focal || *dst == focal)
            .map(|(src, dst, data)| (src, dst, data.weight))
            .collect();

        let mut moves = Vec::with_capacity(3);
        if !addable.is_empty() {
            moves.push(EdgeMove::Add);
        }
        if !incident.is_empty() {
            moves.push(EdgeMove::Remove);
            moves.push(EdgeMove::Reweight);
        }

        match moves.choose(&mut self.rng)? {
            EdgeMove::Add => {
                let (src, dst) = *addable.choose(&mut self.rng)?;
                let weight = self.rng.gen_range(NEW_EDGE_WEIGHT);
                Some(Mutation::AddEdge { src, dst, weight })
            }
            EdgeMove::Remove => {
                let (src, dst, _) = *incident.choose(&mut self.rng)?;
                Some(Mutation::RemoveEdge { src, dst })
            }
            EdgeMove::Reweight => {
                let (src, dst, from) = *incident.choose(&mut self.rng)?;
                let delta = self.rng.gen_range(-MAX_REWEIGHT_DELTA..=MAX_REWEIGHT_DELTA);
                let to = (from + delta).clamp(0.0, 1.0);
                Some(Mutation::ReweightEdge { src, dst, from, to })
            }
        }
    }

    fn propose_swap(&mut self, graph: &CoordinationGraph, focal: AgentId) -> Option<Mutation> {
        let from = graph.node(focal)?.specialization().clone();
        let choices: Vec<&Specialization> = Specialization::PALETTE
            .iter()
            .filter(|spec| **spec != from)
            .collect();
        let to = (*choices.choose(&mut self.rng)?).clone();
        Some(Mutation::SwapSpecialization {
            node: focal,
            replacement: AgentId::new(),
            from,
            to,
        })
    }
}
