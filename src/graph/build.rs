use super::CoordinationGraph;
use crate::agent::{AgentBackend, AgentId, AgentNode, Specialization};
use crate::error::{Error, Result};
use crate::planning::{CollaborationPattern, Team};
use crate::swlog_debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Weight of the edges that make up a pattern's skeleton.
pub const SKELETON_WEIGHT: f64 = 0.8;

/// Builds the initial graph for a team.
///
/// The collaboration pattern contributes a fixed skeleton; on top of that
/// every remaining forward pair `i < j` gets an edge with probability
/// `connection_probability` and a weight drawn from [0.1, 1.0].
pub struct GraphBuilder {
    backend: Arc<dyn AgentBackend>,
    pattern: CollaborationPattern,
    connection_probability: f64,
    seed: Option<u64>,
}

impl GraphBuilder {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            backend,
            pattern: CollaborationPattern::Pipeline,
            connection_probability: 0.0,
            seed: None,
        }
    }

    pub fn pattern(mut self, pattern: CollaborationPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn connection_probability(mut self, probability: f64) -> Self {
        self.connection_probability = probability;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Build using the team's members and pattern.
    pub fn from_team(self, team: &Team) -> Result<CoordinationGraph> {
        self.pattern(team.pattern).build(&team.members)
    }

    pub fn build(&self, members: &[Specialization]) -> Result<CoordinationGraph> {
        if !(0.0..=1.0).contains(&self.connection_probability) {
            return Err(Error::Validation(format!(
                "connection probability {} is outside [0, 1]",
                self.connection_probability
            )));
        }

        let mut graph = CoordinationGraph::new();
        let ids: Vec<AgentId> = members
            .iter()
            .map(|spec| graph.add_node(AgentNode::new(spec.clone(), Arc::clone(&self.backend))))
            .collect();

        for (src, dst) in skeleton(self.pattern, members) {
            graph.add_edge(ids[src], ids[dst], SKELETON_WEIGHT)?;
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut extra = 0;
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                if graph.has_edge(ids[i], ids[j]) {
                    continue;
                }
                if !rng.gen_bool(self.connection_probability) {
                    continue;
                }
                let weight = rng.gen_range(0.1..=1.0);
                match graph.add_edge(ids[i], ids[j], weight) {
                    Ok(()) => extra += 1,
                    Err(Error::Cycle { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        swlog_debug!(
            "Built {} graph: {} nodes, {} edges ({} random)",
            self.pattern,
            graph.node_count(),
            graph.edge_count(),
            extra
        );
        Ok(graph)
    }
}

/// Skeleton edges as index pairs into `members`.
fn skeleton(pattern: CollaborationPattern, members: &[Specialization]) -> Vec<(usize, usize)> {
    let n = members.len();
    match pattern {
        CollaborationPattern::Sequential | CollaborationPattern::Pipeline => {
            (1..n).map(|i| (i - 1, i)).collect()
        }
        CollaborationPattern::HubAndSpoke => {
            let hub = members
                .iter()
                .position(|spec| *spec == Specialization::ToT)
                .unwrap_or(0);
            (0..n).filter(|&i| i != hub).map(|i| (i, hub)).collect()
        }
        CollaborationPattern::FullyConnected => (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect(),
    }
}
