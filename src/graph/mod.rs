//! Coordination graph over agent nodes.
//!
//! The graph owns node *membership* (as `Arc<AgentNode>`) and the weighted
//! edges between members. Edges with weight zero are dormant: they stay in
//! the graph for reporting but carry no information and are ignored by the
//! acyclicity invariant and by execution ordering.

mod build;
mod snapshot;
mod topo;

pub use build::GraphBuilder;
pub use snapshot::{EdgeSnapshot, GraphSnapshot, NodeSnapshot};
pub use topo::TopoOrder;

use crate::agent::{AgentId, AgentNode};
use crate::error::{Error, Result};
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeFiltered, EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Weight and observability metadata carried by an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Information-flow strength in [0, 1].
    pub weight: f64,
    /// Display hint for rendering layers; never read by the engine.
    pub color: Option<String>,
}

impl EdgeData {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            color: None,
        }
    }

    /// Whether this edge carries information.
    pub fn is_active(&self) -> bool {
        self.weight > 0.0
    }
}

fn check_weight(weight: f64) -> Result<()> {
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(Error::InvalidWeight { weight })
    }
}

/// Directed graph of agents with weighted information-flow edges.
///
/// Invariants, upheld by every mutation:
/// - the active (non-zero-weight) edges form a DAG;
/// - every edge endpoint is a member node.
///
/// Mutations are atomic: on error the graph is unchanged.
#[derive(Clone)]
pub struct CoordinationGraph {
    graph: StableDiGraph<Arc<AgentNode>, EdgeData>,
    node_index: HashMap<AgentId, NodeIndex>,
    /// Designated exits, in designation order. Empty means "use the sinks".
    exits: Vec<AgentId>,
}

impl CoordinationGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            node_index: HashMap::new(),
            exits: Vec::new(),
        }
    }

    /// Build a linear chain `n0 -> n1 -> ...` with the given edge weights.
    pub fn chain(nodes: Vec<AgentNode>, weights: &[f64]) -> Result<Self> {
        if nodes.len() != weights.len() + 1 {
            return Err(Error::Validation(format!(
                "a chain of {} nodes needs {} weights, got {}",
                nodes.len(),
                nodes.len().saturating_sub(1),
                weights.len()
            )));
        }
        let mut graph = Self::new();
        let ids: Vec<AgentId> = nodes.into_iter().map(|n| graph.add_node(n)).collect();
        for (pair, &weight) in ids.windows(2).zip(weights) {
            graph.add_edge(pair[0], pair[1], weight)?;
        }
        Ok(graph)
    }

    // ========== Nodes ==========

    /// Add a node; an already-present id is left as is.
    pub fn add_node(&mut self, node: AgentNode) -> AgentId {
        self.add_shared(Arc::new(node))
    }

    /// Add a node shared with another graph.
    pub fn add_shared(&mut self, node: Arc<AgentNode>) -> AgentId {
        let id = node.id();
        if !self.node_index.contains_key(&id) {
            let index = self.graph.add_node(node);
            self.node_index.insert(id, index);
        }
        id
    }

    /// Remove a node.
    ///
    /// With `prune == false` a node that still has edges is refused with
    /// `NodeInUse`; with `prune == true` its edges go with it.
    pub fn remove_node(&mut self, id: AgentId, prune: bool) -> Result<Arc<AgentNode>> {
        let index = self.index_of(id)?;
        let edges = self.graph.edges_directed(index, Direction::Incoming).count()
            + self.graph.edges_directed(index, Direction::Outgoing).count();
        if edges > 0 && !prune {
            return Err(Error::NodeInUse { id, edges });
        }

        // StableGraph drops incident edges together with the node.
        let node = self
            .graph
            .remove_node(index)
            .ok_or(Error::UnknownNode { id })?;
        self.node_index.remove(&id);
        self.exits.retain(|exit| *exit != id);
        Ok(node)
    }

    /// Swap a node for a new one, keeping every incident edge and exit mark.
    pub fn replace_node(&mut self, old: AgentId, new: AgentNode) -> Result<AgentId> {
        let index = self.index_of(old)?;
        let new_id = new.id();
        if new_id != old && self.node_index.contains_key(&new_id) {
            return Err(Error::Validation(format!(
                "node {} is already in the graph",
                new_id
            )));
        }
        self.graph[index] = Arc::new(new);
        self.node_index.remove(&old);
        self.node_index.insert(new_id, index);
        for exit in self.exits.iter_mut() {
            if *exit == old {
                *exit = new_id;
            }
        }
        Ok(new_id)
    }

    pub fn node(&self, id: AgentId) -> Option<&Arc<AgentNode>> {
        self.node_index
            .get(&id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    pub fn contains_node(&self, id: AgentId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> Vec<AgentId> {
        self.graph
            .node_indices()
            .map(|index| self.graph[index].id())
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<AgentNode>> + '_ {
        self.graph.node_indices().map(move |index| &self.graph[index])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn index_of(&self, id: AgentId) -> Result<NodeIndex> {
        self.node_index
            .get(&id)
            .copied()
            .ok_or(Error::UnknownNode { id })
    }

    // ========== Edges ==========

    /// Add an edge, or update the weight of an existing one.
    ///
    /// # Errors
    /// - `UnknownNode` if either endpoint is absent
    /// - `InvalidWeight` if the weight is outside [0, 1]
    /// - `Cycle` if an active edge would close a cycle (self-loops included)
    pub fn add_edge(&mut self, src: AgentId, dst: AgentId, weight: f64) -> Result<()> {
        let src_index = self.index_of(src)?;
        let dst_index = self.index_of(dst)?;
        check_weight(weight)?;

        // Self-loops are refused even when dormant.
        if src == dst || (weight > 0.0 && self.would_create_cycle(src, dst)) {
            return Err(Error::Cycle { src, dst });
        }

        match self.graph.find_edge(src_index, dst_index) {
            Some(edge) => self.graph[edge].weight = weight,
            None => {
                self.graph
                    .add_edge(src_index, dst_index, EdgeData::new(weight));
            }
        }
        Ok(())
    }

    /// Remove an edge, returning its weight.
    pub fn remove_edge(&mut self, src: AgentId, dst: AgentId) -> Result<f64> {
        let edge = self.edge_index(src, dst)?;
        self.graph
            .remove_edge(edge)
            .map(|data| data.weight)
            .ok_or(Error::UnknownEdge { src, dst })
    }

    /// Change the weight of an existing edge.
    ///
    /// Reactivating a dormant edge is subject to the cycle check.
    pub fn set_edge_weight(&mut self, src: AgentId, dst: AgentId, weight: f64) -> Result<()> {
        let edge = self.edge_index(src, dst)?;
        check_weight(weight)?;
        if weight > 0.0 && !self.graph[edge].is_active() && self.would_create_cycle(src, dst) {
            return Err(Error::Cycle { src, dst });
        }
        self.graph[edge].weight = weight;
        Ok(())
    }

    pub fn set_edge_color(&mut self, src: AgentId, dst: AgentId, color: Option<String>) -> Result<()> {
        let edge = self.edge_index(src, dst)?;
        self.graph[edge].color = color;
        Ok(())
    }

    fn edge_index(&self, src: AgentId, dst: AgentId) -> Result<petgraph::stable_graph::EdgeIndex> {
        let src_index = self.index_of(src)?;
        let dst_index = self.index_of(dst)?;
        self.graph
            .find_edge(src_index, dst_index)
            .ok_or(Error::UnknownEdge { src, dst })
    }

    pub fn edge(&self, src: AgentId, dst: AgentId) -> Option<&EdgeData> {
        let edge = self.edge_index(src, dst).ok()?;
        self.graph.edge_weight(edge)
    }

    pub fn edge_weight(&self, src: AgentId, dst: AgentId) -> Option<f64> {
        self.edge(src, dst).map(|data| data.weight)
    }

    pub fn has_edge(&self, src: AgentId, dst: AgentId) -> bool {
        self.edge(src, dst).is_some()
    }

    /// All edges, dormant ones included, as `(src, dst, data)`.
    pub fn edges(&self) -> Vec<(AgentId, AgentId, &EdgeData)> {
        self.graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].id(),
                    self.graph[edge.target()].id(),
                    edge.weight(),
                )
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn active_edge_count(&self) -> usize {
        self.graph
            .edge_references()
            .filter(|edge| edge.weight().is_active())
            .count()
    }

    /// Whether an active edge `src -> dst` would close a cycle.
    ///
    /// Unknown endpoints report `false`; `add_edge` rejects them separately.
    pub fn would_create_cycle(&self, src: AgentId, dst: AgentId) -> bool {
        if src == dst {
            return true;
        }
        let (Some(&src_index), Some(&dst_index)) =
            (self.node_index.get(&src), self.node_index.get(&dst))
        else {
            return false;
        };
        let active = EdgeFiltered::from_fn(&self.graph, |edge| edge.weight().is_active());
        has_path_connecting(&active, dst_index, src_index, None)
    }

    // ========== Neighborhoods ==========

    /// Active predecessors of a node with the weight of the connecting edge.
    pub fn predecessors(&self, id: AgentId) -> Vec<(AgentId, f64)> {
        self.active_neighbors(id, Direction::Incoming)
    }

    /// Active successors of a node with the weight of the connecting edge.
    pub fn successors(&self, id: AgentId) -> Vec<(AgentId, f64)> {
        self.active_neighbors(id, Direction::Outgoing)
    }

    fn active_neighbors(&self, id: AgentId, direction: Direction) -> Vec<(AgentId, f64)> {
        let Some(&index) = self.node_index.get(&id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<(AgentId, f64)> = self
            .graph
            .edges_directed(index, direction)
            .filter(|edge| edge.weight().is_active())
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (self.graph[other].id(), edge.weight().weight)
            })
            .collect();
        neighbors.sort_by_key(|(other, _)| self.node_index[other]);
        neighbors
    }

    /// Number of active edges touching a node, in either direction.
    pub fn active_degree(&self, id: AgentId) -> usize {
        self.predecessors(id).len() + self.successors(id).len()
    }

    /// Nodes without active predecessors; they receive the raw task input.
    pub fn entry_nodes(&self) -> Vec<AgentId> {
        self.node_ids()
            .into_iter()
            .filter(|&id| self.predecessors(id).is_empty())
            .collect()
    }

    /// Designated exit nodes, or the active sinks when none are designated.
    pub fn exit_nodes(&self) -> Vec<AgentId> {
        if !self.exits.is_empty() {
            return self.exits.clone();
        }
        self.node_ids()
            .into_iter()
            .filter(|&id| self.successors(id).is_empty())
            .collect()
    }

    /// Designated exits only (possibly empty).
    pub fn designated_exits(&self) -> &[AgentId] {
        &self.exits
    }

    /// Designate the exit nodes. An empty list reverts to sink detection.
    pub fn set_exit_nodes(&mut self, ids: &[AgentId]) -> Result<()> {
        for &id in ids {
            self.index_of(id)?;
        }
        let mut seen = HashSet::new();
        self.exits = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        Ok(())
    }

    /// Ordered pairs that could take a new active edge without breaking the DAG.
    pub fn addable_pairs(&self) -> Vec<(AgentId, AgentId)> {
        let ids = self.node_ids();
        let mut pairs = Vec::new();
        for &src in &ids {
            for &dst in &ids {
                if src != dst && !self.has_edge(src, dst) && !self.would_create_cycle(src, dst) {
                    pairs.push((src, dst));
                }
            }
        }
        pairs
    }

    // ========== Ordering ==========

    /// Lazy topological order over active edges.
    ///
    /// Each call starts a fresh traversal. If the invariant were ever broken
    /// the iterator ends with a single `Err(CycleDetected)`.
    pub fn topological_order(&self) -> TopoOrder<'_> {
        TopoOrder::new(self)
    }

    /// Collect [`Self::topological_order`].
    pub fn topological_ids(&self) -> Result<Vec<AgentId>> {
        self.topological_order().collect()
    }

    /// Execution waves: every node's active predecessors sit in earlier layers.
    pub fn layers(&self) -> Result<Vec<Vec<AgentId>>> {
        let mut in_degree: HashMap<AgentId, usize> = self
            .node_ids()
            .into_iter()
            .map(|id| (id, self.predecessors(id).len()))
            .collect();
        let mut current: Vec<AgentId> = self
            .node_ids()
            .into_iter()
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut layers = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            let mut next = Vec::new();
            for &id in &current {
                for (succ, _) in self.successors(id) {
                    if let Some(degree) = in_degree.get_mut(&succ) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(succ);
                        }
                    }
                }
            }
            placed += current.len();
            layers.push(current);
            next.sort_by_key(|id| self.node_index[id]);
            current = next;
        }

        if placed < self.node_count() {
            let stuck = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(&id, _)| id)
                .min_by_key(|id| self.node_index[id]);
            if let Some(id) = stuck {
                return Err(Error::CycleDetected { id });
            }
        }
        Ok(layers)
    }

    /// Present edges over the maximum an acyclic graph of this size can hold,
    /// n(n-1)/2. Reporting only.
    pub fn connectivity(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        let max_edges = (n * (n - 1) / 2) as f64;
        (self.edge_count() as f64 / max_edges).min(1.0)
    }

    /// Insert an edge with no checks. Tests use this to exercise cycle detection.
    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, src: AgentId, dst: AgentId, weight: f64) {
        let (s, d) = (self.node_index[&src], self.node_index[&dst]);
        self.graph.add_edge(s, d, EdgeData::new(weight));
    }

    pub(crate) fn raw(&self) -> &StableDiGraph<Arc<AgentNode>, EdgeData> {
        &self.graph
    }
}

impl Default for CoordinationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CoordinationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("active_edges", &self.active_edge_count())
            .finish()
    }
}
