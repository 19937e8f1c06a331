use super::CoordinationGraph;
use crate::agent::AgentId;
use crate::error::{Error, Result};
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Lazy Kahn traversal over the active edges of a [`CoordinationGraph`].
///
/// Work per step is proportional to the emitted node's out-degree. Cloning
/// the iterator restarts nothing; it forks the traversal at its current
/// position. Call [`CoordinationGraph::topological_order`] again to restart.
#[derive(Clone)]
pub struct TopoOrder<'a> {
    graph: &'a CoordinationGraph,
    in_degree: HashMap<NodeIndex, usize>,
    ready: VecDeque<NodeIndex>,
    emitted: usize,
    finished: bool,
}

impl<'a> TopoOrder<'a> {
    pub(super) fn new(graph: &'a CoordinationGraph) -> Self {
        let raw = graph.raw();
        let in_degree: HashMap<NodeIndex, usize> = raw
            .node_indices()
            .map(|index| {
                let degree = raw
                    .edges_directed(index, Direction::Incoming)
                    .filter(|edge| edge.weight().is_active())
                    .count();
                (index, degree)
            })
            .collect();
        let ready = raw
            .node_indices()
            .filter(|index| in_degree[index] == 0)
            .collect();
        Self {
            graph,
            in_degree,
            ready,
            emitted: 0,
            finished: false,
        }
    }
}

impl Iterator for TopoOrder<'_> {
    type Item = Result<AgentId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let raw = self.graph.raw();

        if let Some(index) = self.ready.pop_front() {
            for edge in raw.edges_directed(index, Direction::Outgoing) {
                if !edge.weight().is_active() {
                    continue;
                }
                if let Some(degree) = self.in_degree.get_mut(&edge.target()) {
                    *degree -= 1;
                    if *degree == 0 {
                        self.ready.push_back(edge.target());
                    }
                }
            }
            self.emitted += 1;
            return Some(Ok(raw[index].id()));
        }

        self.finished = true;
        if self.emitted < raw.node_count() {
            let stuck = raw
                .node_indices()
                .find(|index| self.in_degree[index] > 0)
                .map(|index| raw[index].id());
            if let Some(id) = stuck {
                return Some(Err(Error::CycleDetected { id }));
            }
        }
        None
    }
}
