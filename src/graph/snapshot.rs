//! Serializable view of a coordination graph for reporting sinks.

use super::CoordinationGraph;
use crate::agent::{AgentBackend, AgentId, AgentNode, Specialization};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const BASE_NODE_SIZE: f64 = 15.0;
const TOT_NODE_SIZE: f64 = 20.0;
const SIZE_PER_PREDECESSOR: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: AgentId,
    pub specialization: Specialization,
    /// Rendering hint; grows with the node's active fan-in.
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub src: AgentId,
    pub dst: AgentId,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Node list, edge list and score trace, as handed to rendering layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub taken_at: DateTime<Utc>,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    /// Designated exits only; empty means sinks are exits.
    #[serde(default)]
    pub exits: Vec<AgentId>,
    pub connectivity: f64,
    /// Best score after each accepted trial, starting with the baseline.
    #[serde(default)]
    pub performance_trace: Vec<f64>,
}

impl GraphSnapshot {
    pub fn with_trace(mut self, trace: Vec<f64>) -> Self {
        self.performance_trace = trace;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl CoordinationGraph {
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .map(|node| {
                let base = if node.specialization() == &Specialization::ToT {
                    TOT_NODE_SIZE
                } else {
                    BASE_NODE_SIZE
                };
                let fan_in = self.predecessors(node.id()).len() as f64;
                NodeSnapshot {
                    id: node.id(),
                    specialization: node.specialization().clone(),
                    size: base + SIZE_PER_PREDECESSOR * fan_in,
                }
            })
            .collect();
        let edges = self
            .edges()
            .into_iter()
            .map(|(src, dst, data)| EdgeSnapshot {
                src,
                dst,
                weight: data.weight,
                color: data.color.clone(),
            })
            .collect();

        GraphSnapshot {
            taken_at: Utc::now(),
            nodes,
            edges,
            exits: self.designated_exits().to_vec(),
            connectivity: self.connectivity(),
            performance_trace: Vec::new(),
        }
    }

    /// Rebuild a graph from a snapshot, attaching every node to `backend`.
    ///
    /// Edges go through the normal checks, so a snapshot describing a cycle
    /// or a dangling endpoint is refused.
    pub fn from_snapshot(snapshot: &GraphSnapshot, backend: Arc<dyn AgentBackend>) -> Result<Self> {
        let mut graph = Self::new();
        for node in &snapshot.nodes {
            graph.add_node(AgentNode::with_id(
                node.id,
                node.specialization.clone(),
                Arc::clone(&backend),
            ));
        }
        for edge in &snapshot.edges {
            graph.add_edge(edge.src, edge.dst, edge.weight)?;
            if edge.color.is_some() {
                graph.set_edge_color(edge.src, edge.dst, edge.color.clone())?;
            }
        }
        graph.set_exit_nodes(&snapshot.exits)?;
        Ok(graph)
    }
}
