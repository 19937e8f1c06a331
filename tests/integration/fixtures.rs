//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A backend that records every input it is given
//! - Chain and random graph builders
//! - Predefined task batches

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use swarm::agent::{AgentBackend, AgentId, AgentNode, AgentReply, AgentRequest, Specialization};
use swarm::graph::CoordinationGraph;
use swarm::rubric::TaskSample;
use swarm::Error;

/// Backend that answers `"<node short id>:<tag>"` and remembers inputs.
///
/// Nodes listed in `failing` return an execution error.
#[derive(Default)]
pub struct RecordingBackend {
    inputs: Mutex<HashMap<AgentId, Vec<String>>>,
    failing: Mutex<HashSet<AgentId>>,
    quality: f64,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            quality: 0.8,
            ..Self::default()
        })
    }

    pub fn fail(&self, id: AgentId) {
        self.failing.lock().unwrap().insert(id);
    }

    /// Inputs seen by `id`, in call order.
    pub fn inputs_of(&self, id: AgentId) -> Vec<String> {
        self.inputs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// The output a node produces.
    pub fn output_of(id: AgentId) -> String {
        format!("out-{}", id.short())
    }
}

#[async_trait]
impl AgentBackend for RecordingBackend {
    async fn execute(&self, request: &AgentRequest) -> swarm::Result<AgentReply> {
        self.inputs
            .lock()
            .unwrap()
            .entry(request.node_id)
            .or_default()
            .push(request.input.clone());
        if self.failing.lock().unwrap().contains(&request.node_id) {
            return Err(Error::AgentExecution {
                id: request.node_id,
                message: "injected failure".to_string(),
            });
        }
        Ok(AgentReply::new(Self::output_of(request.node_id), self.quality))
    }
}

/// Linear chain of IO nodes on `backend`.
pub fn chain_graph(backend: Arc<dyn AgentBackend>, weights: &[f64]) -> (CoordinationGraph, Vec<AgentId>) {
    let nodes = (0..=weights.len())
        .map(|_| AgentNode::new(Specialization::Io, Arc::clone(&backend)))
        .collect();
    let graph = CoordinationGraph::chain(nodes, weights).expect("valid chain");
    let ids = graph.node_ids();
    (graph, ids)
}

/// `n` unconnected nodes cycling through the palette.
pub fn isolated_nodes(backend: Arc<dyn AgentBackend>, n: usize) -> (CoordinationGraph, Vec<AgentId>) {
    let mut graph = CoordinationGraph::new();
    let ids = (0..n)
        .map(|i| {
            let spec = Specialization::PALETTE[i % Specialization::PALETTE.len()].clone();
            graph.add_node(AgentNode::new(spec, Arc::clone(&backend)))
        })
        .collect();
    (graph, ids)
}

/// Every active edge `(u, v)` has `u` before `v` in the topological order.
pub fn assert_topological(graph: &CoordinationGraph) {
    let order = graph.topological_ids().expect("graph must stay acyclic");
    assert_eq!(order.len(), graph.node_count());
    let position: HashMap<AgentId, usize> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    for (src, dst, data) in graph.edges() {
        if data.is_active() {
            assert!(
                position[&src] < position[&dst],
                "edge {} -> {} violates topological order",
                src,
                dst
            );
        }
    }
}

pub fn random_weight(rng: &mut StdRng) -> f64 {
    // Some dormant edges on purpose.
    if rng.gen_bool(0.1) {
        0.0
    } else {
        rng.gen_range(0.05..=1.0)
    }
}

pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// One task that is fully met only when every node in `ids` reaches the output.
///
/// Pairs with [`RecordingBackend`]: exposing more exits strictly raises the score.
pub fn every_output_task(ids: &[AgentId]) -> Vec<TaskSample> {
    vec![TaskSample::new("collect every answer")
        .with_criteria(ids.iter().map(|id| RecordingBackend::output_of(*id)))]
}

/// A small batch the mock backend can partially satisfy.
pub fn analysis_tasks() -> Vec<TaskSample> {
    vec![
        TaskSample::new("Analyze the quarterly sales data")
            .with_criteria(["analysis", "logical steps", "branch"]),
        TaskSample::new("Research recent battery chemistry")
            .with_criteria(["researching", "key information"]),
    ]
}
