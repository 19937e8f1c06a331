//! Graph executor.
//!
//! Runs every node of a [`CoordinationGraph`] once, layer by layer, routing
//! each node's output along its active out-edges, and scores the merged exit
//! output with an [`EvaluationRubric`].
//!
//! Failures stay local: a node whose backend errors or times out is bypassed,
//! and whatever it received is handed on to its successors with the weights
//! scaled by the connecting edge.

use crate::agent::{AgentId, Specialization};
use crate::error::{Error, Result};
use crate::graph::CoordinationGraph;
use crate::rubric::{EvaluationRubric, TaskSample};
use crate::{swlog_trace, swlog_warn};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default per-node timeout.
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(120);

/// Separator between merged contributions.
const MERGE_SEPARATOR: &str = "\n\n";

/// Text travelling along an edge, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// The node whose output this is.
    pub source: AgentId,
    pub weight: f64,
    pub text: String,
}

impl Contribution {
    pub fn new(source: AgentId, weight: f64, text: impl Into<String>) -> Self {
        Self {
            source,
            weight,
            text: text.into(),
        }
    }
}

/// Merge contributions: heaviest first, ties broken by source id.
///
/// A source that arrives along several paths (directly and through a
/// bypassed node) is merged once, at its heaviest weight.
pub fn merge_contributions(contributions: &[Contribution]) -> String {
    let mut strongest: HashMap<AgentId, &Contribution> = HashMap::new();
    for c in contributions {
        let entry = strongest.entry(c.source).or_insert(c);
        if c.weight > entry.weight {
            *entry = c;
        }
    }
    let mut ordered: Vec<&Contribution> = strongest.into_values().collect();
    ordered.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.source.cmp(&b.source))
    });
    ordered
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(MERGE_SEPARATOR)
}

/// How a single node's call ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    Completed { quality: f64 },
    Failed { message: String },
    TimedOut,
}

impl NodeStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, NodeStatus::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: AgentId,
    pub specialization: Specialization,
    /// Exactly what the node was given.
    pub input: String,
    pub status: NodeStatus,
    pub elapsed_ms: u64,
}

/// Result of one graph run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub output: String,
    pub score: f64,
    /// One report per node, in execution order.
    pub node_reports: Vec<NodeReport>,
}

impl RunOutcome {
    pub fn report(&self, id: AgentId) -> Option<&NodeReport> {
        self.node_reports.iter().find(|r| r.id == id)
    }

    pub fn failed_nodes(&self) -> Vec<AgentId> {
        self.node_reports
            .iter()
            .filter(|r| !r.status.is_completed())
            .map(|r| r.id)
            .collect()
    }
}

/// Executes coordination graphs against tasks.
#[derive(Clone)]
pub struct GraphExecutor {
    rubric: Arc<dyn EvaluationRubric>,
    node_timeout: Duration,
}

impl GraphExecutor {
    pub fn new(rubric: Arc<dyn EvaluationRubric>) -> Self {
        Self {
            rubric,
            node_timeout: DEFAULT_NODE_TIMEOUT,
        }
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    /// Run every node once and score the merged output.
    ///
    /// # Errors
    /// - `EmptyGraph` if the graph has no nodes
    /// - `Evaluation` if the rubric fails or scores outside [0, 1]
    ///
    /// Node failures and timeouts are never returned; see [`NodeStatus`].
    pub async fn run(&self, graph: &CoordinationGraph, task: &TaskSample) -> Result<RunOutcome> {
        if graph.is_empty() {
            return Err(Error::EmptyGraph);
        }

        let mut inbox: HashMap<AgentId, Vec<Contribution>> = HashMap::new();
        let mut completed: HashMap<AgentId, (String, f64)> = HashMap::new();
        let mut bypassed: HashMap<AgentId, Vec<Contribution>> = HashMap::new();
        let mut node_reports = Vec::with_capacity(graph.node_count());

        for layer in graph.layers()? {
            let calls: Vec<_> = layer
                .iter()
                .filter_map(|&id| {
                    let node = Arc::clone(graph.node(id)?);
                    let received = inbox.remove(&id).unwrap_or_default();
                    let input = if received.is_empty() {
                        task.input.clone()
                    } else {
                        merge_contributions(&received)
                    };
                    let timeout = self.node_timeout;
                    Some(async move {
                        let started = Instant::now();
                        let result = tokio::time::timeout(timeout, node.execute(&input)).await;
                        (node, input, received, result, started.elapsed())
                    })
                })
                .collect();

            for (node, input, received, result, elapsed) in join_all(calls).await {
                let id = node.id();
                let status = match result {
                    Ok(Ok(reply)) => {
                        swlog_trace!(
                            "Node {} ({}) completed in {:?}, quality {:.2}",
                            id.short(),
                            node.specialization(),
                            elapsed,
                            reply.quality
                        );
                        for (succ, weight) in graph.successors(id) {
                            inbox
                                .entry(succ)
                                .or_default()
                                .push(Contribution::new(id, weight, reply.output.clone()));
                        }
                        let status = NodeStatus::Completed {
                            quality: reply.quality,
                        };
                        completed.insert(id, (reply.output, reply.quality));
                        status
                    }
                    Ok(Err(e)) => {
                        swlog_warn!("Node {} failed, bypassing: {}", id.short(), e);
                        self.forward(graph, id, &received, &mut inbox);
                        bypassed.insert(id, received);
                        NodeStatus::Failed {
                            message: e.to_string(),
                        }
                    }
                    Err(_) => {
                        swlog_warn!(
                            "Node {} timed out after {:?}, bypassing",
                            id.short(),
                            self.node_timeout
                        );
                        self.forward(graph, id, &received, &mut inbox);
                        bypassed.insert(id, received);
                        NodeStatus::TimedOut
                    }
                };
                node_reports.push(NodeReport {
                    id,
                    specialization: node.specialization().clone(),
                    input,
                    status,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }

        let exits = graph.exit_nodes();
        let finals: Vec<Contribution> = exits
            .iter()
            .filter_map(|id| {
                completed
                    .get(id)
                    .map(|(output, quality)| Contribution::new(*id, *quality, output.clone()))
            })
            .collect();
        let output = if finals.is_empty() {
            let received: Vec<Contribution> = exits
                .iter()
                .filter_map(|id| bypassed.get(id))
                .flatten()
                .cloned()
                .collect();
            merge_contributions(&received)
        } else {
            merge_contributions(&finals)
        };

        let score = self.score(&output, task)?;
        Ok(RunOutcome {
            output,
            score,
            node_reports,
        })
    }

    /// Run a batch of tasks concurrently and return the mean score.
    pub async fn run_batch(&self, graph: &CoordinationGraph, tasks: &[TaskSample]) -> Result<f64> {
        if tasks.is_empty() {
            return Err(Error::Evaluation("task batch is empty".to_string()));
        }
        let outcomes = join_all(tasks.iter().map(|task| self.run(graph, task))).await;
        let mut total = 0.0;
        for outcome in outcomes {
            total += outcome?.score;
        }
        Ok(total / tasks.len() as f64)
    }

    fn score(&self, output: &str, task: &TaskSample) -> Result<f64> {
        let score = self.rubric.score(output, task).map_err(|e| match e {
            Error::Evaluation(_) => e,
            other => Error::Evaluation(other.to_string()),
        })?;
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(Error::Evaluation(format!(
                "rubric returned {} outside [0, 1]",
                score
            )));
        }
        Ok(score)
    }

    /// Hand a bypassed node's contributions on to its successors.
    fn forward(
        &self,
        graph: &CoordinationGraph,
        id: AgentId,
        received: &[Contribution],
        inbox: &mut HashMap<AgentId, Vec<Contribution>>,
    ) {
        for (succ, weight) in graph.successors(id) {
            let entry = inbox.entry(succ).or_default();
            for c in received {
                entry.push(Contribution::new(c.source, c.weight * weight, c.text.clone()));
            }
        }
    }
}
