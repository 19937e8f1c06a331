//! End-to-end facade: estimate, plan, build, optimize.

use crate::agent::{self, AgentBackend};
use crate::config::SwarmConfig;
use crate::error::{Error, Result};
use crate::executor::{GraphExecutor, RunOutcome};
use crate::graph::GraphBuilder;
use crate::optimizer::{OptimizationOutcome, OptimizerEvent, TopologyOptimizer};
use crate::planning::{
    CollaborationPattern, ComplexityEstimator, ComplexityLevel, TaskComplexity, Team,
    TeamFormationPlanner,
};
use crate::rubric::{EvaluationRubric, TaskSample};
use crate::swlog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Final score above which a solve counts as a success.
pub const SUCCESS_THRESHOLD: f64 = 0.7;

/// Everything one [`Swarm::solve`] call produced.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub description: String,
    pub complexity: TaskComplexity,
    pub team: Team,
    pub optimization: OptimizationOutcome,
    /// The optimized graph run once on the first task.
    pub answer: RunOutcome,
}

impl SolveReport {
    pub fn succeeded(&self) -> bool {
        self.optimization.best_score > SUCCESS_THRESHOLD
    }
}

/// Summary of one solve, kept in the swarm's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRecord {
    pub description: String,
    pub level: ComplexityLevel,
    pub pattern: CollaborationPattern,
    pub team_size: usize,
    /// Wall-clock budget the complexity level suggested.
    pub estimated_time_secs: u64,
    pub baseline_score: f64,
    pub final_score: f64,
    pub iterations: usize,
    pub solved_at: DateTime<Utc>,
}

/// Averages over the solve history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmAnalytics {
    pub total_runs: usize,
    pub success_rate: f64,
    pub average_score: f64,
    pub average_improvement: f64,
    /// Mean final score per level; levels never seen report 0.
    pub by_level: BTreeMap<ComplexityLevel, f64>,
    pub by_pattern: BTreeMap<CollaborationPattern, f64>,
    pub best_pattern: Option<CollaborationPattern>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub struct Swarm {
    config: SwarmConfig,
    backend: Arc<dyn AgentBackend>,
    executor: GraphExecutor,
    estimator: ComplexityEstimator,
    planner: TeamFormationPlanner,
    events: Option<mpsc::Sender<OptimizerEvent>>,
    cancel: CancellationToken,
    history: Vec<SolveRecord>,
}

impl Swarm {
    pub fn new(
        config: SwarmConfig,
        backend: Arc<dyn AgentBackend>,
        rubric: Arc<dyn EvaluationRubric>,
    ) -> Result<Self> {
        config.validate()?;
        let executor = GraphExecutor::new(rubric).with_node_timeout(config.node_timeout());
        Ok(Self {
            config,
            backend,
            executor,
            estimator: ComplexityEstimator::new(),
            planner: TeamFormationPlanner::new(),
            events: None,
            cancel: CancellationToken::new(),
            history: Vec::new(),
        })
    }

    /// Build with the backend the configuration selects.
    pub fn from_config(config: SwarmConfig, rubric: Arc<dyn EvaluationRubric>) -> Result<Self> {
        let backend = agent::from_config(&config)?;
        Self::new(config, backend, rubric)
    }

    pub fn with_events(mut self, tx: mpsc::Sender<OptimizerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Token that cancels the optimization of the running solve, or of the
    /// next one if none is running. Once a solve has observed a cancel the
    /// swarm installs a fresh token, so fetch it again for later solves.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn history(&self) -> &[SolveRecord] {
        &self.history
    }

    /// Plan a team for `description`, build its graph, optimize it on
    /// `tasks`, and answer the first task with the result.
    pub async fn solve(&mut self, description: &str, tasks: &[TaskSample]) -> Result<SolveReport> {
        let Some(first) = tasks.first() else {
            return Err(Error::Validation("solve needs at least one task".to_string()));
        };

        let complexity = self.estimator.estimate(description);
        let team = self.planner.plan_team(&complexity, self.config.max_team_size);
        let estimated_time_secs = complexity.level.estimated_time_secs();
        swlog!(
            "Solving '{}': {} complexity ({:.0}% confident, ~{}s), team {} [{}]",
            description,
            complexity.level,
            complexity.confidence * 100.0,
            estimated_time_secs,
            team.name(),
            team.pattern
        );

        let graph = GraphBuilder::new(Arc::clone(&self.backend))
            .connection_probability(self.config.init_connection_probability)
            .seed(self.config.seed)
            .from_team(&team)?;

        let mut optimizer = TopologyOptimizer::new(self.executor.clone(), self.config.clone())?;
        if let Some(tx) = &self.events {
            optimizer = optimizer.with_events(tx.clone());
        }
        let optimization = optimizer.optimize(graph, tasks, &self.cancel).await;
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        let optimization = optimization?;
        let answer = self.executor.run(&optimization.graph, first).await?;

        self.history.push(SolveRecord {
            description: description.to_string(),
            level: complexity.level,
            pattern: team.pattern,
            team_size: team.size(),
            estimated_time_secs,
            baseline_score: optimization.baseline_score,
            final_score: optimization.best_score,
            iterations: optimization.iterations,
            solved_at: Utc::now(),
        });

        Ok(SolveReport {
            description: description.to_string(),
            complexity,
            team,
            optimization,
            answer,
        })
    }

    pub fn analytics(&self) -> SwarmAnalytics {
        if self.history.is_empty() {
            return SwarmAnalytics::default();
        }

        let scores: Vec<f64> = self.history.iter().map(|r| r.final_score).collect();
        let improvements: Vec<f64> = self
            .history
            .iter()
            .map(|r| r.final_score - r.baseline_score)
            .collect();
        let successes = scores.iter().filter(|s| **s > SUCCESS_THRESHOLD).count();

        let by_level = ComplexityLevel::ALL
            .iter()
            .map(|level| {
                let level_scores: Vec<f64> = self
                    .history
                    .iter()
                    .filter(|r| r.level == *level)
                    .map(|r| r.final_score)
                    .collect();
                (*level, mean(&level_scores))
            })
            .collect();

        let mut grouped: BTreeMap<CollaborationPattern, Vec<f64>> = BTreeMap::new();
        for record in &self.history {
            grouped.entry(record.pattern).or_default().push(record.final_score);
        }
        let by_pattern: BTreeMap<CollaborationPattern, f64> = grouped
            .into_iter()
            .map(|(pattern, scores)| (pattern, mean(&scores)))
            .collect();
        let best_pattern = by_pattern
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(pattern, _)| *pattern);

        SwarmAnalytics {
            total_runs: self.history.len(),
            success_rate: successes as f64 / self.history.len() as f64,
            average_score: mean(&scores),
            average_improvement: mean(&improvements),
            by_level,
            by_pattern,
            best_pattern,
        }
    }
}
