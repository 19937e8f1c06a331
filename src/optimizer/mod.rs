//! Topology optimizer.
//!
//! Hill-climbs a [`CoordinationGraph`]: each iteration proposes one local
//! mutation, scores a private clone of the live graph over a task batch, and
//! commits the clone only if it strictly beats the best score so far (by more
//! than the configured epsilon). The live graph is owned by the
//! [`TopologyOptimizer::optimize`] call and is written only at commit.

mod mutation;
mod state;

pub use mutation::{Mutation, MutationFamily, MutationSampler, MAX_REWEIGHT_DELTA};
pub use state::{OptimizationState, OptimizerPhase, PhaseHistoryEntry};

use crate::config::SwarmConfig;
use crate::error::Result;
use crate::executor::GraphExecutor;
use crate::graph::{CoordinationGraph, GraphSnapshot};
use crate::rubric::TaskSample;
use crate::{swlog, swlog_debug, swlog_error, swlog_trace, swlog_warn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An accepted mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationTrial {
    pub iteration: usize,
    pub mutation: Mutation,
    /// Mean batch score of the accepted graph.
    pub score: f64,
    pub accepted_at: DateTime<Utc>,
    pub snapshot: GraphSnapshot,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BudgetExhausted,
    Plateau,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::BudgetExhausted => write!(f, "budget exhausted"),
            StopReason::Plateau => write!(f, "plateau"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Events emitted while optimizing, for reporting sinks.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerEvent {
    TrialAccepted(OptimizationTrial),
    Converged {
        reason: StopReason,
        best_score: f64,
        snapshot: GraphSnapshot,
    },
}

/// What [`TopologyOptimizer::optimize`] hands back.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    /// Best graph found; the input graph if nothing was accepted.
    pub graph: CoordinationGraph,
    pub baseline_score: f64,
    pub best_score: f64,
    pub trials: Vec<OptimizationTrial>,
    /// Baseline followed by each accepted score. Non-decreasing.
    pub performance_trace: Vec<f64>,
    pub iterations: usize,
    pub rejections: usize,
    pub stop_reason: StopReason,
    pub phase_history: Vec<PhaseHistoryEntry>,
}

impl OptimizationOutcome {
    pub fn improvement(&self) -> f64 {
        self.best_score - self.baseline_score
    }
}

pub struct TopologyOptimizer {
    executor: GraphExecutor,
    config: SwarmConfig,
    events: Option<mpsc::Sender<OptimizerEvent>>,
}

impl TopologyOptimizer {
    /// # Errors
    /// `Validation` if the configuration is unusable (see [`SwarmConfig::validate`]).
    pub fn new(executor: GraphExecutor, config: SwarmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            executor,
            config,
            events: None,
        })
    }

    /// Send [`OptimizerEvent`]s to `tx`. A closed channel is ignored.
    pub fn with_events(mut self, tx: mpsc::Sender<OptimizerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    fn families(&self) -> Vec<MutationFamily> {
        let mut families = Vec::with_capacity(2);
        if self.config.edge_optimize {
            families.push(MutationFamily::Edge);
        }
        if self.config.node_optimize {
            families.push(MutationFamily::Node);
        }
        families
    }

    /// Strict improvement over `best` by more than the configured epsilon.
    fn improves(&self, score: f64, best: f64) -> bool {
        score > best + self.config.improvement_epsilon
    }

    async fn emit(&self, event: OptimizerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Optimize `graph` against `tasks` until the budget runs out, the run
    /// plateaus, or `cancel` fires.
    ///
    /// # Errors
    /// Only the baseline evaluation can fail the run (`EmptyGraph`,
    /// `Evaluation`). Trial failures count as rejections.
    pub async fn optimize(
        &self,
        graph: CoordinationGraph,
        tasks: &[TaskSample],
        cancel: &CancellationToken,
    ) -> Result<OptimizationOutcome> {
        let mut state = OptimizationState::new();
        let mut sampler = MutationSampler::new(self.config.seed);
        let families = self.families();
        let mut live = graph;

        let baseline = match self.executor.run_batch(&live, tasks).await {
            Ok(score) => score,
            Err(e) => {
                swlog_error!("Baseline evaluation failed: {}", e);
                return Err(e);
            }
        };
        state.record_baseline(baseline);
        swlog!(
            "Optimizing graph ({} nodes, {} edges): baseline {:.3}, budget {}",
            live.node_count(),
            live.edge_count(),
            baseline,
            self.config.iteration_budget
        );

        let mut stop_reason = StopReason::BudgetExhausted;
        while state.iteration() < self.config.iteration_budget {
            if cancel.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            let iteration = state.begin_iteration();
            state.transition(OptimizerPhase::Proposing)?;

            let proposal = sampler
                .choose_family(&families)
                .and_then(|family| sampler.propose(&live, family));
            let candidate = proposal.and_then(|mutation| {
                let mut candidate = live.clone();
                match mutation.apply(&mut candidate) {
                    Ok(()) => Some((mutation, candidate)),
                    Err(e) => {
                        swlog_debug!("Iteration {}: {} refused: {}", iteration, mutation, e);
                        None
                    }
                }
            });

            let accepted = match candidate {
                None => None,
                Some((mutation, candidate)) => {
                    state.transition(OptimizerPhase::Evaluating)?;
                    let evaluated = tokio::select! {
                        _ = cancel.cancelled() => {
                            stop_reason = StopReason::Cancelled;
                            break;
                        }
                        result = self.executor.run_batch(&candidate, tasks) => result,
                    };
                    match evaluated {
                        Ok(score) if self.improves(score, state.best_score()) => {
                            Some((mutation, candidate, score))
                        }
                        Ok(score) => {
                            swlog_trace!(
                                "Iteration {}: rejected {} ({:.3} <= {:.3})",
                                iteration,
                                mutation,
                                score,
                                state.best_score()
                            );
                            None
                        }
                        Err(e) => {
                            swlog_warn!(
                                "Iteration {}: evaluation of {} failed: {}",
                                iteration,
                                mutation,
                                e
                            );
                            None
                        }
                    }
                }
            };

            match accepted {
                Some((mutation, candidate, score)) => {
                    state.transition(OptimizerPhase::Accepted)?;
                    live = candidate;
                    let mut trace = state.performance_trace().to_vec();
                    trace.push(score);
                    let trial = OptimizationTrial {
                        iteration,
                        mutation,
                        score,
                        accepted_at: Utc::now(),
                        snapshot: live.snapshot().with_trace(trace),
                    };
                    swlog!(
                        "Iteration {}: accepted {} ({:.3} -> {:.3})",
                        iteration,
                        trial.mutation,
                        state.best_score(),
                        score
                    );
                    state.record_accept(trial.clone());
                    self.emit(OptimizerEvent::TrialAccepted(trial)).await;
                }
                None => {
                    state.transition(OptimizerPhase::Rejected)?;
                    let streak = state.record_reject();
                    if self.config.plateau_limit > 0 && streak >= self.config.plateau_limit {
                        stop_reason = StopReason::Plateau;
                        break;
                    }
                }
            }
        }

        state.transition(OptimizerPhase::Converged)?;
        let best_score = state.best_score();
        let iterations = state.iteration();
        let rejections = state.rejections();
        swlog!(
            "Optimization converged ({}): best {:.3} after {} iterations, {} accepted",
            stop_reason,
            best_score,
            iterations,
            state.trials().len()
        );

        let (trials, performance_trace, phase_history) = state.into_parts();
        self.emit(OptimizerEvent::Converged {
            reason: stop_reason,
            best_score,
            snapshot: live.snapshot().with_trace(performance_trace.clone()),
        })
        .await;

        Ok(OptimizationOutcome {
            graph: live,
            baseline_score: baseline,
            best_score,
            trials,
            performance_trace,
            iterations,
            rejections,
            stop_reason,
            phase_history,
        })
    }
}
