//! Optimizer run state with phase transition validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OptimizationTrial;
use crate::error::{Error, Result};

/// Where an optimization run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerPhase {
    /// Scoring the unmodified graph.
    Initializing,
    /// Sampling a mutation.
    Proposing,
    /// Scoring a mutated clone.
    Evaluating,
    Accepted,
    Rejected,
    /// Terminal.
    Converged,
}

impl std::fmt::Display for OptimizerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerPhase::Initializing => write!(f, "initializing"),
            OptimizerPhase::Proposing => write!(f, "proposing"),
            OptimizerPhase::Evaluating => write!(f, "evaluating"),
            OptimizerPhase::Accepted => write!(f, "accepted"),
            OptimizerPhase::Rejected => write!(f, "rejected"),
            OptimizerPhase::Converged => write!(f, "converged"),
        }
    }
}

/// A record of a phase transition with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    pub phase: OptimizerPhase,
    pub entered_at: DateTime<Utc>,
}

/// Everything one `optimize` call tracks, owned by that call.
///
/// Phases move as:
///
/// Initializing -> Proposing -> Evaluating -> Accepted | Rejected -> Proposing ...
///
/// A proposal that cannot be applied goes straight to Rejected, and every
/// phase except Converged may move to Converged.
#[derive(Debug, Clone)]
pub struct OptimizationState {
    phase: OptimizerPhase,
    phase_history: Vec<PhaseHistoryEntry>,
    iteration: usize,
    best_score: f64,
    performance_trace: Vec<f64>,
    trials: Vec<OptimizationTrial>,
    consecutive_rejections: usize,
    rejections: usize,
}

impl OptimizationState {
    pub fn new() -> Self {
        Self {
            phase: OptimizerPhase::Initializing,
            phase_history: vec![PhaseHistoryEntry {
                phase: OptimizerPhase::Initializing,
                entered_at: Utc::now(),
            }],
            iteration: 0,
            best_score: 0.0,
            performance_trace: Vec::new(),
            trials: Vec::new(),
            consecutive_rejections: 0,
            rejections: 0,
        }
    }

    pub fn can_transition(&self, target: OptimizerPhase) -> bool {
        use OptimizerPhase::*;
        matches!(
            (self.phase, target),
            (Initializing, Proposing)
                | (Proposing, Evaluating)
                | (Proposing, Rejected)
                | (Evaluating, Accepted)
                | (Evaluating, Rejected)
                | (Accepted, Proposing)
                | (Rejected, Proposing)
                | (Initializing | Proposing | Evaluating | Accepted | Rejected, Converged)
        )
    }

    pub fn transition(&mut self, target: OptimizerPhase) -> Result<()> {
        if !self.can_transition(target) {
            return Err(Error::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: target.to_string(),
            });
        }
        self.phase = target;
        self.phase_history.push(PhaseHistoryEntry {
            phase: target,
            entered_at: Utc::now(),
        });
        Ok(())
    }

    pub fn current_phase(&self) -> OptimizerPhase {
        self.phase
    }

    pub fn phase_history(&self) -> &[PhaseHistoryEntry] {
        &self.phase_history
    }

    /// Record the baseline score. Must be called before any trial.
    pub fn record_baseline(&mut self, score: f64) {
        self.best_score = score;
        self.performance_trace = vec![score];
    }

    pub fn begin_iteration(&mut self) -> usize {
        self.iteration += 1;
        self.iteration
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn record_accept(&mut self, trial: OptimizationTrial) {
        self.best_score = trial.score;
        self.performance_trace.push(trial.score);
        self.trials.push(trial);
        self.consecutive_rejections = 0;
    }

    /// Count a rejection; returns the current run of consecutive rejections.
    pub fn record_reject(&mut self) -> usize {
        self.rejections += 1;
        self.consecutive_rejections += 1;
        self.consecutive_rejections
    }

    pub fn rejections(&self) -> usize {
        self.rejections
    }

    pub fn performance_trace(&self) -> &[f64] {
        &self.performance_trace
    }

    pub fn trials(&self) -> &[OptimizationTrial] {
        &self.trials
    }

    pub(super) fn into_parts(self) -> (Vec<OptimizationTrial>, Vec<f64>, Vec<PhaseHistoryEntry>) {
        (self.trials, self.performance_trace, self.phase_history)
    }
}

impl Default for OptimizationState {
    fn default() -> Self {
        Self::new()
    }
}
