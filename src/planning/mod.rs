//! Task complexity estimation and team formation.

mod complexity;
mod team;

pub use complexity::{
    ComplexityEstimator, ComplexityLevel, ComplexitySignals, Skill, TaskComplexity,
};
pub use team::{
    CollaborationPattern, FormationStrategy, Team, TeamFormationPlanner, MAX_TEAM_SIZE,
};
