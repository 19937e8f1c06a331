//! Team formation from a complexity estimate.

use super::complexity::{ComplexityLevel, Skill, TaskComplexity};
use crate::agent::Specialization;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Hard ceiling on team size regardless of configuration.
pub const MAX_TEAM_SIZE: usize = 6;

/// How members divide the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationStrategy {
    HierarchicalSpecialization,
    SkillBasedClustering,
    DeepCollaboration,
    SimpleParallel,
}

impl std::fmt::Display for FormationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FormationStrategy::HierarchicalSpecialization => "hierarchical_specialization",
            FormationStrategy::SkillBasedClustering => "skill_based_clustering",
            FormationStrategy::DeepCollaboration => "deep_collaboration",
            FormationStrategy::SimpleParallel => "simple_parallel",
        };
        write!(f, "{}", s)
    }
}

/// Communication shape the initial graph is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationPattern {
    Sequential,
    HubAndSpoke,
    FullyConnected,
    Pipeline,
}

impl std::fmt::Display for CollaborationPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollaborationPattern::Sequential => "sequential",
            CollaborationPattern::HubAndSpoke => "hub_and_spoke",
            CollaborationPattern::FullyConnected => "fully_connected",
            CollaborationPattern::Pipeline => "pipeline",
        };
        write!(f, "{}", s)
    }
}

/// Team composition for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub level: ComplexityLevel,
    pub members: Vec<Specialization>,
    pub skills: Vec<Skill>,
    pub formation: FormationStrategy,
    pub pattern: CollaborationPattern,
}

impl Team {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn name(&self) -> String {
        format!("{}-{}-{}", self.level, self.formation, self.size())
    }

    pub fn distinct_specializations(&self) -> usize {
        self.members.iter().collect::<HashSet<_>>().len()
    }

    /// Fraction of required skills some member covers. 1.0 when none are required.
    pub fn skill_coverage(&self) -> f64 {
        if self.skills.is_empty() {
            return 1.0;
        }
        let covered = self
            .skills
            .iter()
            .filter(|skill| self.members.iter().any(|m| covers(m, **skill)))
            .count();
        covered as f64 / self.skills.len() as f64
    }

    /// Heuristic prior for how well this team will do.
    pub fn estimated_performance(&self) -> f64 {
        let size_factor = (self.size() as f64 / 4.0).min(1.0);
        (0.6 + 0.3 * self.skill_coverage() + 0.1 * size_factor).min(1.0)
    }
}

fn covers(member: &Specialization, skill: Skill) -> bool {
    match member {
        Specialization::Io => matches!(skill, Skill::Research | Skill::Synthesis),
        Specialization::CoT | Specialization::ToT => skill == Skill::Analysis,
        Specialization::Custom(role) => match role.as_str() {
            "coder" => skill == Skill::Coding,
            "creative" => skill == Skill::Creativity,
            "critic" => skill == Skill::Analysis,
            _ => false,
        },
    }
}

fn specialist_for(skill: Skill) -> Specialization {
    match skill {
        Skill::Analysis => Specialization::ToT,
        Skill::Coding => Specialization::custom("coder"),
        Skill::Creativity => Specialization::custom("creative"),
        Skill::Research | Skill::Synthesis => Specialization::Io,
    }
}

fn base_roster(level: ComplexityLevel) -> Vec<Specialization> {
    match level {
        ComplexityLevel::Low => vec![Specialization::Io, Specialization::CoT],
        ComplexityLevel::Medium => {
            vec![Specialization::Io, Specialization::CoT, Specialization::ToT]
        }
        ComplexityLevel::High => vec![
            Specialization::Io,
            Specialization::CoT,
            Specialization::ToT,
            Specialization::custom("critic"),
        ],
    }
}

/// Maps a [`TaskComplexity`] to a [`Team`].
///
/// For a fixed skill set and size cap, raising the level never shrinks the
/// team and never reduces the number of distinct specializations.
#[derive(Debug, Clone, Default)]
pub struct TeamFormationPlanner;

impl TeamFormationPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn target_size(&self, complexity: &TaskComplexity, max_team_size: usize) -> usize {
        let wanted = complexity.level.base_team_size() + complexity.skills.len() / 2;
        wanted.min(MAX_TEAM_SIZE).min(max_team_size).max(1)
    }

    pub fn plan_team(&self, complexity: &TaskComplexity, max_team_size: usize) -> Team {
        let size = self.target_size(complexity, max_team_size);

        let mut members = base_roster(complexity.level);
        for skill in &complexity.skills {
            let specialist = specialist_for(*skill);
            if !members.contains(&specialist) {
                members.push(specialist);
            }
        }
        while members.len() < size {
            members.push(Specialization::Io);
        }
        members.truncate(size);

        let formation = Self::formation_strategy(complexity);
        let pattern = Self::collaboration_pattern(&members);

        Team {
            level: complexity.level,
            members,
            skills: complexity.skills.clone(),
            formation,
            pattern,
        }
    }

    pub fn formation_strategy(complexity: &TaskComplexity) -> FormationStrategy {
        let skills = complexity.skills.len();
        let high = complexity.level == ComplexityLevel::High;
        if high && skills > 3 {
            FormationStrategy::HierarchicalSpecialization
        } else if skills > 2 {
            FormationStrategy::SkillBasedClustering
        } else if high {
            FormationStrategy::DeepCollaboration
        } else {
            FormationStrategy::SimpleParallel
        }
    }

    pub fn collaboration_pattern(members: &[Specialization]) -> CollaborationPattern {
        if members.len() <= 2 {
            CollaborationPattern::Sequential
        } else if members.contains(&Specialization::ToT) {
            CollaborationPattern::HubAndSpoke
        } else if members.len() >= 4 {
            CollaborationPattern::FullyConnected
        } else {
            CollaborationPattern::Pipeline
        }
    }
}
