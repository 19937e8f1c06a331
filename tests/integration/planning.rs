//! Complexity estimation and team formation tests.

use std::sync::Arc;

use swarm::agent::{AgentBackend, MockBackend};
use swarm::graph::GraphBuilder;
use swarm::planning::{
    CollaborationPattern, ComplexityEstimator, ComplexityLevel, Skill, TaskComplexity,
    TeamFormationPlanner, MAX_TEAM_SIZE,
};

use crate::fixtures::assert_topological;

fn all_skill_subsets() -> Vec<Vec<Skill>> {
    let skills = [
        Skill::Research,
        Skill::Analysis,
        Skill::Coding,
        Skill::Synthesis,
        Skill::Creativity,
    ];
    (0..(1u32 << skills.len()))
        .map(|mask| {
            skills
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| *s)
                .collect()
        })
        .collect()
}

/// Test: Team size is monotone in complexity
/// Given every skill subset and every size cap
/// When teams are planned for Low, Medium and High
/// Then size and distinct specializations never decrease with the level
#[test]
fn test_team_size_monotone_in_level() {
    let planner = TeamFormationPlanner::new();
    for skills in all_skill_subsets() {
        for cap in 1..=8 {
            let teams: Vec<_> = ComplexityLevel::ALL
                .iter()
                .map(|level| {
                    let complexity = TaskComplexity::new(*level, 0.9).with_skills(skills.clone());
                    planner.plan_team(&complexity, cap)
                })
                .collect();
            for pair in teams.windows(2) {
                assert!(pair[0].size() <= pair[1].size(), "{:?} cap {}", skills, cap);
                assert!(
                    pair[0].distinct_specializations() <= pair[1].distinct_specializations(),
                    "{:?} cap {}",
                    skills,
                    cap
                );
            }
            for team in &teams {
                assert!(team.size() >= 1);
                assert!(team.size() <= cap.min(MAX_TEAM_SIZE));
                let perf = team.estimated_performance();
                assert!((0.6..=1.0).contains(&perf));
            }
        }
    }
}

/// Test: Estimator levels on representative prompts
/// Given prompts from simple lookups to multi-part analysis
/// When complexity is estimated
/// Then levels are ordered as expected
#[test]
fn test_estimator_orders_prompts() {
    let estimator = ComplexityEstimator::new();
    let low = estimator.estimate("Who wrote Dune?");
    let medium = estimator.estimate("Summarize the plot of Dune");
    let high = estimator.estimate("Compare the themes of Dune and Foundation");

    assert_eq!(low.level, ComplexityLevel::Low);
    assert_eq!(medium.level, ComplexityLevel::Medium);
    assert_eq!(high.level, ComplexityLevel::High);
    assert!(high.has_skill(Skill::Analysis));
}

/// Test: Planned teams build valid graphs
/// Given estimates for several prompts
/// When each team is turned into a graph
/// Then every graph is acyclic with one node per member
#[test]
fn test_planned_teams_build_valid_graphs() {
    let backend: Arc<dyn AgentBackend> = Arc::new(MockBackend::new());
    let estimator = ComplexityEstimator::new();
    let planner = TeamFormationPlanner::new();
    let prompts = [
        "List the planets",
        "Explain how vaccines train the immune system",
        "Design an innovative algorithm, write the code, and evaluate it against research baselines",
    ];

    for (i, prompt) in prompts.iter().enumerate() {
        let team = planner.plan_team(&estimator.estimate(prompt), 6);
        let graph = GraphBuilder::new(Arc::clone(&backend))
            .connection_probability(0.5)
            .seed(Some(i as u64))
            .from_team(&team)
            .unwrap();
        assert_eq!(graph.node_count(), team.size());
        assert_topological(&graph);
        if team.pattern == CollaborationPattern::FullyConnected {
            assert_eq!(graph.connectivity(), 1.0);
        }
    }
}
