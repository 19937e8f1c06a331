//! Graph invariant tests under randomized edit sequences.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use swarm::agent::{AgentBackend, AgentNode, MockBackend, Specialization};
use swarm::graph::CoordinationGraph;
use swarm::Error;

use crate::fixtures::{assert_topological, isolated_nodes, random_weight, seeded};

fn mock() -> Arc<dyn AgentBackend> {
    Arc::new(MockBackend::new())
}

/// Test: Random add/remove/reweight sequences
/// Given random edits over 8 nodes
/// When each edit is applied
/// Then the active subgraph stays acyclic and failed edits change nothing
#[test]
fn test_random_edits_preserve_acyclicity() {
    for seed in 0..25 {
        let mut rng = seeded(seed);
        let (mut graph, ids) = isolated_nodes(mock(), 8);

        for _ in 0..120 {
            let src = *ids.choose(&mut rng).unwrap();
            let dst = *ids.choose(&mut rng).unwrap();
            let before = graph.edges().len();
            let before_weight = graph.edge_weight(src, dst);

            let result = match rng.gen_range(0..3) {
                0 => graph.add_edge(src, dst, random_weight(&mut rng)),
                1 => graph.remove_edge(src, dst).map(|_| ()),
                _ => graph.set_edge_weight(src, dst, random_weight(&mut rng)),
            };

            if let Err(e) = result {
                assert!(e.is_structural(), "unexpected error {e}");
                assert_eq!(graph.edges().len(), before);
                assert_eq!(graph.edge_weight(src, dst), before_weight);
            }
            assert_topological(&graph);
        }
    }
}

/// Test: Topological order with dormant back edges
/// Given a chain a -> b -> c with a dormant edge c -> a
/// When the order is computed
/// Then the dormant edge is ignored and reactivating it is refused
#[test]
fn test_dormant_back_edge() {
    let (mut graph, ids) = isolated_nodes(mock(), 3);
    graph.add_edge(ids[0], ids[1], 0.6).unwrap();
    graph.add_edge(ids[1], ids[2], 0.6).unwrap();
    graph.add_edge(ids[2], ids[0], 0.0).unwrap();

    assert_eq!(graph.topological_ids().unwrap(), ids);
    let err = graph.set_edge_weight(ids[2], ids[0], 0.4).unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));
    assert_eq!(graph.edge_weight(ids[2], ids[0]), Some(0.0));
}

/// Test: Topological order is lazy and restartable
/// Given a diamond graph
/// When the order is partially consumed and then requested again
/// Then the new traversal starts from the beginning
#[test]
fn test_topological_order_restartable() {
    let (mut graph, ids) = isolated_nodes(mock(), 4);
    graph.add_edge(ids[0], ids[1], 0.5).unwrap();
    graph.add_edge(ids[0], ids[2], 0.5).unwrap();
    graph.add_edge(ids[1], ids[3], 0.5).unwrap();
    graph.add_edge(ids[2], ids[3], 0.5).unwrap();

    let mut order = graph.topological_order();
    assert_eq!(order.next().unwrap().unwrap(), ids[0]);

    let full: Vec<_> = graph.topological_order().collect::<swarm::Result<_>>().unwrap();
    assert_eq!(full.len(), 4);
    assert_eq!(full[0], ids[0]);
    assert_eq!(full[3], ids[3]);
    assert_eq!(graph.layers().unwrap().len(), 3);
}

/// Test: Node removal and replacement stay consistent
/// Given a graph with an exit designation
/// When the exit node is replaced and then pruned
/// Then edges and exits follow the node
#[test]
fn test_replace_then_prune_exit() {
    let (mut graph, ids) = isolated_nodes(mock(), 3);
    graph.add_edge(ids[0], ids[2], 0.5).unwrap();
    graph.add_edge(ids[1], ids[2], 0.7).unwrap();
    graph.set_exit_nodes(&[ids[2]]).unwrap();

    let replacement = AgentNode::new(Specialization::custom("critic"), mock());
    let new_id = graph.replace_node(ids[2], replacement).unwrap();
    assert_eq!(graph.exit_nodes(), vec![new_id]);
    assert_eq!(graph.predecessors(new_id).len(), 2);
    assert_eq!(graph.edge_weight(ids[1], new_id), Some(0.7));

    let err = graph.remove_node(new_id, false).unwrap_err();
    assert!(matches!(err, Error::NodeInUse { edges: 2, .. }));
    graph.remove_node(new_id, true).unwrap();
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.designated_exits().is_empty());
    assert_topological(&graph);
}

/// Test: Connectivity stays within bounds
/// Given graphs of increasing density
/// When connectivity is measured
/// Then it stays in [0, 1] and reaches 1 for a complete forward DAG
#[test]
fn test_connectivity_bounds() {
    let mut rng = seeded(99);
    let (mut graph, ids) = isolated_nodes(mock(), 6);
    assert_eq!(graph.connectivity(), 0.0);

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            graph.add_edge(ids[i], ids[j], rng.gen_range(0.1..=1.0)).unwrap();
            let c = graph.connectivity();
            assert!((0.0..=1.0).contains(&c));
        }
    }
    assert_eq!(graph.connectivity(), 1.0);
    assert!(CoordinationGraph::new().connectivity() == 0.0);
}
