//! Snapshot and restore tests.

use std::sync::Arc;

use swarm::agent::{AgentBackend, MockBackend, Specialization};
use swarm::graph::{CoordinationGraph, GraphSnapshot};

use crate::fixtures::{isolated_nodes, random_weight, seeded};

use rand::Rng;

/// Test: Snapshot round-trip
/// Given a randomly wired graph with exits and colors
/// When it is snapshotted, serialized and restored
/// Then ids, specializations, edge weights and exits match
#[test]
fn test_snapshot_round_trip_preserves_structure() {
    let backend: Arc<dyn AgentBackend> = Arc::new(MockBackend::new());
    let mut rng = seeded(17);
    let (mut graph, ids) = isolated_nodes(Arc::clone(&backend), 6);
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            if rng.gen_bool(0.5) {
                graph.add_edge(ids[i], ids[j], random_weight(&mut rng)).unwrap();
            }
        }
    }
    graph.add_edge(ids[0], ids[5], 0.9).unwrap();
    graph
        .set_edge_color(ids[0], ids[5], Some("#4682B4".to_string()))
        .unwrap();
    graph.set_exit_nodes(&[ids[5]]).unwrap();

    let json = graph.snapshot().with_trace(vec![0.2, 0.5]).to_json().unwrap();
    let snapshot = GraphSnapshot::from_json(&json).unwrap();
    let restored = CoordinationGraph::from_snapshot(&snapshot, backend).unwrap();

    assert_eq!(restored.node_ids(), graph.node_ids());
    for id in &ids {
        assert_eq!(
            restored.node(*id).unwrap().specialization(),
            graph.node(*id).unwrap().specialization()
        );
    }
    let mut original: Vec<_> = graph
        .edges()
        .into_iter()
        .map(|(s, d, data)| (s, d, data.weight))
        .collect();
    let mut copied: Vec<_> = restored
        .edges()
        .into_iter()
        .map(|(s, d, data)| (s, d, data.weight))
        .collect();
    original.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    copied.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    assert_eq!(original, copied);
    assert_eq!(restored.exit_nodes(), vec![ids[5]]);
    assert_eq!(
        restored.edge(ids[0], ids[5]).unwrap().color.as_deref(),
        Some("#4682B4")
    );
    assert_eq!(snapshot.performance_trace, vec![0.2, 0.5]);
}

/// Test: Snapshot node sizes
/// Given a ToT node fed by two others
/// When a snapshot is taken
/// Then its size grows with fan-in
#[test]
fn test_snapshot_sizes() {
    let backend: Arc<dyn AgentBackend> = Arc::new(MockBackend::new());
    let (mut graph, ids) = isolated_nodes(backend, 3);
    // Palette order puts ToT third.
    assert_eq!(
        graph.node(ids[2]).unwrap().specialization(),
        &Specialization::ToT
    );
    graph.add_edge(ids[0], ids[2], 0.5).unwrap();
    graph.add_edge(ids[1], ids[2], 0.5).unwrap();

    let snapshot = graph.snapshot();
    let tot = snapshot.nodes.iter().find(|n| n.id == ids[2]).unwrap();
    assert_eq!(tot.size, 30.0);
    assert!((snapshot.connectivity - 2.0 / 3.0).abs() < 1e-9);
}
