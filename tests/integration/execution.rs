//! Graph execution tests: routing, merging and partial failure.

use std::sync::Arc;
use std::time::Duration;

use swarm::agent::{AgentBackend, AgentNode, MockBackend, Specialization};
use swarm::executor::{GraphExecutor, NodeStatus};
use swarm::graph::CoordinationGraph;
use swarm::rubric::{KeywordRubric, TaskSample};

use crate::fixtures::{chain_graph, isolated_nodes, RecordingBackend};

fn executor() -> GraphExecutor {
    GraphExecutor::new(Arc::new(KeywordRubric::new())).with_node_timeout(Duration::from_secs(5))
}

fn task() -> TaskSample {
    TaskSample::new("raw task input").with_criteria(["out-"])
}

/// Test: Failing middle node is bypassed
/// Given a chain A -> B -> C where B fails
/// When the graph runs
/// Then the run completes and C's input is exactly A's contribution
#[tokio::test]
async fn test_failing_middle_node_is_bypassed() {
    let backend = RecordingBackend::new();
    let (graph, ids) = chain_graph(backend.clone(), &[0.8, 0.8]);
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    backend.fail(b);

    let outcome = executor().run(&graph, &task()).await.unwrap();

    assert_eq!(backend.inputs_of(a), vec!["raw task input".to_string()]);
    assert_eq!(backend.inputs_of(b), vec![RecordingBackend::output_of(a)]);
    assert_eq!(backend.inputs_of(c), vec![RecordingBackend::output_of(a)]);
    assert!(matches!(
        outcome.report(b).unwrap().status,
        NodeStatus::Failed { .. }
    ));
    assert_eq!(outcome.output, RecordingBackend::output_of(c));
    assert_eq!(outcome.failed_nodes(), vec![b]);
}

/// Test: Bypass does not duplicate a shared source
/// Given A -> B, B -> C and A -> C where B fails
/// When the graph runs
/// Then C receives A's output once, not once per path
#[tokio::test]
async fn test_bypass_does_not_duplicate_direct_contribution() {
    let backend = RecordingBackend::new();
    let (mut graph, ids) = isolated_nodes(backend.clone(), 3);
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    graph.add_edge(a, b, 0.8).unwrap();
    graph.add_edge(b, c, 0.8).unwrap();
    graph.add_edge(a, c, 0.5).unwrap();
    backend.fail(b);

    let outcome = executor().run(&graph, &task()).await.unwrap();

    assert_eq!(backend.inputs_of(c), vec![RecordingBackend::output_of(a)]);
    assert_eq!(outcome.report(c).unwrap().input, RecordingBackend::output_of(a));
    assert_eq!(outcome.output, RecordingBackend::output_of(c));
}

/// Test: Failed exits merge each source once
/// Given A feeding two exits B and C, both failing
/// When the graph runs
/// Then the fallback output holds A's contribution once
#[tokio::test]
async fn test_failed_exits_fallback_deduplicates() {
    let backend = RecordingBackend::new();
    let (mut graph, ids) = isolated_nodes(backend.clone(), 3);
    graph.add_edge(ids[0], ids[1], 0.7).unwrap();
    graph.add_edge(ids[0], ids[2], 0.4).unwrap();
    backend.fail(ids[1]);
    backend.fail(ids[2]);

    let outcome = executor().run(&graph, &task()).await.unwrap();
    assert_eq!(outcome.output, RecordingBackend::output_of(ids[0]));
}

/// Test: Entry nodes see the raw task
/// Given three unconnected nodes
/// When the graph runs
/// Then each receives the raw input and every output reaches the final merge
#[tokio::test]
async fn test_unconnected_nodes_all_exit() {
    let backend = RecordingBackend::new();
    let (graph, ids) = isolated_nodes(backend.clone(), 3);

    let outcome = executor().run(&graph, &task()).await.unwrap();

    for id in &ids {
        assert_eq!(backend.inputs_of(*id), vec!["raw task input".to_string()]);
        assert!(outcome.output.contains(&RecordingBackend::output_of(*id)));
    }
    assert_eq!(outcome.score, 1.0);
}

/// Test: Contributions merge heaviest first
/// Given two sources feeding a sink with weights 0.3 and 0.9
/// When the graph runs
/// Then the sink's input lists the heavier contribution first
#[tokio::test]
async fn test_merge_order_follows_weight() {
    let backend = RecordingBackend::new();
    let (mut graph, ids) = isolated_nodes(backend.clone(), 3);
    graph.add_edge(ids[0], ids[2], 0.3).unwrap();
    graph.add_edge(ids[1], ids[2], 0.9).unwrap();

    executor().run(&graph, &task()).await.unwrap();

    let expected = format!(
        "{}\n\n{}",
        RecordingBackend::output_of(ids[1]),
        RecordingBackend::output_of(ids[0])
    );
    assert_eq!(backend.inputs_of(ids[2]), vec![expected]);
}

/// Test: Dormant edges carry nothing
/// Given a -> b with weight 0
/// When the graph runs
/// Then b receives the raw input and both are exits
#[tokio::test]
async fn test_dormant_edge_carries_nothing() {
    let backend = RecordingBackend::new();
    let (graph, ids) = chain_graph(backend.clone(), &[0.0]);

    let outcome = executor().run(&graph, &task()).await.unwrap();

    assert_eq!(backend.inputs_of(ids[1]), vec!["raw task input".to_string()]);
    assert_eq!(graph.exit_nodes().len(), 2);
    assert!(outcome.output.contains(&RecordingBackend::output_of(ids[0])));
}

/// Test: Failed exit falls back to what it received
/// Given a -> b where the only exit b fails
/// When the graph runs
/// Then the final output is a's contribution
#[tokio::test]
async fn test_failed_exit_forwards_its_input() {
    let backend = RecordingBackend::new();
    let (graph, ids) = chain_graph(backend.clone(), &[0.6]);
    backend.fail(ids[1]);

    let outcome = executor().run(&graph, &task()).await.unwrap();
    assert_eq!(outcome.output, RecordingBackend::output_of(ids[0]));
}

/// Test: Same-layer nodes run concurrently
/// Given four independent slow nodes
/// When the graph runs
/// Then the wall time is close to one node's latency, not four
#[tokio::test]
async fn test_same_layer_runs_concurrently() {
    let backend: Arc<dyn AgentBackend> =
        Arc::new(MockBackend::new().with_latency(Duration::from_millis(200)));
    let mut graph = CoordinationGraph::new();
    for _ in 0..4 {
        graph.add_node(AgentNode::new(Specialization::Io, Arc::clone(&backend)));
    }

    let started = std::time::Instant::now();
    let outcome = executor()
        .run(&graph, &TaskSample::new("x").with_criteria(["IO"]))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(700));
    assert_eq!(outcome.node_reports.len(), 4);
}
