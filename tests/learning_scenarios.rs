//! End-to-end scenarios exercising the public `Engine` surface and the
//! store's traversal, decay, and fusion primitives together.

use chrono::Duration;
use hypergraph_memory::config::EngineConfig;
use hypergraph_memory::learning::decay;
use hypergraph_memory::models::{
    ConnectOptions, ConstraintType, CorrectionDetails, Direction, LearnedFact, LearningSignal,
    Node, NodeFilter, NodeId, NodeType, SearchResult, SignalContext, SignalSource, SignalType,
};
use hypergraph_memory::search::{RrfConfig, RrfFusion};
use hypergraph_memory::storage::memory::InMemoryBackend;
use hypergraph_memory::storage::Backend;
use hypergraph_memory::{now, Engine};

fn ctx(query: &str, output: &str) -> SignalContext {
    SignalContext {
        query: query.to_string(),
        output: output.to_string(),
        ..Default::default()
    }
}

#[test]
fn scenario_round_trip_fact() {
    let backend = InMemoryBackend::new();
    let fact = LearnedFact::new("Go uses if err != nil for error handling", "go", SignalSource::Explicit, 0.95);
    let node = backend.create_node(hypergraph_memory::learning::projection::fact_to_node(&fact)).unwrap();

    let fetched = backend.get_node(&node.id).unwrap();
    let round_tripped = hypergraph_memory::learning::projection::node_to_fact(&fetched);

    assert_eq!(round_tripped.content, "Go uses if err != nil for error handling");
    assert_eq!(round_tripped.domain, "go");
    assert_eq!(round_tripped.source, SignalSource::Explicit);
    assert!((round_tripped.confidence - 0.95).abs() < 1e-4);
}

#[test]
fn scenario_correction_signal_becomes_constraint() {
    let engine = Engine::new(InMemoryBackend::new(), EngineConfig::default());
    let mut signal = LearningSignal::new(SignalType::Correction, ctx("Handle the error", "panic(err)"), 0.9).with_domain("go");
    signal.metadata.correction = Some(CorrectionDetails {
        original: "panic(err)".to_string(),
        corrected: "return fmt.Errorf(...)".to_string(),
        severity: 0.3,
    });
    engine.learn(&signal).unwrap();

    let result = engine.apply("panic(err)", "go", None).unwrap();
    assert_eq!(result.constraints.len(), 1);
    let constraint = &result.constraints[0];
    assert_eq!(constraint.constraint_type, ConstraintType::Avoid);
    assert!(constraint.correction.as_ref().unwrap().contains("return fmt.Errorf"));
}

#[test]
fn scenario_pattern_reinforcement_averages_success_rate() {
    let engine = Engine::new(InMemoryBackend::new(), EngineConfig::default());
    let output = "if err != nil { return err }\nx, err := f()\nif err != nil { return err }";

    let s1 = LearningSignal::new(SignalType::Success, ctx("how do I check errors", output), 0.8).with_domain("go");
    let s2 = LearningSignal::new(SignalType::Success, ctx("how do I check errors", output), 0.6).with_domain("go");
    engine.learn(&s1).unwrap();
    engine.learn(&s2).unwrap();

    let result = engine.apply("error handling", "go", None).unwrap();
    assert_eq!(result.patterns.len(), 1);
    assert_eq!(result.patterns[0].usage_count, 2);
    assert!((result.patterns[0].success_rate - 0.7).abs() < 1e-4);
}

#[test]
fn scenario_traversal_depth_one_and_two() {
    let backend = InMemoryBackend::new();
    let a = backend.create_node(Node::new(NodeType::Entity, "A")).unwrap();
    let b = backend.create_node(Node::new(NodeType::Entity, "B")).unwrap();
    let c = backend.create_node(Node::new(NodeType::Entity, "C")).unwrap();
    let d = backend.create_node(Node::new(NodeType::Entity, "D")).unwrap();

    backend.create_relation("leads_to", &a.id, &b.id).unwrap();
    backend.create_relation("leads_to", &b.id, &c.id).unwrap();
    backend.create_relation("leads_to", &a.id, &d.id).unwrap();

    let depth1 = backend.get_connected(&a.id, &ConnectOptions::new().with_direction(Direction::Both).with_max_depth(1)).unwrap();
    let mut ids1: Vec<NodeId> = depth1.iter().map(|(n, _, _)| n.id.clone()).collect();
    ids1.sort_by(|x, y| x.as_str().cmp(y.as_str()));
    let mut expected1 = vec![b.id.clone(), d.id.clone()];
    expected1.sort_by(|x, y| x.as_str().cmp(y.as_str()));
    assert_eq!(ids1, expected1);

    let depth2 = backend.get_connected(&a.id, &ConnectOptions::new().with_direction(Direction::Both).with_max_depth(2)).unwrap();
    assert_eq!(depth2.len(), 3);
    let depth_of = |id: &NodeId| depth2.iter().find(|(n, _, _)| &n.id == id).unwrap().2;
    assert_eq!(depth_of(&b.id), 1);
    assert_eq!(depth_of(&d.id), 1);
    assert_eq!(depth_of(&c.id), 2);
}

#[test]
fn scenario_decay_near_half_life() {
    let half_life_secs = 7.0 * 24.0 * 3600.0;
    let seven_days_ago = now() - Duration::days(7);
    let c = decay(1.0, Some(seven_days_ago), 1, half_life_secs, 0.2);
    assert!((c - 0.552).abs() < 0.01, "expected ~0.552, got {c}");

    let c_well_used = decay(1.0, Some(seven_days_ago), 10, half_life_secs, 0.2);
    assert!(c_well_used >= 0.8, "expected >= 0.8 with high access count, got {c_well_used}");
}

#[test]
fn scenario_rrf_blend_favors_dual_ranked_item() {
    let backend = InMemoryBackend::new();
    let a = backend.create_node(Node::new(NodeType::Fact, "a")).unwrap();
    let b = backend.create_node(Node::new(NodeType::Fact, "b")).unwrap();
    let c = backend.create_node(Node::new(NodeType::Fact, "c")).unwrap();
    let d = backend.create_node(Node::new(NodeType::Fact, "d")).unwrap();

    let keyword_results = vec![SearchResult::new(a.clone(), 3.0), SearchResult::new(b.clone(), 2.0), SearchResult::new(c.clone(), 1.0)];
    let semantic_hits = vec![(b.id.clone(), 0.95), (d.id.clone(), 0.8), (a.id.clone(), 0.6)];

    let fusion = RrfFusion::with_config(RrfConfig::default().with_alpha(0.5).with_k(60.0));
    let fused = fusion.fuse(&backend, &keyword_results, &semantic_hits).unwrap();

    assert_eq!(fused[0].node.id, b.id);
}

#[test]
fn invariant_decay_never_increases_and_stays_positive() {
    let cases = [(0.9_f32, 0u64), (0.5, 3), (0.2, 50), (0.05, 0)];
    for (c, n) in cases {
        let last = now() - Duration::days(1);
        let decayed = decay(c, Some(last), n, 7.0 * 24.0 * 3600.0, 0.2);
        assert!(decayed <= c, "decay must not increase: {c} -> {decayed}");
        assert!(decayed > 0.0, "decay must stay positive: got {decayed}");
    }
}

#[test]
fn invariant_concurrent_node_creation_is_consistent() {
    use std::sync::Arc;
    use std::thread;

    let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());
    let mut handles = Vec::new();
    for i in 0..8 {
        let backend = Arc::clone(&backend);
        handles.push(thread::spawn(move || {
            backend.create_node(Node::new(NodeType::Fact, format!("concurrent fact {i}"))).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = backend.stats().unwrap();
    assert_eq!(stats.node_count, 8);

    let nodes = backend.list_nodes(&NodeFilter::new()).unwrap();
    let unique_ids: std::collections::HashSet<_> = nodes.iter().map(|n| n.id.clone()).collect();
    assert_eq!(unique_ids.len(), 8, "every concurrently created node must get a distinct id");
}
