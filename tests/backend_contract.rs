//! Shared contract suite: every assertion here runs against both
//! [`InMemoryBackend`] and [`SqliteBackend`], so the two implementations are
//! held to byte-for-byte identical semantics.

use hypergraph_memory::models::{
    ConnectOptions, Direction, EvolutionEntry, EvolutionOperation, HyperedgeType, Node, NodeFilter,
    NodeId, NodeType, PreferenceScope, Role, SearchOptions, Tier,
};
use hypergraph_memory::storage::{Backend, InMemoryBackend, SqliteBackend};

macro_rules! contract_test {
    ($name:ident) => {
        mod $name {
            use super::*;

            #[test]
            fn in_memory() {
                super::$name(&InMemoryBackend::new());
            }

            #[test]
            fn sqlite() {
                super::$name(&SqliteBackend::open_in_memory().unwrap());
            }
        }
    };
}

fn create_and_fetch_roundtrips(b: &dyn Backend) {
    let created = b.create_node(Node::new(NodeType::Fact, "water boils at 100C")).unwrap();
    assert!(!created.id.is_unset());
    assert_eq!(created.tier, Tier::Task);
    let fetched = b.get_node(&created.id).unwrap();
    assert_eq!(fetched.content, "water boils at 100C");
    assert_eq!(fetched.id, created.id);
}

fn get_missing_node_is_not_found(b: &dyn Backend) {
    let err = b.get_node(&NodeId::new()).unwrap_err();
    assert!(err.is_not_found());
}

fn update_preserves_created_at_and_bumps_updated_at(b: &dyn Backend) {
    let created = b.create_node(Node::new(NodeType::Fact, "x")).unwrap();
    let mut updated = created.clone();
    updated.content = "y".to_string();
    let result = b.update_node(updated).unwrap();
    assert_eq!(result.created_at, created.created_at);
    assert_eq!(result.content, "y");
}

fn update_missing_node_is_not_found(b: &dyn Backend) {
    let mut node = Node::new(NodeType::Fact, "x");
    node.id = NodeId::new();
    let err = b.update_node(node).unwrap_err();
    assert!(err.is_not_found());
}

fn delete_node_cascades_memberships(b: &dyn Backend) {
    let a = b.create_node(Node::new(NodeType::Entity, "a")).unwrap();
    let c = b.create_node(Node::new(NodeType::Entity, "c")).unwrap();
    let edge = b.create_relation("relates to", &a.id, &c.id).unwrap();
    b.delete_node(&a.id).unwrap();
    assert!(b.get_members(&edge.id).unwrap().iter().all(|m| m.node_id != a.id));
}

fn delete_hyperedge_cascades_memberships(b: &dyn Backend) {
    let a = b.create_node(Node::new(NodeType::Entity, "a")).unwrap();
    let c = b.create_node(Node::new(NodeType::Entity, "c")).unwrap();
    let edge = b.create_relation("relates to", &a.id, &c.id).unwrap();
    b.delete_hyperedge(&edge.id).unwrap();
    assert!(b.get_members(&edge.id).unwrap().is_empty());
    assert!(b.get_node_hyperedges(&a.id).unwrap().is_empty());
}

fn increment_access_is_monotone(b: &dyn Backend) {
    let node = b.create_node(Node::new(NodeType::Fact, "x")).unwrap();
    b.increment_access(&node.id).unwrap();
    b.increment_access(&node.id).unwrap();
    let fetched = b.get_node(&node.id).unwrap();
    assert_eq!(fetched.access_count, 2);
    assert!(fetched.last_accessed.is_some());
}

fn list_nodes_filters_by_type_and_confidence(b: &dyn Backend) {
    b.create_node(Node::new(NodeType::Fact, "f1").with_confidence(0.9)).unwrap();
    b.create_node(Node::new(NodeType::Fact, "f2").with_confidence(0.2)).unwrap();
    b.create_node(Node::new(NodeType::Entity, "e1")).unwrap();
    let filter = NodeFilter::new().with_type(NodeType::Fact).with_min_confidence(0.5);
    let results = b.list_nodes(&filter).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "f1");
}

fn count_nodes_matches_list_nodes_length(b: &dyn Backend) {
    b.create_node(Node::new(NodeType::Fact, "f1")).unwrap();
    b.create_node(Node::new(NodeType::Entity, "e1")).unwrap();
    let filter = NodeFilter::new();
    assert_eq!(b.count_nodes(&filter).unwrap(), b.list_nodes(&filter).unwrap().len());
}

fn search_by_content_excludes_archived_and_scores_by_occurrence(b: &dyn Backend) {
    b.create_node(Node::new(NodeType::Fact, "err err err").with_tier(Tier::Archive)).unwrap();
    let live = b.create_node(Node::new(NodeType::Fact, "if err != nil return err")).unwrap();
    let results = b.search_by_content("err", &SearchOptions::new()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node.id, live.id);
    assert!((results[0].score - 2.0).abs() < f32::EPSILON);
}

fn recent_nodes_orders_newest_first_and_excludes_archived(b: &dyn Backend) {
    b.create_node(Node::new(NodeType::Fact, "archived").with_tier(Tier::Archive)).unwrap();
    let first = b.create_node(Node::new(NodeType::Fact, "first")).unwrap();
    let second = b.create_node(Node::new(NodeType::Fact, "second")).unwrap();
    let recent = b.recent_nodes(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|n| n.tier != Tier::Archive));
    let ids: Vec<_> = recent.iter().map(|n| n.id.clone()).collect();
    assert!(ids.contains(&first.id) && ids.contains(&second.id));
}

fn get_connected_respects_direction_and_depth(b: &dyn Backend) {
    let a = b.create_node(Node::new(NodeType::Entity, "a")).unwrap();
    let c = b.create_node(Node::new(NodeType::Entity, "c")).unwrap();
    let d = b.create_node(Node::new(NodeType::Entity, "d")).unwrap();
    b.create_relation("relates to", &a.id, &c.id).unwrap();
    b.create_relation("relates to", &c.id, &d.id).unwrap();

    let outgoing = ConnectOptions::new().with_direction(Direction::Outgoing).with_max_depth(1);
    let from_a = b.get_connected(&a.id, &outgoing).unwrap();
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].0.id, c.id);

    let from_d = b.get_connected(&d.id, &outgoing).unwrap();
    assert!(from_d.is_empty());

    let deep = ConnectOptions::new().with_direction(Direction::Outgoing).with_max_depth(2);
    let from_a_deep = b.get_connected(&a.id, &deep).unwrap();
    assert_eq!(from_a_deep.len(), 2);
}

fn get_subgraph_is_closed_except_for_seed_touching_edges(b: &dyn Backend) {
    let seed = b.create_node(Node::new(NodeType::Entity, "seed")).unwrap();
    let inside = b.create_node(Node::new(NodeType::Entity, "inside")).unwrap();
    // Archived nodes are excluded from traversal, so this endpoint never
    // enters the expanded node set via `get_connected`, even though the
    // edge directly touches the seed.
    let archived = b.create_node(Node::new(NodeType::Entity, "archived").with_tier(Tier::Archive)).unwrap();
    b.create_relation("relates to", &seed.id, &inside.id).unwrap();
    let seed_edge = b.create_relation("relates to", &seed.id, &archived.id).unwrap();

    let (nodes, edges, _memberships) = b.get_subgraph(&[seed.id.clone()], 1).unwrap();
    let node_ids: Vec<_> = nodes.iter().map(|n| n.id.clone()).collect();
    assert!(node_ids.contains(&seed.id));
    assert!(node_ids.contains(&inside.id));
    assert!(!node_ids.contains(&archived.id));
    let edge_ids: Vec<_> = edges.iter().map(|e| e.id.clone()).collect();
    assert!(edge_ids.contains(&seed_edge.id));
    assert_eq!(edges.len(), 2);
}

fn create_relation_is_atomic_with_subject_object_roles(b: &dyn Backend) {
    let a = b.create_node(Node::new(NodeType::Entity, "a")).unwrap();
    let c = b.create_node(Node::new(NodeType::Entity, "c")).unwrap();
    let edge = b.create_relation("relates to", &a.id, &c.id).unwrap();
    assert_eq!(edge.edge_type, HyperedgeType::Relation);
    let members = b.get_members(&edge.id).unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m.node_id == a.id && m.role == Role::Subject));
    assert!(members.iter().any(|m| m.node_id == c.id && m.role == Role::Object));
}

fn evolution_log_is_append_only_and_filters_by_operation(b: &dyn Backend) {
    b.record_evolution(EvolutionEntry::new(EvolutionOperation::Create)).unwrap();
    b.record_evolution(EvolutionEntry::new(EvolutionOperation::Decay)).unwrap();
    b.record_evolution(EvolutionEntry::new(EvolutionOperation::Decay)).unwrap();
    let all = b.list_evolution(None, 10).unwrap();
    assert_eq!(all.len(), 3);
    let decays = b.list_evolution(Some(EvolutionOperation::Decay), 10).unwrap();
    assert_eq!(decays.len(), 2);
    assert!(decays.iter().all(|e| e.operation == EvolutionOperation::Decay));
}

fn find_preference_matches_key_scope_and_scope_value(b: &dyn Backend) {
    let node = Node::new(NodeType::Decision, "indent_style=tabs")
        .with_subtype("user_preference")
        .with_metadata(serde_json::json!({
            "key": "indent_style",
            "value": "tabs",
            "scope": "project",
            "scope_value": "crate-a",
        }));
    b.create_node(node).unwrap();

    let found = b.find_preference("indent_style", PreferenceScope::Project, Some("crate-a")).unwrap();
    assert!(found.is_some());

    let wrong_scope_value = b.find_preference("indent_style", PreferenceScope::Project, Some("crate-b")).unwrap();
    assert!(wrong_scope_value.is_none());

    let wrong_scope = b.find_preference("indent_style", PreferenceScope::Global, None).unwrap();
    assert!(wrong_scope.is_none());
}

fn stats_reflect_counts_by_tier_and_type(b: &dyn Backend) {
    b.create_node(Node::new(NodeType::Fact, "a")).unwrap();
    b.create_node(Node::new(NodeType::Fact, "b").with_tier(Tier::Longterm)).unwrap();
    b.create_node(Node::new(NodeType::Entity, "c")).unwrap();
    let stats = b.stats().unwrap();
    assert_eq!(stats.node_count, 3);
    assert_eq!(stats.nodes_by_tier.get("task"), Some(&2));
    assert_eq!(stats.nodes_by_tier.get("longterm"), Some(&1));
    assert_eq!(stats.nodes_by_type.get("fact"), Some(&2));
}

fn with_tx_rolls_back_every_write_on_error(b: &dyn Backend) {
    let before = b.count_nodes(&NodeFilter::new()).unwrap();
    let result = b.with_tx(&mut || {
        b.create_node(Node::new(NodeType::Entity, "doomed one"))?;
        b.create_node(Node::new(NodeType::Entity, "doomed two"))?;
        Err(hypergraph_memory::Error::InvalidInput("abort".to_string()))
    });
    assert!(result.is_err());
    let after = b.count_nodes(&NodeFilter::new()).unwrap();
    assert_eq!(before, after);
}

contract_test!(create_and_fetch_roundtrips);
contract_test!(get_missing_node_is_not_found);
contract_test!(update_preserves_created_at_and_bumps_updated_at);
contract_test!(update_missing_node_is_not_found);
contract_test!(delete_node_cascades_memberships);
contract_test!(delete_hyperedge_cascades_memberships);
contract_test!(increment_access_is_monotone);
contract_test!(list_nodes_filters_by_type_and_confidence);
contract_test!(count_nodes_matches_list_nodes_length);
contract_test!(search_by_content_excludes_archived_and_scores_by_occurrence);
contract_test!(recent_nodes_orders_newest_first_and_excludes_archived);
contract_test!(get_connected_respects_direction_and_depth);
contract_test!(get_subgraph_is_closed_except_for_seed_touching_edges);
contract_test!(create_relation_is_atomic_with_subject_object_roles);
contract_test!(evolution_log_is_append_only_and_filters_by_operation);
contract_test!(find_preference_matches_key_scope_and_scope_value);
contract_test!(stats_reflect_counts_by_tier_and_type);
contract_test!(with_tx_rolls_back_every_write_on_error);
