//! Map-backed in-memory implementation of [`Backend`], for tests and
//! ephemeral use.

use super::{Backend, BackendStats};
use crate::models::{
    Direction, EvolutionEntry, EvolutionOperation, Hyperedge, HyperedgeFilter, HyperedgeId,
    Membership, Node, NodeFilter, NodeId, PreferenceScope, Role, SearchOptions, SearchResult,
};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    hyperedges: HashMap<HyperedgeId, Hyperedge>,
    memberships: Vec<Membership>,
    evolution: Vec<EvolutionEntry>,
    next_evolution_id: i64,
}

/// A many-readers/single-writer in-memory [`Backend`] backed by
/// `RwLock`-guarded hash maps.
///
/// Intended for tests and short-lived agent sessions that don't need
/// durability; see [`crate::storage::sqlite::SqliteBackend`] for the
/// production-grade implementation.
pub struct InMemoryBackend {
    inner: RwLock<Inner>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InMemoryBackend {
    fn create_node(&self, mut node: Node) -> Result<Node> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "create_node".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        if node.id.is_unset() {
            node.id = NodeId::new();
        }
        let now = crate::now();
        if node.created_at == chrono::DateTime::<chrono::Utc>::UNIX_EPOCH {
            node.created_at = now;
        }
        if node.updated_at == chrono::DateTime::<chrono::Utc>::UNIX_EPOCH {
            node.updated_at = now;
        }
        if node.confidence == 0.0 {
            node.confidence = 1.0;
        }
        node.validate()?;
        inner.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    fn get_node(&self, id: &NodeId) -> Result<Node> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "get_node".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        inner
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("node", id.to_string()))
    }

    fn update_node(&self, mut node: Node) -> Result<Node> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "update_node".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let existing = inner
            .nodes
            .get(&node.id)
            .cloned()
            .ok_or_else(|| Error::not_found("node", node.id.to_string()))?;
        node.created_at = existing.created_at;
        node.updated_at = crate::now();
        node.validate()?;
        inner.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    fn delete_node(&self, id: &NodeId) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "delete_node".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        if inner.nodes.remove(id).is_none() {
            return Err(Error::not_found("node", id.to_string()));
        }
        inner.memberships.retain(|m| &m.node_id != id);
        Ok(())
    }

    fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "list_nodes".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let mut matched: Vec<Node> = inner.nodes.values().filter(|n| filter.matches(n)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(offset) = filter.offset {
            matched = matched.into_iter().skip(offset).collect();
        }
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn count_nodes(&self, filter: &NodeFilter) -> Result<usize> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "count_nodes".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        Ok(inner.nodes.values().filter(|n| filter.matches(n)).count())
    }

    fn increment_access(&self, id: &NodeId) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "increment_access".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| Error::not_found("node", id.to_string()))?;
        node.access_count += 1;
        node.last_accessed = Some(crate::now());
        Ok(())
    }

    fn create_hyperedge(&self, mut edge: Hyperedge) -> Result<Hyperedge> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "create_hyperedge".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        if edge.id.is_unset() {
            edge.id = HyperedgeId::new();
        }
        if edge.created_at == chrono::DateTime::<chrono::Utc>::UNIX_EPOCH {
            edge.created_at = crate::now();
        }
        edge.validate()?;
        inner.hyperedges.insert(edge.id.clone(), edge.clone());
        Ok(edge)
    }

    fn get_hyperedge(&self, id: &HyperedgeId) -> Result<Hyperedge> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "get_hyperedge".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        inner
            .hyperedges
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("hyperedge", id.to_string()))
    }

    fn update_hyperedge(&self, mut edge: Hyperedge) -> Result<Hyperedge> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "update_hyperedge".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let existing = inner
            .hyperedges
            .get(&edge.id)
            .cloned()
            .ok_or_else(|| Error::not_found("hyperedge", edge.id.to_string()))?;
        edge.created_at = existing.created_at;
        edge.validate()?;
        inner.hyperedges.insert(edge.id.clone(), edge.clone());
        Ok(edge)
    }

    fn delete_hyperedge(&self, id: &HyperedgeId) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "delete_hyperedge".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        if inner.hyperedges.remove(id).is_none() {
            return Err(Error::not_found("hyperedge", id.to_string()));
        }
        inner.memberships.retain(|m| &m.hyperedge_id != id);
        Ok(())
    }

    fn list_hyperedges(&self, filter: &HyperedgeFilter) -> Result<Vec<Hyperedge>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "list_hyperedges".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let mut matched: Vec<Hyperedge> = inner.hyperedges.values().filter(|e| filter.matches(e)).cloned().collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn add_membership(&self, membership: Membership) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "add_membership".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        if !inner.hyperedges.contains_key(&membership.hyperedge_id) {
            return Err(Error::not_found("hyperedge", membership.hyperedge_id.to_string()));
        }
        if !inner.nodes.contains_key(&membership.node_id) {
            return Err(Error::not_found("node", membership.node_id.to_string()));
        }
        inner.memberships.push(membership);
        Ok(())
    }

    fn remove_membership(&self, hyperedge_id: &HyperedgeId, node_id: &NodeId, role: Role) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "remove_membership".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let before = inner.memberships.len();
        inner
            .memberships
            .retain(|m| !(&m.hyperedge_id == hyperedge_id && &m.node_id == node_id && m.role == role));
        if inner.memberships.len() == before {
            return Err(Error::not_found("membership", format!("{hyperedge_id}/{node_id}/{role}")));
        }
        Ok(())
    }

    fn get_members(&self, hyperedge_id: &HyperedgeId) -> Result<Vec<Membership>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "get_members".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let mut members: Vec<Membership> = inner
            .memberships
            .iter()
            .filter(|m| &m.hyperedge_id == hyperedge_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.position);
        Ok(members)
    }

    fn get_member_nodes(&self, hyperedge_id: &HyperedgeId) -> Result<Vec<Node>> {
        let members = self.get_members(hyperedge_id)?;
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "get_member_nodes".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        Ok(members.into_iter().filter_map(|m| inner.nodes.get(&m.node_id).cloned()).collect())
    }

    fn get_node_hyperedges(&self, node_id: &NodeId) -> Result<Vec<Hyperedge>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "get_node_hyperedges".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let ids: std::collections::HashSet<&HyperedgeId> = inner
            .memberships
            .iter()
            .filter(|m| &m.node_id == node_id)
            .map(|m| &m.hyperedge_id)
            .collect();
        Ok(ids.into_iter().filter_map(|id| inner.hyperedges.get(id).cloned()).collect())
    }

    fn search_by_content(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "search_by_content".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let needle = query.to_lowercase();
        let mut results: Vec<SearchResult> = inner
            .nodes
            .values()
            .filter(|n| !n.tier.is_archived())
            .filter(|n| opts.matches(n))
            .filter_map(|n| {
                let count = if needle.is_empty() {
                    0
                } else {
                    n.content.to_lowercase().matches(&needle).count()
                };
                (count > 0).then(|| SearchResult::new(n.clone(), count as f32))
            })
            .collect();
        results.sort_by(|a, b| {
            b.node
                .access_count
                .cmp(&a.node.access_count)
                .then_with(|| b.node.updated_at.cmp(&a.node.updated_at))
        });
        if opts.limit > 0 {
            results.truncate(opts.limit);
        }
        Ok(results)
    }

    fn recent_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "recent_nodes".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let mut nodes: Vec<Node> = inner.nodes.values().filter(|n| !n.tier.is_archived()).cloned().collect();
        nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        nodes.truncate(limit);
        Ok(nodes)
    }

    fn immediate_neighbors(&self, node_id: &NodeId, direction: Direction) -> Result<Vec<(Node, Hyperedge)>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "immediate_neighbors".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let mut out = Vec::new();
        for edge in inner.hyperedges.values() {
            let members: Vec<&Membership> = inner
                .memberships
                .iter()
                .filter(|m| &m.hyperedge_id == &edge.id)
                .collect();
            let is_subject_here = members
                .iter()
                .any(|m| &m.node_id == node_id && m.role == Role::Subject);
            let is_object_here = members.iter().any(|m| &m.node_id == node_id && m.role == Role::Object);
            if !is_subject_here && !is_object_here {
                continue;
            }
            for m in &members {
                if &m.node_id == node_id {
                    continue;
                }
                let reachable = match direction {
                    Direction::Outgoing => is_subject_here && m.role == Role::Object,
                    Direction::Incoming => is_object_here && m.role == Role::Subject,
                    Direction::Both => true,
                };
                if !reachable {
                    continue;
                }
                if let Some(node) = inner.nodes.get(&m.node_id)
                    && !node.tier.is_archived()
                {
                    out.push((node.clone(), edge.clone()));
                }
            }
        }
        Ok(out)
    }

    fn record_evolution(&self, mut entry: EvolutionEntry) -> Result<EvolutionEntry> {
        let mut inner = self.inner.write().map_err(|_| Error::OperationFailed {
            operation: "record_evolution".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        inner.next_evolution_id += 1;
        entry.id = Some(inner.next_evolution_id);
        inner.evolution.push(entry.clone());
        Ok(entry)
    }

    fn list_evolution(&self, operation: Option<EvolutionOperation>, limit: usize) -> Result<Vec<EvolutionEntry>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "list_evolution".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let mut entries: Vec<EvolutionEntry> = inner
            .evolution
            .iter()
            .filter(|e| operation.is_none_or(|op| e.operation == op))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    fn find_preference(&self, key: &str, scope: PreferenceScope, scope_value: Option<&str>) -> Result<Option<Node>> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "find_preference".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        for node in inner.nodes.values() {
            if node.subtype.as_deref() != Some("user_preference") {
                continue;
            }
            let Some(meta_key) = node.metadata.get("key").and_then(|v| v.as_str()) else {
                continue;
            };
            if meta_key != key {
                continue;
            }
            let meta_scope = node
                .metadata
                .get("scope")
                .and_then(|v| v.as_str())
                .and_then(PreferenceScope::parse);
            if meta_scope != Some(scope) {
                continue;
            }
            let meta_scope_value = node.metadata.get("scope_value").and_then(|v| v.as_str());
            if meta_scope_value != scope_value {
                continue;
            }
            return Ok(Some(node.clone()));
        }
        Ok(None)
    }

    fn stats(&self) -> Result<BackendStats> {
        let inner = self.inner.read().map_err(|_| Error::OperationFailed {
            operation: "stats".to_string(),
            cause: "lock poisoned".to_string(),
        })?;
        let mut stats = BackendStats::new();
        stats.node_count = inner.nodes.len();
        stats.hyperedge_count = inner.hyperedges.len();
        stats.membership_count = inner.memberships.len();
        for node in inner.nodes.values() {
            *stats.nodes_by_tier.entry(node.tier.as_str().to_string()).or_insert(0) += 1;
            *stats.nodes_by_type.entry(node.node_type.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    fn with_tx(&self, f: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        // The in-memory backend has no distinct transaction log; every write
        // already takes the single write lock, so running `f` inline gives
        // the same atomicity a single-statement SQL transaction would.
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, NodeType};

    #[test]
    fn test_create_and_get_node_allocates_id() {
        let backend = InMemoryBackend::new();
        let created = backend.create_node(Node::new(NodeType::Fact, "hello")).unwrap();
        assert!(!created.id.is_unset());
        let fetched = backend.get_node(&created.id).unwrap();
        assert_eq!(fetched.content, "hello");
    }

    #[test]
    fn test_get_missing_node_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.get_node(&NodeId::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_preserves_created_at() {
        let backend = InMemoryBackend::new();
        let created = backend.create_node(Node::new(NodeType::Fact, "x")).unwrap();
        let mut updated = created.clone();
        updated.content = "y".to_string();
        let result = backend.update_node(updated).unwrap();
        assert_eq!(result.created_at, created.created_at);
        assert_eq!(result.content, "y");
    }

    #[test]
    fn test_delete_node_cascades_memberships() {
        let backend = InMemoryBackend::new();
        let a = backend.create_node(Node::new(NodeType::Entity, "a")).unwrap();
        let b = backend.create_node(Node::new(NodeType::Entity, "b")).unwrap();
        let edge = backend.create_relation("relates to", &a.id, &b.id).unwrap();
        backend.delete_node(&a.id).unwrap();
        assert!(backend.get_members(&edge.id).unwrap().iter().all(|m| m.node_id != a.id));
    }

    #[test]
    fn test_increment_access_is_monotone() {
        let backend = InMemoryBackend::new();
        let node = backend.create_node(Node::new(NodeType::Fact, "x")).unwrap();
        backend.increment_access(&node.id).unwrap();
        backend.increment_access(&node.id).unwrap();
        let fetched = backend.get_node(&node.id).unwrap();
        assert_eq!(fetched.access_count, 2);
        assert!(fetched.last_accessed.is_some());
    }

    #[test]
    fn test_search_by_content_excludes_archived() {
        let backend = InMemoryBackend::new();
        backend
            .create_node(Node::new(NodeType::Fact, "Go uses if err != nil").with_tier(crate::models::Tier::Archive))
            .unwrap();
        backend.create_node(Node::new(NodeType::Fact, "Go uses if err != nil")).unwrap();
        let results = backend.search_by_content("if err", &SearchOptions::new()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_get_connected_depth() {
        let backend = InMemoryBackend::new();
        let a = backend.create_node(Node::new(NodeType::Entity, "a")).unwrap();
        let b = backend.create_node(Node::new(NodeType::Entity, "b")).unwrap();
        let c = backend.create_node(Node::new(NodeType::Entity, "c")).unwrap();
        let d = backend.create_node(Node::new(NodeType::Entity, "d")).unwrap();
        backend.create_relation("relates to", &a.id, &b.id).unwrap();
        backend.create_relation("relates to", &b.id, &c.id).unwrap();
        backend.create_relation("relates to", &a.id, &d.id).unwrap();

        let opts_depth1 = crate::models::ConnectOptions::new().with_direction(Direction::Both).with_max_depth(1);
        let depth1 = backend.get_connected(&a.id, &opts_depth1).unwrap();
        let mut ids: Vec<_> = depth1.iter().map(|(n, _, _)| n.id.clone()).collect();
        ids.sort_by_key(|i| i.to_string());
        let mut expected = vec![b.id.clone(), d.id.clone()];
        expected.sort_by_key(|i| i.to_string());
        assert_eq!(ids, expected);

        let opts_depth2 = crate::models::ConnectOptions::new().with_direction(Direction::Both).with_max_depth(2);
        let depth2 = backend.get_connected(&a.id, &opts_depth2).unwrap();
        assert_eq!(depth2.len(), 3);
        let c_entry = depth2.iter().find(|(n, _, _)| n.id == c.id).unwrap();
        assert_eq!(c_entry.2, 2);
    }

    #[test]
    fn test_find_preference_by_scope() {
        let backend = InMemoryBackend::new();
        let node = Node::new(NodeType::Decision, "indent_style=tabs")
            .with_subtype("user_preference")
            .with_metadata(serde_json::json!({
                "key": "indent_style",
                "value": "tabs",
                "scope": "global",
            }));
        backend.create_node(node).unwrap();
        let found = backend.find_preference("indent_style", PreferenceScope::Global, None).unwrap();
        assert!(found.is_some());
        let missing = backend.find_preference("indent_style", PreferenceScope::Domain, None).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_stats_counts_by_tier() {
        let backend = InMemoryBackend::new();
        backend.create_node(Node::new(NodeType::Fact, "x")).unwrap();
        backend.create_node(Node::new(NodeType::Fact, "y")).unwrap();
        let stats = backend.stats().unwrap();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.nodes_by_tier.get("task"), Some(&2));
    }
}
