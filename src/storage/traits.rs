//! The `Backend` capability trait: the complete persistence operation
//! surface, with default-method traversal and convenience helpers built atop
//! a small set of required primitives.

use crate::Result;
use crate::models::{
    ConnectOptions, Direction, EvolutionEntry, EvolutionOperation, Hyperedge, HyperedgeFilter,
    HyperedgeId, HyperedgeType, Membership, Node, NodeFilter, NodeId, PreferenceScope, Role,
    SearchOptions, SearchResult,
};
use std::collections::HashMap;

/// Persistence capability for the hypergraph store.
///
/// Implementors use `&self` with interior mutability so the backend can be
/// shared via `Arc<dyn Backend>` across the engine, extractor, consolidator,
/// and applier. Two implementations are provided: [`crate::storage::memory::InMemoryBackend`]
/// (tests, ephemeral use) and [`crate::storage::sqlite::SqliteBackend`] (production).
/// Both satisfy identical semantics against the shared contract test suite.
///
/// # Implementor Notes
///
/// - `immediate_neighbors` is the one traversal primitive; `get_connected` and
///   `get_subgraph` are default methods built on top of it, so a new backend
///   only needs to implement the primitive to get correct (if not maximally
///   efficient) traversal for free.
/// - All single-entity reads return [`crate::Error::NotFound`] when the row is
///   absent; writes targeting a missing row return the same.
pub trait Backend: Send + Sync {
    // ------------------------------------------------------------------
    // Node CRUD
    // ------------------------------------------------------------------

    /// Inserts a node, allocating an id and stamping timestamps if unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the node fails validation or the write fails.
    fn create_node(&self, node: Node) -> Result<Node>;

    /// Retrieves a node by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such node exists.
    fn get_node(&self, id: &NodeId) -> Result<Node>;

    /// Updates a node, bumping `updated_at`. The id and `created_at` are
    /// preserved from the stored row regardless of what `node` carries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such node exists.
    fn update_node(&self, node: Node) -> Result<Node>;

    /// Deletes a node, cascading to its memberships.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such node exists.
    fn delete_node(&self, id: &NodeId) -> Result<()>;

    /// Lists nodes matching `filter`, ordered by `created_at` descending by
    /// default.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>>;

    /// Counts nodes matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count_nodes(&self, filter: &NodeFilter) -> Result<usize>;

    /// Atomically increments `access_count` by 1 and sets `last_accessed` to
    /// now.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such node exists.
    fn increment_access(&self, id: &NodeId) -> Result<()>;

    // ------------------------------------------------------------------
    // Hyperedge CRUD
    // ------------------------------------------------------------------

    /// Inserts a hyperedge, allocating an id and stamping `created_at` if
    /// unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge fails validation or the write fails.
    fn create_hyperedge(&self, edge: Hyperedge) -> Result<Hyperedge>;

    /// Retrieves a hyperedge by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such hyperedge exists.
    fn get_hyperedge(&self, id: &HyperedgeId) -> Result<Hyperedge>;

    /// Updates a hyperedge in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such hyperedge exists.
    fn update_hyperedge(&self, edge: Hyperedge) -> Result<Hyperedge>;

    /// Deletes a hyperedge, cascading to its memberships.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such hyperedge exists.
    fn delete_hyperedge(&self, id: &HyperedgeId) -> Result<()>;

    /// Lists hyperedges matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_hyperedges(&self, filter: &HyperedgeFilter) -> Result<Vec<Hyperedge>>;

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Adds a membership row. Both the hyperedge and node must already
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint is missing or the write fails.
    fn add_membership(&self, membership: Membership) -> Result<()>;

    /// Removes the membership identified by `(hyperedge_id, node_id, role)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such membership exists.
    fn remove_membership(&self, hyperedge_id: &HyperedgeId, node_id: &NodeId, role: Role) -> Result<()>;

    /// Returns every membership row belonging to `hyperedge_id`, ordered by
    /// `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_members(&self, hyperedge_id: &HyperedgeId) -> Result<Vec<Membership>>;

    /// Returns the nodes participating in `hyperedge_id`, in membership
    /// `position` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_member_nodes(&self, hyperedge_id: &HyperedgeId) -> Result<Vec<Node>>;

    /// Returns every hyperedge `node_id` participates in, under any role.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_node_hyperedges(&self, node_id: &NodeId) -> Result<Vec<Hyperedge>>;

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Returns nodes whose `content` contains `query` (case-insensitive),
    /// scored by occurrence count, filtered by `opts`, with archived nodes
    /// excluded. Ordered by `access_count` descending, then `updated_at`
    /// descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn search_by_content(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>>;

    /// Returns the most recently created non-archived nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn recent_nodes(&self, limit: usize) -> Result<Vec<Node>>;

    // ------------------------------------------------------------------
    // Traversal primitive
    // ------------------------------------------------------------------

    /// Returns the `(node, connecting hyperedge)` pairs immediately
    /// reachable from `node_id` in the given direction, excluding archived
    /// nodes. This is the one traversal primitive a backend must implement;
    /// [`Backend::get_connected`] and [`Backend::get_subgraph`] are default
    /// methods built on top of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn immediate_neighbors(&self, node_id: &NodeId, direction: Direction) -> Result<Vec<(Node, Hyperedge)>>;

    // ------------------------------------------------------------------
    // Evolution log
    // ------------------------------------------------------------------

    /// Appends an evolution-log entry, allocating an id and stamping
    /// `timestamp` if unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn record_evolution(&self, entry: EvolutionEntry) -> Result<EvolutionEntry>;

    /// Lists evolution-log entries, optionally filtered by operation, most
    /// recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_evolution(&self, operation: Option<EvolutionOperation>, limit: usize) -> Result<Vec<EvolutionEntry>>;

    // ------------------------------------------------------------------
    // Learning store: preference lookup
    // ------------------------------------------------------------------

    /// Finds the preference node keyed by `(key, scope, scope_value)`, if
    /// one exists.
    ///
    /// Added to the capability surface so the extractor can update an
    /// existing preference in place rather than falling back to inserting a
    /// duplicate on every signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_preference(&self, key: &str, scope: PreferenceScope, scope_value: Option<&str>) -> Result<Option<Node>>;

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Returns aggregate statistics about the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn stats(&self) -> Result<BackendStats>;

    /// Runs `f` inside a backend transaction: `f` returning `Ok` commits,
    /// `Err` rolls back. The in-memory backend has no real transaction
    /// boundary and simply runs `f` under its write lock.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns, or a commit failure.
    fn with_tx(&self, f: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        f()
    }

    /// Releases any resources (file handles, connections) held by the
    /// backend. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing resources fails.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    // ------------------------------------------------------------------
    // Default-method conveniences
    // ------------------------------------------------------------------

    /// Breadth-first expansion from `node_id` honoring `opts`.
    ///
    /// Seeds the visited set with `node_id`, walks a FIFO queue of
    /// `(id, depth)`, enumerating immediate connections via
    /// [`Backend::immediate_neighbors`] at each step, skipping already-visited
    /// ids, appending matches to the result with `depth = parent_depth + 1`,
    /// and enqueueing for further expansion while `depth < opts.max_depth`.
    ///
    /// # Errors
    ///
    /// Returns an error if any underlying query fails.
    fn get_connected(&self, node_id: &NodeId, opts: &ConnectOptions) -> Result<Vec<(Node, Option<Hyperedge>, u32)>> {
        use std::collections::VecDeque;

        let mut visited = std::collections::HashSet::new();
        visited.insert(node_id.clone());
        let mut queue = VecDeque::new();
        queue.push_back((node_id.clone(), 0u32));
        let mut results = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= opts.max_depth {
                continue;
            }
            let neighbors = self.immediate_neighbors(&current, opts.direction)?;
            for (node, edge) in neighbors {
                if visited.contains(&node.id) {
                    continue;
                }
                if !opts.edge_types.is_empty() && !opts.edge_types.contains(&edge.edge_type) {
                    continue;
                }
                if !opts.node_types.is_empty() && !opts.node_types.contains(&node.node_type) {
                    continue;
                }
                if !opts.tiers.is_empty() && !opts.tiers.contains(&node.tier) {
                    continue;
                }
                visited.insert(node.id.clone());
                let next_depth = depth + 1;
                let included_edge = if opts.include_edge { Some(edge) } else { None };
                results.push((node.clone(), included_edge, next_depth));
                if let Some(max) = opts.max_results
                    && results.len() >= max
                {
                    return Ok(results);
                }
                if next_depth < opts.max_depth {
                    queue.push_back((node.id, next_depth));
                }
            }
        }
        Ok(results)
    }

    /// Expands `seed_ids` by iterated unrestricted `get_connected` calls up
    /// to `depth`, then materializes every membership touching the expanded
    /// node set and the hyperedges they reference.
    ///
    /// The subgraph is closed: an edge is included only when every node it
    /// touches is present in the expanded set, except that an edge directly
    /// touching a seed id is always kept even if another of its endpoints
    /// falls outside the set.
    ///
    /// # Errors
    ///
    /// Returns an error if any underlying query fails.
    fn get_subgraph(&self, seed_ids: &[NodeId], depth: u32) -> Result<(Vec<Node>, Vec<Hyperedge>, Vec<Membership>)> {
        let mut node_set: HashMap<NodeId, Node> = HashMap::new();
        let seeds: std::collections::HashSet<NodeId> = seed_ids.iter().cloned().collect();

        for seed in seed_ids {
            let seed_node = self.get_node(seed)?;
            node_set.insert(seed_node.id.clone(), seed_node);
            let opts = ConnectOptions::new().with_max_depth(depth);
            for (node, _edge, _depth) in self.get_connected(seed, &opts)? {
                node_set.entry(node.id.clone()).or_insert(node);
            }
        }

        let mut edge_set: HashMap<HyperedgeId, Hyperedge> = HashMap::new();
        let mut membership_set: Vec<Membership> = Vec::new();
        let mut seen_membership = std::collections::HashSet::new();

        for node_id in node_set.keys() {
            for edge in self.get_node_hyperedges(node_id)? {
                let members = self.get_members(&edge.id)?;
                let all_present = members.iter().all(|m| node_set.contains_key(&m.node_id));
                let touches_seed = members.iter().any(|m| seeds.contains(&m.node_id));
                if !all_present && !touches_seed {
                    continue;
                }
                edge_set.entry(edge.id.clone()).or_insert(edge);
                for m in members {
                    let key = (m.hyperedge_id.clone(), m.node_id.clone(), m.role);
                    if seen_membership.insert(key) {
                        membership_set.push(m);
                    }
                }
            }
        }

        Ok((
            node_set.into_values().collect(),
            edge_set.into_values().collect(),
            membership_set,
        ))
    }

    /// Atomically creates a relation-typed hyperedge plus subject/object
    /// memberships at positions 0 and 1.
    ///
    /// # Errors
    ///
    /// Returns an error if either node is missing or the write fails.
    fn create_relation(&self, label: &str, subject_id: &NodeId, object_id: &NodeId) -> Result<Hyperedge> {
        let mut created: Option<Hyperedge> = None;
        self.with_tx(&mut || {
            let edge = self.create_hyperedge(Hyperedge::new(HyperedgeType::Relation, label))?;
            self.add_membership(Membership::new(edge.id.clone(), subject_id.clone(), Role::Subject, 0))?;
            self.add_membership(Membership::new(edge.id.clone(), object_id.clone(), Role::Object, 1))?;
            created = Some(edge);
            Ok(())
        })?;
        Ok(created.expect("with_tx ran the closure to completion"))
    }
}

/// Aggregate statistics about a [`Backend`]'s contents.
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    /// Total number of nodes.
    pub node_count: usize,
    /// Total number of hyperedges.
    pub hyperedge_count: usize,
    /// Total number of membership rows.
    pub membership_count: usize,
    /// Node counts keyed by tier name.
    pub nodes_by_tier: HashMap<String, usize>,
    /// Node counts keyed by node-type name.
    pub nodes_by_type: HashMap<String, usize>,
}

impl BackendStats {
    /// Creates empty stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_stats_default() {
        let stats = BackendStats::default();
        assert_eq!(stats.node_count, 0);
        assert!(stats.nodes_by_tier.is_empty());
    }
}
