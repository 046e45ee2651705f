//! Query filters for nodes, hyperedges, and graph traversal.

use super::{HyperedgeType, NodeType, Tier};

/// Multi-valued, conjunctive filter over the node table.
///
/// Empty arrays act as wildcards (no restriction on that dimension). All
/// non-empty fields compose as an AND.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// Restrict to one of these node types. Empty = unrestricted.
    pub types: Vec<NodeType>,
    /// Restrict to one of these subtypes. Empty = unrestricted.
    pub subtypes: Vec<String>,
    /// Restrict to one of these tiers. Empty = unrestricted.
    pub tiers: Vec<Tier>,
    /// Minimum confidence, inclusive.
    pub min_confidence: Option<f32>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Number of rows to skip before returning results.
    pub offset: Option<usize>,
}

impl NodeFilter {
    /// Creates an unrestricted filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given node type (additive).
    #[must_use]
    pub fn with_type(mut self, t: NodeType) -> Self {
        self.types.push(t);
        self
    }

    /// Restricts to the given subtype (additive).
    #[must_use]
    pub fn with_subtype(mut self, s: impl Into<String>) -> Self {
        self.subtypes.push(s.into());
        self
    }

    /// Restricts to the given tier (additive).
    #[must_use]
    pub fn with_tier(mut self, t: Tier) -> Self {
        self.tiers.push(t);
        self
    }

    /// Sets the minimum confidence.
    #[must_use]
    pub const fn with_min_confidence(mut self, c: f32) -> Self {
        self.min_confidence = Some(c);
        self
    }

    /// Sets the result limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the result offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns `true` if `node` satisfies every predicate in this filter.
    #[must_use]
    pub fn matches(&self, node: &super::Node) -> bool {
        if !self.types.is_empty() && !self.types.contains(&node.node_type) {
            return false;
        }
        if !self.subtypes.is_empty() {
            let matches_subtype = node
                .subtype
                .as_ref()
                .is_some_and(|s| self.subtypes.iter().any(|want| want == s));
            if !matches_subtype {
                return false;
            }
        }
        if !self.tiers.is_empty() && !self.tiers.contains(&node.tier) {
            return false;
        }
        if let Some(min) = self.min_confidence
            && node.confidence < min
        {
            return false;
        }
        true
    }
}

/// Multi-valued, conjunctive filter over the hyperedge table.
#[derive(Debug, Clone, Default)]
pub struct HyperedgeFilter {
    /// Restrict to one of these edge types. Empty = unrestricted.
    pub types: Vec<HyperedgeType>,
    /// Minimum weight, inclusive.
    pub min_weight: Option<f32>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
}

impl HyperedgeFilter {
    /// Creates an unrestricted filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given edge type (additive).
    #[must_use]
    pub fn with_type(mut self, t: HyperedgeType) -> Self {
        self.types.push(t);
        self
    }

    /// Sets the minimum weight.
    #[must_use]
    pub const fn with_min_weight(mut self, w: f32) -> Self {
        self.min_weight = Some(w);
        self
    }

    /// Returns `true` if `edge` satisfies every predicate in this filter.
    #[must_use]
    pub fn matches(&self, edge: &super::Hyperedge) -> bool {
        if !self.types.is_empty() && !self.types.contains(&edge.edge_type) {
            return false;
        }
        if let Some(min) = self.min_weight
            && edge.weight < min
        {
            return false;
        }
        true
    }
}

/// Direction of traversal relative to the seed node's role in each hyperedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow edges where the seed is the subject (the edge's "source" role).
    Outgoing,
    /// Follow edges where the seed is the object (the edge's "target" role).
    Incoming,
    /// Follow edges in either direction.
    #[default]
    Both,
}

/// Options controlling [`crate::storage::Backend::get_connected`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Which edge direction(s) to follow.
    pub direction: Direction,
    /// Maximum BFS depth, at least 1.
    pub max_depth: u32,
    /// Whitelist of edge types to follow. Empty = unrestricted.
    pub edge_types: Vec<HyperedgeType>,
    /// Whitelist of node types to include. Empty = unrestricted.
    pub node_types: Vec<NodeType>,
    /// Whitelist of tiers to include. Empty = unrestricted.
    pub tiers: Vec<Tier>,
    /// Stop early once this many results have been collected.
    pub max_results: Option<usize>,
    /// Include the connecting hyperedge alongside each result.
    pub include_edge: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Both,
            max_depth: 1,
            edge_types: Vec::new(),
            node_types: Vec::new(),
            tiers: Vec::new(),
            max_results: None,
            include_edge: false,
        }
    }
}

impl ConnectOptions {
    /// Creates default options: depth 1, both directions, unrestricted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the traversal direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the maximum depth (clamped to at least 1).
    #[must_use]
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Restricts to the given edge type (additive).
    #[must_use]
    pub fn with_edge_type(mut self, t: HyperedgeType) -> Self {
        self.edge_types.push(t);
        self
    }

    /// Sets the early-termination result cap.
    #[must_use]
    pub const fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Enables including the connecting hyperedge in each result.
    #[must_use]
    pub const fn with_include_edge(mut self, include: bool) -> Self {
        self.include_edge = include;
        self
    }
}
