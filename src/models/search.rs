//! Content and hybrid search option/result types.

use super::{Node, NodeType, Tier};

/// Options shared by content search and hybrid search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Restrict to one of these node types. Empty = unrestricted.
    pub types: Vec<NodeType>,
    /// Restrict to one of these tiers. Empty = unrestricted.
    pub tiers: Vec<Tier>,
    /// Restrict to one of these subtypes. Empty = unrestricted.
    pub subtypes: Vec<String>,
    /// Minimum confidence, inclusive.
    pub min_confidence: Option<f32>,
    /// Maximum number of results.
    pub limit: usize,
}

impl SearchOptions {
    /// Creates default options with a limit of 10.
    #[must_use]
    pub fn new() -> Self {
        Self {
            limit: 10,
            ..Self::default()
        }
    }

    /// Sets the result limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
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

    /// Sets the minimum confidence.
    #[must_use]
    pub const fn with_min_confidence(mut self, c: f32) -> Self {
        self.min_confidence = Some(c);
        self
    }

    /// Returns `true` if `node` satisfies every predicate (excluding
    /// archived-tier exclusion, which callers apply separately).
    #[must_use]
    pub fn matches(&self, node: &Node) -> bool {
        if !self.types.is_empty() && !self.types.contains(&node.node_type) {
            return false;
        }
        if !self.tiers.is_empty() && !self.tiers.contains(&node.tier) {
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
        if let Some(min) = self.min_confidence
            && node.confidence < min
        {
            return false;
        }
        true
    }
}

/// A single content or hybrid search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched node.
    pub node: Node,
    /// The relevance score: substring occurrence count for lexical search,
    /// fused RRF score for hybrid search.
    pub score: f32,
}

impl SearchResult {
    /// Creates a new search result.
    #[must_use]
    pub const fn new(node: Node, score: f32) -> Self {
        Self { node, score }
    }
}
