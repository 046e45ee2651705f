//! Hybrid (lexical + semantic) search via weighted Reciprocal Rank Fusion.
//!
//! Plain content search lives on [`crate::storage::Backend::search_by_content`];
//! this module combines that ranked list with a ranked list from an external
//! semantic index using RRF, so neither signal has to dominate through raw
//! score magnitude.
//!
//! # Algorithm
//!
//! ```text
//! score(n) = (1 - alpha) * sum(1 / (k + rank_kw(n)))
//!          +      alpha  * sum(1 / (k + rank_sem(n)))
//! ```
//!
//! `k` dampens the contribution of top ranks (60 is the standard constant);
//! `alpha` in `[0, 1]` weights semantic rank against keyword rank.

use crate::models::{Node, NodeId, SearchOptions, SearchResult};
use crate::storage::Backend;
use std::collections::HashMap;

/// Configuration for weighted RRF fusion.
#[derive(Debug, Clone)]
pub struct RrfConfig {
    /// The k constant for RRF scoring (default: 60).
    pub k: f32,
    /// Weight given to the semantic ranking, in `[0, 1]`. `0.0` is pure
    /// keyword search, `1.0` is pure semantic search.
    pub alpha: f32,
    /// Maximum number of fused results to return.
    pub limit: usize,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            k: 60.0,
            alpha: 0.5,
            limit: 10,
        }
    }
}

impl RrfConfig {
    /// Creates a default configuration with the given result limit.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Sets `k`.
    #[must_use]
    pub const fn with_k(mut self, k: f32) -> Self {
        self.k = k;
        self
    }

    /// Sets `alpha`, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }
}

/// A semantic retrieval collaborator: given a query embedding, returns
/// `(node id, similarity)` pairs ranked by descending similarity.
///
/// This is the seam between the hypergraph store and whatever vector index
/// (in-process brute force, an external ANN service) an embedding is scored
/// against; this crate does not implement an index itself.
pub trait SemanticIndex: Send + Sync {
    /// Returns up to `limit` nearest neighbors of `query_embedding`, ranked
    /// by descending similarity.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lookup fails.
    fn nearest(&self, query_embedding: &[f32], limit: usize) -> crate::Result<Vec<(NodeId, f32)>>;
}

/// Weighted Reciprocal Rank Fusion combiner.
#[derive(Debug, Clone, Default)]
pub struct RrfFusion {
    config: RrfConfig,
}

impl RrfFusion {
    /// Creates a fusion combiner with default configuration (`k=60`,
    /// `alpha=0.5`, `limit=10`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fusion combiner with the given configuration.
    #[must_use]
    pub const fn with_config(config: RrfConfig) -> Self {
        Self { config }
    }

    /// Fuses keyword search results (already ranked) with a ranked list of
    /// `(node id, similarity)` semantic hits, resolving each semantic hit to
    /// its node via `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving a semantic hit's node fails for a
    /// reason other than it having been deleted (a missing node is skipped).
    pub fn fuse(
        &self,
        backend: &dyn Backend,
        keyword_results: &[SearchResult],
        semantic_hits: &[(NodeId, f32)],
    ) -> crate::Result<Vec<SearchResult>> {
        let k = self.config.k;
        let alpha = self.config.alpha;
        let mut scores: HashMap<NodeId, f32> = HashMap::new();
        let mut nodes: HashMap<NodeId, Node> = HashMap::new();

        for (rank, result) in keyword_results.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let contribution = (1.0 - alpha) * (1.0 / (k + rank as f32 + 1.0));
            *scores.entry(result.node.id.clone()).or_insert(0.0) += contribution;
            nodes.entry(result.node.id.clone()).or_insert_with(|| result.node.clone());
        }

        for (rank, (node_id, _similarity)) in semantic_hits.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let contribution = alpha * (1.0 / (k + rank as f32 + 1.0));
            *scores.entry(node_id.clone()).or_insert(0.0) += contribution;
            if !nodes.contains_key(node_id) {
                match backend.get_node(node_id) {
                    Ok(node) => {
                        nodes.insert(node_id.clone(), node);
                    }
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => return Err(e),
                }
            }
        }

        let mut fused: Vec<SearchResult> = scores
            .into_iter()
            .filter_map(|(id, score)| nodes.remove(&id).map(|node| SearchResult::new(node, score)))
            .collect();
        fused.sort_unstable_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(self.config.limit);
        Ok(fused)
    }
}

/// Runs hybrid search: lexical content search via the backend plus semantic
/// search via `index`, fused with [`RrfFusion`].
///
/// # Errors
///
/// Returns an error if either the backend search or the semantic index
/// lookup fails.
pub fn hybrid_search(
    backend: &dyn Backend,
    index: &dyn SemanticIndex,
    query: &str,
    query_embedding: &[f32],
    opts: &SearchOptions,
    fusion: &RrfFusion,
) -> crate::Result<Vec<SearchResult>> {
    let keyword_results = backend.search_by_content(query, opts)?;
    let semantic_hits = index.nearest(query_embedding, opts.limit.max(fusion.config.limit))?;
    fusion.fuse(backend, &keyword_results, &semantic_hits)
}
