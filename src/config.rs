//! In-process configuration values for the [`crate::Engine`].
//!
//! `EngineConfig` holds typed knobs only; there is no file discovery, env-var
//! precedence chain, or CLI flag parsing here, the same division of concerns
//! the teacher draws between its config *values* and config *loading*.

use serde::{Deserialize, Serialize};

/// Tunable thresholds and caps for the learning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Signals below this confidence are dropped by the extractor.
    pub min_signal_confidence: f32,
    /// Interval, in seconds, between automatic consolidation runs.
    pub consolidation_interval_secs: u64,
    /// Maximum items processed per entity family per consolidation run.
    pub max_items_per_run: usize,
    /// Wall-clock deadline, in seconds, for a single `consolidate_all` run.
    pub consolidation_timeout_secs: u64,
    /// Ebbinghaus half-life, in seconds, used by the decay formula.
    pub half_life_secs: f64,
    /// Confidence floor below which an item is eligible for pruning.
    pub min_confidence: f32,
    /// Similarity threshold above which two facts are merged.
    pub merge_similarity_threshold: f32,
    /// Maximum facts returned by a single `apply` call.
    pub max_facts: usize,
    /// Maximum patterns returned by a single `apply` call.
    pub max_patterns: usize,
    /// Maximum constraints returned by a single `apply` call.
    pub max_constraints: usize,
    /// Token budget for rendered context in `apply`/`enhance_prompt`.
    pub context_max_tokens: usize,
    /// Maximum examples retained per learned pattern.
    pub max_pattern_examples: usize,
    /// RRF blending coefficient, in `[0, 1]`.
    pub rrf_alpha: f32,
    /// RRF smoothing constant.
    pub rrf_k: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_signal_confidence: 0.3,
            consolidation_interval_secs: 3600,
            max_items_per_run: 500,
            consolidation_timeout_secs: 300,
            half_life_secs: 7.0 * 24.0 * 3600.0,
            min_confidence: 0.2,
            merge_similarity_threshold: 0.9,
            max_facts: 5,
            max_patterns: 3,
            max_constraints: 5,
            context_max_tokens: 2000,
            max_pattern_examples: 5,
            rrf_alpha: 0.5,
            rrf_k: 60.0,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with every field at its default value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
