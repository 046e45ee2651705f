//! Periodic decay, pruning, and merging of learned entities.

use super::projection;
use crate::config::EngineConfig;
use crate::models::{NodeFilter, NodeType, SignalSource};
use crate::storage::Backend;
use crate::vector;
use chrono::{DateTime, Utc};

/// What happened to a single item during a consolidation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayOutcome {
    /// The item's quality scalar did not move enough to act on.
    Unchanged,
    /// The item was updated in place with a decayed quality scalar.
    Updated,
    /// The item fell below the prune floor and was deleted.
    Pruned,
}

/// Tally of what a consolidation run did to one entity family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilyReport {
    /// Number of items examined.
    pub inspected: usize,
    /// Number of items whose decayed scalar was written back.
    pub updated: usize,
    /// Number of items deleted for falling below the prune floor.
    pub pruned: usize,
}

/// Tally across all four entity families plus the merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Outcome of the fact decay pass.
    pub facts: FamilyReport,
    /// Outcome of the pattern decay pass.
    pub patterns: FamilyReport,
    /// Outcome of the constraint decay pass.
    pub constraints: FamilyReport,
    /// Number of facts absorbed by [`Consolidator::merge_similar_facts`], if
    /// run as part of this pass.
    pub merged: usize,
}

/// Runs decay, pruning, and fact-merging over the learning store.
#[derive(Debug, Default, Clone, Copy)]
pub struct Consolidator;

/// Computes the Ebbinghaus-style decayed quality scalar for an item last
/// touched at `last_accessed` (or never, if `None`) with access count `n`.
///
/// Returns `c` unchanged when `last_accessed` is `None`, matching the "if
/// `t_last` is zero, no decay" rule.
#[must_use]
pub fn decay(c: f32, last_accessed: Option<DateTime<Utc>>, n: u64, half_life_secs: f64, min_confidence: f32) -> f32 {
    let Some(t_last) = last_accessed else {
        return c;
    };
    let elapsed = (crate::now() - t_last).num_seconds().max(0) as f64;
    let stability = half_life_secs * (1.0 + (1.0 + n as f64).ln());
    let retention = (-elapsed / stability).exp();
    #[allow(clippy::cast_possible_truncation)]
    let decayed = (f64::from(c) * retention) as f32;
    decayed.max(min_confidence / 2.0)
}

/// Classifies a decayed scalar against the prune floor and its prior value.
#[must_use]
pub fn classify_decay(old: f32, decayed: f32, prune_floor: f32) -> DecayOutcome {
    if decayed < prune_floor {
        DecayOutcome::Pruned
    } else if (decayed - old).abs() > f32::EPSILON {
        DecayOutcome::Updated
    } else {
        DecayOutcome::Unchanged
    }
}

impl Consolidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs one consolidation pass over facts, patterns, and constraints, up
    /// to `config.max_items_per_run` items per family.
    pub fn consolidate_all(&self, backend: &dyn Backend, config: &EngineConfig) -> crate::Result<ConsolidationReport> {
        Ok(ConsolidationReport {
            facts: self.consolidate_facts(backend, config)?,
            patterns: self.consolidate_patterns(backend, config)?,
            constraints: self.consolidate_constraints(backend, config)?,
            merged: 0,
        })
    }

    fn consolidate_facts(&self, backend: &dyn Backend, config: &EngineConfig) -> crate::Result<FamilyReport> {
        let filter = NodeFilter::new()
            .with_type(NodeType::Fact)
            .with_subtype(projection::FACT_SUBTYPE)
            .with_limit(config.max_items_per_run);
        let mut report = FamilyReport::default();
        for node in backend.list_nodes(&filter)? {
            report.inspected += 1;
            let mut fact = projection::node_to_fact(&node);
            let decayed = decay(fact.confidence, fact.last_accessed, fact.access_count, config.half_life_secs, config.min_confidence);
            match classify_decay(fact.confidence, decayed, config.min_confidence) {
                DecayOutcome::Pruned => {
                    backend.delete_node(&node.id)?;
                    report.pruned += 1;
                }
                DecayOutcome::Updated => {
                    fact.confidence = decayed;
                    let mut updated = projection::fact_to_node(&fact);
                    updated.id = node.id;
                    updated.created_at = node.created_at;
                    backend.update_node(updated)?;
                    report.updated += 1;
                }
                DecayOutcome::Unchanged => {}
            }
        }
        Ok(report)
    }

    fn consolidate_patterns(&self, backend: &dyn Backend, config: &EngineConfig) -> crate::Result<FamilyReport> {
        let filter = NodeFilter::new()
            .with_type(NodeType::Experience)
            .with_subtype(projection::PATTERN_SUBTYPE)
            .with_limit(config.max_items_per_run);
        let mut report = FamilyReport::default();
        for node in backend.list_nodes(&filter)? {
            report.inspected += 1;
            let mut pattern = projection::node_to_pattern(&node);
            let decayed = decay(
                pattern.success_rate,
                pattern.last_used,
                u64::from(pattern.usage_count),
                config.half_life_secs,
                config.min_confidence,
            );
            match classify_decay(pattern.success_rate, decayed, config.min_confidence) {
                DecayOutcome::Pruned => {
                    backend.delete_node(&node.id)?;
                    report.pruned += 1;
                }
                DecayOutcome::Updated => {
                    pattern.success_rate = decayed;
                    let mut updated = projection::pattern_to_node(&pattern);
                    updated.id = node.id;
                    updated.created_at = node.created_at;
                    backend.update_node(updated)?;
                    report.updated += 1;
                }
                DecayOutcome::Unchanged => {}
            }
        }
        Ok(report)
    }

    fn consolidate_constraints(&self, backend: &dyn Backend, config: &EngineConfig) -> crate::Result<FamilyReport> {
        let filter = NodeFilter::new()
            .with_type(NodeType::Experience)
            .with_subtype(projection::CONSTRAINT_SUBTYPE)
            .with_limit(config.max_items_per_run);
        let mut report = FamilyReport::default();
        for node in backend.list_nodes(&filter)? {
            report.inspected += 1;
            if matches!(
                node.provenance.get("source").and_then(|v| v.as_str()).and_then(SignalSource::parse),
                Some(SignalSource::Explicit)
            ) {
                continue;
            }
            let mut constraint = projection::node_to_constraint(&node);
            let decayed = decay(
                constraint.severity,
                constraint.last_triggered,
                u64::from(constraint.violation_count),
                config.half_life_secs,
                config.min_confidence,
            );
            if decayed < config.min_confidence / 2.0 {
                backend.delete_node(&node.id)?;
                report.pruned += 1;
            } else {
                let drop_ratio = if constraint.severity > 0.0 {
                    (constraint.severity - decayed) / constraint.severity
                } else {
                    0.0
                };
                if drop_ratio > 0.1 {
                    constraint.severity = decayed;
                    let mut updated = projection::constraint_to_node(&constraint);
                    updated.id = node.id;
                    updated.created_at = node.created_at;
                    backend.update_node(updated)?;
                    report.updated += 1;
                }
            }
        }
        Ok(report)
    }

    /// Pairs-compares every fact in `domain`, merging the second into the
    /// first whenever their content similarity exceeds
    /// `config.merge_similarity_threshold`.
    ///
    /// Similarity is embedding cosine when both facts carry an embedding,
    /// otherwise the same word-overlap heuristic used by reinforce-or-insert.
    pub fn merge_similar_facts(&self, backend: &dyn Backend, domain: &str, config: &EngineConfig) -> crate::Result<usize> {
        let filter = NodeFilter::new().with_type(NodeType::Fact).with_subtype(projection::FACT_SUBTYPE);
        let nodes: Vec<_> = backend
            .list_nodes(&filter)?
            .into_iter()
            .filter(|n| n.provenance.get("domain").and_then(|v| v.as_str()) == Some(domain))
            .collect();

        let mut facts: Vec<_> = nodes.iter().map(projection::node_to_fact).collect();
        let mut absorbed = vec![false; facts.len()];
        let mut merged_count = 0;

        for i in 0..facts.len() {
            if absorbed[i] {
                continue;
            }
            for j in (i + 1)..facts.len() {
                if absorbed[j] {
                    continue;
                }
                let sim = fact_similarity(&facts[i], &facts[j]);
                if sim <= config.merge_similarity_threshold {
                    continue;
                }
                facts[i].success_count += facts[j].success_count;
                facts[i].failure_count += facts[j].failure_count;
                facts[i].confidence = (facts[i].confidence + facts[j].confidence) / 2.0;
                facts[i].access_count += facts[j].access_count;
                facts[i].last_validated = Some(crate::now());
                absorbed[j] = true;
                merged_count += 1;
            }
        }

        for (idx, fact) in facts.iter().enumerate() {
            let Some(id) = &fact.id else { continue };
            if absorbed[idx] {
                backend.delete_node(&crate::models::NodeId::from_string(id.clone()))?;
            }
        }
        for (idx, fact) in facts.iter().enumerate() {
            if absorbed[idx] {
                continue;
            }
            let original = &nodes[idx];
            let mut updated = projection::fact_to_node(fact);
            updated.id = original.id.clone();
            updated.created_at = original.created_at;
            backend.update_node(updated)?;
        }

        Ok(merged_count)
    }
}

fn fact_similarity(a: &crate::models::LearnedFact, b: &crate::models::LearnedFact) -> f32 {
    if let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) {
        return vector::similarity(&vector::from_bytes(ea), &vector::from_bytes(eb));
    }
    word_overlap(&a.content, &b.content)
}

fn word_overlap(a: &str, b: &str) -> f32 {
    let words_a: std::collections::HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: std::collections::HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let smaller = words_a.len().min(words_b.len());
    #[allow(clippy::cast_precision_loss)]
    let ratio = words_a.intersection(&words_b).count() as f32 / smaller as f32;
    ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LearnedFact;
    use crate::storage::memory::InMemoryBackend;
    use chrono::Duration;

    #[test]
    fn test_decay_no_last_accessed_is_unchanged() {
        let c = decay(0.8, None, 0, 1000.0, 0.2);
        assert!((c - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decay_recent_access_barely_decays() {
        let now = crate::now();
        let c = decay(0.8, Some(now), 5, 7.0 * 24.0 * 3600.0, 0.2);
        assert!(c > 0.79);
    }

    #[test]
    fn test_decay_floors_at_half_min_confidence() {
        let long_ago = crate::now() - Duration::days(3650);
        let c = decay(0.9, Some(long_ago), 0, 3600.0, 0.2);
        assert!((c - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_prune_removes_decayed_fact() {
        let backend = InMemoryBackend::new();
        let config = EngineConfig::default();
        let long_ago = crate::now() - Duration::days(3650);
        let mut fact = LearnedFact::new("stale fact", "go", SignalSource::Observation, 0.9);
        fact.last_accessed = Some(long_ago);
        backend.create_node(projection::fact_to_node(&fact)).unwrap();

        let report = Consolidator::new().consolidate_facts(&backend, &config).unwrap();
        assert_eq!(report.pruned, 1);
        assert_eq!(backend.stats().unwrap().node_count, 0);
    }

    #[test]
    fn test_merge_similar_facts_combines_counts() {
        let backend = InMemoryBackend::new();
        let config = EngineConfig::default();
        let mut a = LearnedFact::new("uses context for cancellation", "go", SignalSource::Observation, 0.8);
        a.success_count = 2;
        let mut b = LearnedFact::new("uses context for cancellation properly", "go", SignalSource::Observation, 0.6);
        b.success_count = 1;
        backend.create_node(projection::fact_to_node(&a)).unwrap();
        backend.create_node(projection::fact_to_node(&b)).unwrap();

        let merged = Consolidator::new().merge_similar_facts(&backend, "go", &config).unwrap();
        assert_eq!(merged, 1);
        assert_eq!(backend.stats().unwrap().node_count, 1);
    }

    #[test]
    fn test_explicit_constraint_is_exempt_from_decay() {
        let backend = InMemoryBackend::new();
        let config = EngineConfig::default();
        let long_ago = crate::now() - Duration::days(3650);
        let mut constraint = crate::models::LearnedConstraint::new(
            crate::models::ConstraintType::Avoid,
            "Avoid: panics",
            "go",
            0.9,
            SignalSource::Explicit,
        );
        constraint.last_triggered = Some(long_ago);
        backend.create_node(projection::constraint_to_node(&constraint)).unwrap();

        let report = Consolidator::new().consolidate_constraints(&backend, &config).unwrap();
        assert_eq!(report.pruned, 0);
        assert_eq!(report.updated, 0);
    }
}
