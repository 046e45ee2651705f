//! Selects learned facts, patterns, preferences, and constraints relevant to
//! a query and renders them into tagged context strings.

use super::projection;
use crate::config::EngineConfig;
use crate::models::{
    LearnedConstraint, LearnedFact, LearnedPattern, NodeFilter, NodeType, PreferenceScope,
    SearchOptions, UserPreference,
};
use crate::storage::Backend;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The result of one `apply` call: the selected learned entities plus
/// rendered, token-budgeted context strings.
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    /// Facts selected for the query, boosted and capped per the domain rule.
    pub facts: Vec<LearnedFact>,
    /// Patterns selected by domain and trigger overlap.
    pub patterns: Vec<LearnedPattern>,
    /// Preferences selected via the project/domain/global scope cascade.
    pub preferences: Vec<UserPreference>,
    /// Constraints selected by domain and trigger relevance.
    pub constraints: Vec<LearnedConstraint>,
    /// Rendered, token-budgeted context strings, in render order.
    pub context_additions: Vec<String>,
    /// Arithmetic mean of every returned item's quality scalar.
    pub total_confidence: f32,
}

/// Selects and renders learned context for a query.
#[derive(Debug, Default, Clone, Copy)]
pub struct Applier;

impl Applier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the full selection pipeline and renders the result.
    pub fn apply(
        &self,
        backend: &Arc<dyn Backend>,
        query: &str,
        domain: &str,
        project_path: Option<&str>,
        config: &EngineConfig,
    ) -> crate::Result<ApplyResult> {
        let constraints = self.select_constraints(backend, domain, query, config)?;
        let preferences = self.select_preferences(backend, domain, project_path, config)?;
        let facts = self.select_facts(backend, query, domain, config)?;
        let patterns = self.select_patterns(backend, domain, query, config)?;

        let context_additions = render_context(&constraints, &preferences, &facts, &patterns, config.context_max_tokens);

        let scalars: Vec<f32> = constraints
            .iter()
            .map(|c| c.severity)
            .chain(preferences.iter().map(|p| p.confidence))
            .chain(facts.iter().map(|f| f.confidence))
            .chain(patterns.iter().map(|p| p.success_rate))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let total_confidence = if scalars.is_empty() { 0.0 } else { scalars.iter().sum::<f32>() / scalars.len() as f32 };

        Ok(ApplyResult {
            facts,
            patterns,
            preferences,
            constraints,
            context_additions,
            total_confidence,
        })
    }

    fn select_facts(&self, backend: &Arc<dyn Backend>, query: &str, domain: &str, config: &EngineConfig) -> crate::Result<Vec<LearnedFact>> {
        let opts = SearchOptions::new()
            .with_type(NodeType::Fact)
            .with_subtype(projection::FACT_SUBTYPE)
            .with_limit(config.max_facts * 2);
        let mut facts: Vec<LearnedFact> = backend
            .search_by_content(query, &opts)?
            .into_iter()
            .map(|r| projection::node_to_fact(&r.node))
            .filter(|f| f.confidence >= config.min_confidence)
            .collect();

        for fact in &mut facts {
            if fact.domain == domain {
                fact.confidence = (fact.confidence * 1.2).min(1.0);
            }
        }
        facts.truncate(config.max_facts);

        let ids: Vec<crate::models::NodeId> = facts.iter().filter_map(|f| f.id.clone()).map(crate::models::NodeId::from_string).collect();
        if !ids.is_empty() {
            let backend = Arc::clone(backend);
            std::thread::spawn(move || refresh_access_counts(backend.as_ref(), ids));
        }
        Ok(facts)
    }

    fn select_patterns(&self, backend: &Arc<dyn Backend>, domain: &str, query: &str, config: &EngineConfig) -> crate::Result<Vec<LearnedPattern>> {
        let filter = NodeFilter::new().with_type(NodeType::Experience).with_subtype(projection::PATTERN_SUBTYPE);
        let tokens = query_tokens(query);

        let mut patterns: Vec<LearnedPattern> = backend
            .list_nodes(&filter)?
            .into_iter()
            .map(|n| projection::node_to_pattern(&n))
            .filter(|p| p.success_rate >= config.min_confidence)
            .filter(|p| p.domains.is_empty() || p.domains.iter().any(|d| d == domain))
            .filter(|p| trigger_overlaps(&p.trigger, &tokens))
            .collect();
        patterns.truncate(config.max_patterns);
        Ok(patterns)
    }

    fn select_preferences(
        &self,
        backend: &Arc<dyn Backend>,
        domain: &str,
        project_path: Option<&str>,
        config: &EngineConfig,
    ) -> crate::Result<Vec<UserPreference>> {
        let mut seen_keys = std::collections::HashSet::new();
        let mut selected = Vec::new();

        let mut scopes: Vec<(PreferenceScope, Option<&str>)> = Vec::new();
        if let Some(path) = project_path {
            scopes.push((PreferenceScope::Project, Some(path)));
        }
        scopes.push((PreferenceScope::Domain, Some(domain)));
        scopes.push((PreferenceScope::Global, None));

        let filter = NodeFilter::new().with_type(NodeType::Decision).with_subtype(projection::PREFERENCE_SUBTYPE);
        let all: Vec<UserPreference> = backend.list_nodes(&filter)?.into_iter().map(|n| projection::node_to_preference(&n)).collect();

        for (scope, scope_value) in scopes {
            for pref in &all {
                if pref.scope != scope {
                    continue;
                }
                if let Some(value) = scope_value {
                    if pref.scope_value.as_deref() != Some(value) {
                        continue;
                    }
                } else if pref.scope_value.is_some() {
                    continue;
                }
                if pref.confidence < config.min_confidence {
                    continue;
                }
                if !seen_keys.insert(pref.key.clone()) {
                    continue;
                }
                selected.push(pref.clone());
            }
        }
        Ok(selected)
    }

    fn select_constraints(&self, backend: &Arc<dyn Backend>, domain: &str, query: &str, config: &EngineConfig) -> crate::Result<Vec<LearnedConstraint>> {
        let filter = NodeFilter::new().with_type(NodeType::Experience).with_subtype(projection::CONSTRAINT_SUBTYPE);
        let tokens = query_tokens(query);

        let mut constraints: Vec<LearnedConstraint> = backend
            .list_nodes(&filter)?
            .into_iter()
            .map(|n| projection::node_to_constraint(&n))
            .filter(|c| c.domain == domain)
            .filter(|c| c.severity >= config.min_confidence)
            .filter(|c| c.trigger.is_empty() || trigger_overlaps(&c.trigger, &tokens))
            .collect();
        constraints.truncate(config.max_constraints);
        Ok(constraints)
    }
}

/// Bumps access counts for selected facts off the caller's path. Tolerant of
/// both storage errors and its own deadline: once the 1-second budget is
/// spent, remaining updates are dropped rather than delaying further.
fn refresh_access_counts(backend: &dyn Backend, ids: Vec<crate::models::NodeId>) {
    let deadline = Instant::now() + Duration::from_secs(1);
    for node_id in ids {
        if Instant::now() >= deadline {
            break;
        }
        if let Err(e) = backend.increment_access(&node_id) {
            tracing::warn!(error = %e, "failed to bump fact access count");
        }
    }
}

fn query_tokens(query: &str) -> std::collections::HashSet<String> {
    query.split_whitespace().map(str::to_lowercase).filter(|w| w.len() >= 3).collect()
}

fn trigger_overlaps(trigger: &str, tokens: &std::collections::HashSet<String>) -> bool {
    if trigger.is_empty() {
        return true;
    }
    trigger.split_whitespace().map(str::to_lowercase).any(|w| tokens.contains(&w))
}

fn render_context(
    constraints: &[LearnedConstraint],
    preferences: &[UserPreference],
    facts: &[LearnedFact],
    patterns: &[LearnedPattern],
    context_max_tokens: usize,
) -> Vec<String> {
    let mut rendered = Vec::new();
    for c in constraints {
        rendered.push(render_constraint(c));
    }
    for p in preferences {
        rendered.push(format!("[PREFERENCE] {}: {}", p.key, p.value));
    }
    for f in facts {
        rendered.push(format!("[FACT:{}] {}", f.domain, f.content));
    }
    for p in patterns {
        rendered.push(format!("[PATTERN:{}] {} - {}", p.pattern_type, p.name, p.trigger));
    }

    let mut budgeted = Vec::new();
    let mut used_tokens = 0usize;
    for item in rendered {
        let estimated = item.len() / 4;
        if used_tokens + estimated > context_max_tokens {
            break;
        }
        used_tokens += estimated;
        budgeted.push(item);
    }
    budgeted
}

fn render_constraint(c: &LearnedConstraint) -> String {
    use crate::models::ConstraintType;
    let tag = match c.constraint_type {
        ConstraintType::Avoid => "AVOID",
        ConstraintType::Require => "REQUIRED",
        ConstraintType::Prefer => "PREFER",
        ConstraintType::Format => "FORMAT",
        ConstraintType::Security => "SECURITY",
    };
    format!("[{tag}] {}", c.description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConstraintType, PatternType, SignalSource};
    use crate::storage::memory::InMemoryBackend;

    #[test]
    fn test_facts_boosted_when_domain_matches() {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());
        let config = EngineConfig::default();
        let fact = LearnedFact::new("uses contexts for timeouts", "go", SignalSource::Observation, 0.7);
        backend.create_node(projection::fact_to_node(&fact)).unwrap();

        let result = Applier::new().apply(&backend, "contexts", "go", None, &config).unwrap();
        assert_eq!(result.facts.len(), 1);
        assert!(result.facts[0].confidence > 0.7);
    }

    #[test]
    fn test_constraint_renders_with_avoid_tag() {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());
        let config = EngineConfig::default();
        let constraint = LearnedConstraint::new(ConstraintType::Avoid, "Avoid: panic(err)", "go", 0.9, SignalSource::Correction);
        backend.create_node(projection::constraint_to_node(&constraint)).unwrap();

        let result = Applier::new().apply(&backend, "panic handling", "go", None, &config).unwrap();
        assert_eq!(result.constraints.len(), 1);
        assert!(result.context_additions[0].starts_with("[AVOID]"));
    }

    #[test]
    fn test_preference_scope_cascade_prefers_project() {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());
        let config = EngineConfig::default();
        let global = UserPreference::new("indent", crate::models::PreferenceValue::Text("tabs".into()), PreferenceScope::Global, SignalSource::Explicit, 0.9);
        let project = UserPreference::new("indent", crate::models::PreferenceValue::Text("spaces".into()), PreferenceScope::Project, SignalSource::Explicit, 0.9)
            .with_scope_value("/repo");
        backend.create_node(projection::preference_to_node(&global)).unwrap();
        backend.create_node(projection::preference_to_node(&project)).unwrap();

        let result = Applier::new().apply(&backend, "q", "go", Some("/repo"), &config).unwrap();
        assert_eq!(result.preferences.len(), 1);
        assert_eq!(result.preferences[0].value.to_string(), "spaces");
    }

    #[test]
    fn test_pattern_requires_trigger_overlap() {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());
        let config = EngineConfig::default();
        let pattern = LearnedPattern::new("Go Error Handling", PatternType::Code, "error handling idiom", "if err != nil {}", 0.9);
        backend.create_node(projection::pattern_to_node(&pattern)).unwrap();

        let no_match = Applier::new().apply(&backend, "unrelated query", "go", None, &config).unwrap();
        assert!(no_match.patterns.is_empty());

        let matched = Applier::new().apply(&backend, "how do I do error handling here", "go", None, &config).unwrap();
        assert_eq!(matched.patterns.len(), 1);
    }
}
