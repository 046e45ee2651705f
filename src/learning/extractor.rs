//! Turns a transient [`LearningSignal`] into persisted facts, patterns,
//! preferences, and constraints.

use super::{patterns, projection};
use crate::config::EngineConfig;
use crate::models::{
    ConstraintType, LearnedConstraint, LearnedFact, LearnedPattern, LearningSignal, NodeFilter,
    NodeType, PatternDetails, PatternType, PreferenceScope, SignalSource, SignalType,
};
use crate::storage::Backend;

const FACT_SIMILARITY_THRESHOLD: f32 = 0.6;

/// Mines learned entities out of signals and writes them to the store.
///
/// Per-item failures are logged and skipped; [`Extractor::process_signal`]
/// never fails the caller's batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct Extractor;

impl Extractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Processes one signal: persists it for audit, then dispatches by type
    /// to produce or reinforce the corresponding learned entities.
    ///
    /// Always returns `Ok`; failures are logged and do not propagate, so a
    /// caller processing a batch of signals never has one bad signal abort
    /// the rest.
    pub fn process_signal(&self, backend: &dyn Backend, signal: &LearningSignal, config: &EngineConfig) -> crate::Result<()> {
        if signal.confidence < config.min_signal_confidence {
            return Ok(());
        }

        if let Err(e) = backend.create_node(projection::signal_to_node(signal)) {
            tracing::warn!(error = %e, "failed to persist signal audit node");
        }

        let outcome = match signal.signal_type {
            SignalType::Success => self.handle_success(backend, signal, config),
            SignalType::Correction => self.handle_correction(backend, signal),
            SignalType::Rejection => self.handle_rejection(backend, signal),
            SignalType::Preference => self.handle_preference(backend, signal),
            SignalType::Pattern => self.handle_pattern(backend, signal, config),
            SignalType::Error => self.handle_error(backend, signal),
        };
        if let Err(e) = outcome {
            tracing::warn!(error = %e, signal_type = %signal.signal_type, "failed to process signal");
        }
        Ok(())
    }

    fn handle_success(&self, backend: &dyn Backend, signal: &LearningSignal, config: &EngineConfig) -> crate::Result<()> {
        for detected in patterns::detect_all(&signal.context.output, config.max_pattern_examples) {
            self.reinforce_or_insert_pattern(backend, &detected, signal, config)?;
        }
        self.reinforce_or_insert_fact(
            backend,
            &format!("Successfully completed: {}", signal.context.query),
            &signal.domain,
            signal.confidence,
            SignalSource::Observation,
        )?;
        Ok(())
    }

    fn handle_correction(&self, backend: &dyn Backend, signal: &LearningSignal) -> crate::Result<()> {
        let Some(details) = &signal.metadata.correction else {
            return Ok(());
        };
        let constraint = LearnedConstraint::new(
            ConstraintType::Avoid,
            format!("Avoid: {}", details.original),
            signal.domain.clone(),
            details.severity,
            SignalSource::Correction,
        )
        .with_correction(details.corrected.clone());
        backend.create_node(projection::constraint_to_node(&constraint))?;
        Ok(())
    }

    fn handle_rejection(&self, backend: &dyn Backend, signal: &LearningSignal) -> crate::Result<()> {
        let reason = signal.metadata.rejection_reason.clone().unwrap_or_else(|| signal.context.output.clone());
        let constraint = LearnedConstraint::new(
            ConstraintType::Avoid,
            format!("Avoid: {reason}"),
            signal.domain.clone(),
            0.8,
            SignalSource::Observation,
        );
        backend.create_node(projection::constraint_to_node(&constraint))?;
        Ok(())
    }

    fn handle_preference(&self, backend: &dyn Backend, signal: &LearningSignal) -> crate::Result<()> {
        let Some(details) = &signal.metadata.preference else {
            return Ok(());
        };
        let source = if details.explicit { SignalSource::Explicit } else { SignalSource::Inferred };

        if let Some(existing) = backend.find_preference(&details.key, details.scope, details.scope_value.as_deref())? {
            let mut pref = projection::node_to_preference(&existing);
            pref.value = serde_json::from_value(details.value.clone()).unwrap_or(pref.value);
            pref.usage_count += 1;
            pref.confidence = pref.confidence.max(signal.confidence);
            pref.source = source;
            let mut node = projection::preference_to_node(&pref);
            node.id = existing.id;
            node.created_at = existing.created_at;
            backend.update_node(node)?;
            return Ok(());
        }

        let value = serde_json::from_value(details.value.clone()).unwrap_or(crate::models::PreferenceValue::Json(details.value.clone()));
        let mut pref = crate::models::UserPreference::new(details.key.clone(), value, details.scope, source, signal.confidence);
        if let Some(scope_value) = &details.scope_value {
            pref = pref.with_scope_value(scope_value.clone());
        }
        backend.create_node(projection::preference_to_node(&pref))?;
        Ok(())
    }

    fn handle_pattern(&self, backend: &dyn Backend, signal: &LearningSignal, config: &EngineConfig) -> crate::Result<()> {
        let Some(details) = &signal.metadata.pattern else {
            return Ok(());
        };
        self.reinforce_or_insert_named_pattern(backend, details, signal.confidence, config)
    }

    fn handle_error(&self, backend: &dyn Backend, signal: &LearningSignal) -> crate::Result<()> {
        let message = signal.metadata.error_message.clone().unwrap_or_else(|| "unknown error".to_string());
        let fact = LearnedFact::new(format!("Failed: {message}"), signal.domain.clone(), SignalSource::Observation, 0.3);
        backend.create_node(projection::fact_to_node(&fact))?;
        Ok(())
    }

    fn reinforce_or_insert_pattern(
        &self,
        backend: &dyn Backend,
        detected: &patterns::DetectedPattern,
        signal: &LearningSignal,
        config: &EngineConfig,
    ) -> crate::Result<()> {
        let details = PatternDetails {
            name: detected.name.clone(),
            pattern_type: detected.pattern_type,
            trigger: detected.trigger.clone(),
            template: detected.template.clone(),
            examples: detected.examples.clone(),
            domains: if signal.domain.is_empty() { Vec::new() } else { vec![signal.domain.clone()] },
        };
        self.reinforce_or_insert_named_pattern(backend, &details, signal.confidence, config)
    }

    fn reinforce_or_insert_named_pattern(
        &self,
        backend: &dyn Backend,
        details: &PatternDetails,
        confidence: f32,
        config: &EngineConfig,
    ) -> crate::Result<()> {
        let filter = NodeFilter::new().with_type(NodeType::Experience).with_subtype(projection::PATTERN_SUBTYPE);
        let target_fingerprint = patterns::fingerprint(&details.name, &details.template);
        let existing = backend.list_nodes(&filter)?.into_iter().find(|n| {
            let existing_template = n.metadata.get("template").and_then(|v| v.as_str()).unwrap_or("");
            patterns::fingerprint(&n.content, existing_template) == target_fingerprint
        });

        if let Some(node) = existing {
            let mut pattern = projection::node_to_pattern(&node);
            pattern.usage_count += 1;
            pattern.success_rate = (pattern.success_rate + confidence) / 2.0;
            pattern.last_used = Some(crate::now());
            for example in &details.examples {
                if !pattern.examples.contains(example) {
                    pattern.examples.push(example.clone());
                }
            }
            pattern.examples.truncate(config.max_pattern_examples.max(1));
            for domain in &details.domains {
                if !pattern.domains.contains(domain) {
                    pattern.domains.push(domain.clone());
                }
            }
            let mut updated = projection::pattern_to_node(&pattern);
            updated.id = node.id;
            updated.created_at = node.created_at;
            backend.update_node(updated)?;
            return Ok(());
        }

        let mut pattern = LearnedPattern::new(details.name.clone(), details.pattern_type, details.trigger.clone(), details.template.clone(), confidence);
        pattern.examples = details.examples.clone();
        pattern.examples.truncate(config.max_pattern_examples.max(1));
        pattern.domains.clone_from(&details.domains);
        backend.create_node(projection::pattern_to_node(&pattern))?;
        Ok(())
    }

    fn reinforce_or_insert_fact(
        &self,
        backend: &dyn Backend,
        content: &str,
        domain: &str,
        confidence: f32,
        source: SignalSource,
    ) -> crate::Result<()> {
        let filter = NodeFilter::new().with_type(NodeType::Fact).with_subtype(projection::FACT_SUBTYPE);
        let existing = backend.list_nodes(&filter)?.into_iter().find(|n| {
            let node_domain = n.provenance.get("domain").and_then(|v| v.as_str()).unwrap_or("");
            node_domain == domain && content_similarity(&n.content, content) >= FACT_SIMILARITY_THRESHOLD
        });

        if let Some(node) = existing {
            let mut fact = projection::node_to_fact(&node);
            fact.success_count += 1;
            fact.confidence = (fact.confidence + confidence) / 2.0;
            fact.last_validated = Some(crate::now());
            let mut updated = projection::fact_to_node(&fact);
            updated.id = node.id;
            updated.created_at = node.created_at;
            backend.update_node(updated)?;
            return Ok(());
        }

        let fact = LearnedFact::new(content, domain, source, confidence);
        backend.create_node(projection::fact_to_node(&fact))?;
        Ok(())
    }
}

/// Overlap-coefficient similarity between two texts: the fraction of the
/// shorter text's lowercase words also present in the longer text.
fn content_similarity(a: &str, b: &str) -> f32 {
    let words_a: std::collections::HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: std::collections::HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let smaller = words_a.len().min(words_b.len());
    let overlap = words_a.intersection(&words_b).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = overlap as f32 / smaller as f32;
    ratio
}
