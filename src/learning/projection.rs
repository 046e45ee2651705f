//! Projection of the four learned-entity families onto hypergraph nodes.
//!
//! Every learned entity is stored as a plain [`Node`]; `content` carries the
//! principal text, `metadata` (and `provenance` for facts) carries the typed
//! fields, and `confidence` carries whichever field is that entity's salient
//! quality scalar (confidence for facts/preferences, `success_rate` for
//! patterns, `severity` for constraints). Keeping every family on the same
//! node table means search, eviction, and the evolution log all operate
//! through one code path instead of one per entity kind.

use crate::models::{
    LearnedConstraint, LearnedFact, LearnedPattern, LearningSignal, Node, NodeType, PatternType,
    PreferenceScope, PreferenceValue, SignalSource, UserPreference,
};
use serde_json::json;

pub const FACT_SUBTYPE: &str = "learned_fact";
pub const PATTERN_SUBTYPE: &str = "learned_pattern";
pub const PREFERENCE_SUBTYPE: &str = "user_preference";
pub const CONSTRAINT_SUBTYPE: &str = "learned_constraint";
pub const SIGNAL_SUBTYPE: &str = "learning_signal";

/// Projects a [`LearnedFact`] onto a [`Node`], preserving its node id if
/// already persisted.
#[must_use]
pub fn fact_to_node(fact: &LearnedFact) -> Node {
    let mut node = Node::new(NodeType::Fact, fact.content.clone())
        .with_subtype(FACT_SUBTYPE)
        .with_confidence(fact.confidence)
        .with_provenance(json!({
            "domain": fact.domain,
            "source": fact.source.as_str(),
            "success_count": fact.success_count,
            "failure_count": fact.failure_count,
            "last_validated": fact.last_validated,
        }));
    node.access_count = fact.access_count;
    node.last_accessed = fact.last_accessed;
    node.embedding = fact.embedding.clone();
    if let Some(id) = &fact.id {
        node.id = crate::models::NodeId::from_string(id.clone());
    }
    node
}

/// Recovers a [`LearnedFact`] from its projected [`Node`].
///
/// Malformed provenance fields fall back to their defaults rather than
/// failing the read, per the crate's decode-error policy for optional data.
#[must_use]
pub fn node_to_fact(node: &Node) -> LearnedFact {
    let domain = node.provenance.get("domain").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let source = node
        .provenance
        .get("source")
        .and_then(|v| v.as_str())
        .and_then(SignalSource::parse)
        .unwrap_or(SignalSource::Inferred);
    let mut fact = LearnedFact::new(node.content.clone(), domain, source, node.confidence);
    fact.id = Some(node.id.as_str().to_string());
    fact.success_count = node.provenance.get("success_count").and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;
    fact.failure_count = node.provenance.get("failure_count").and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;
    fact.access_count = node.access_count;
    fact.last_accessed = node.last_accessed;
    fact.last_validated = node
        .provenance
        .get("last_validated")
        .and_then(|v| serde_json::from_value(v.clone()).ok());
    fact.embedding = node.embedding.clone();
    fact
}

/// Projects a [`LearnedPattern`] onto a [`Node`].
#[must_use]
pub fn pattern_to_node(pattern: &LearnedPattern) -> Node {
    let mut node = Node::new(NodeType::Experience, pattern.name.clone())
        .with_subtype(PATTERN_SUBTYPE)
        .with_confidence(pattern.success_rate)
        .with_metadata(json!({
            "pattern_type": pattern.pattern_type.as_str(),
            "trigger": pattern.trigger,
            "template": pattern.template,
            "examples": pattern.examples,
            "domains": pattern.domains,
            "usage_count": pattern.usage_count,
            "last_used": pattern.last_used,
        }));
    if let Some(id) = &pattern.id {
        node.id = crate::models::NodeId::from_string(id.clone());
    }
    node
}

/// Recovers a [`LearnedPattern`] from its projected [`Node`].
#[must_use]
pub fn node_to_pattern(node: &Node) -> LearnedPattern {
    let pattern_type = node
        .metadata
        .get("pattern_type")
        .and_then(|v| v.as_str())
        .and_then(PatternType::parse)
        .unwrap_or(PatternType::Code);
    let trigger = node.metadata.get("trigger").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let template = node.metadata.get("template").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let mut pattern = LearnedPattern::new(node.content.clone(), pattern_type, trigger, template, node.confidence);
    pattern.id = Some(node.id.as_str().to_string());
    pattern.examples = node
        .metadata
        .get("examples")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    pattern.domains = node
        .metadata
        .get("domains")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    pattern.usage_count = node.metadata.get("usage_count").and_then(serde_json::Value::as_u64).unwrap_or(1) as u32;
    pattern.last_used = node.metadata.get("last_used").and_then(|v| serde_json::from_value(v.clone()).ok());
    pattern
}

/// Projects a [`UserPreference`] onto a [`Node`].
#[must_use]
pub fn preference_to_node(pref: &UserPreference) -> Node {
    let mut node = Node::new(NodeType::Decision, format!("{}={}", pref.key, pref.value))
        .with_subtype(PREFERENCE_SUBTYPE)
        .with_confidence(pref.confidence)
        .with_metadata(json!({
            "key": pref.key,
            "value": pref.value,
            "scope": pref.scope.as_str(),
            "scope_value": pref.scope_value,
            "source": pref.source.as_str(),
            "usage_count": pref.usage_count,
        }));
    if let Some(id) = &pref.id {
        node.id = crate::models::NodeId::from_string(id.clone());
    }
    node
}

/// Recovers a [`UserPreference`] from its projected [`Node`].
#[must_use]
pub fn node_to_preference(node: &Node) -> UserPreference {
    let key = node.metadata.get("key").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let value: PreferenceValue = node
        .metadata
        .get("value")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(PreferenceValue::Text(String::new()));
    let scope = node
        .metadata
        .get("scope")
        .and_then(|v| v.as_str())
        .and_then(PreferenceScope::parse)
        .unwrap_or(PreferenceScope::Global);
    let source = node
        .metadata
        .get("source")
        .and_then(|v| v.as_str())
        .and_then(SignalSource::parse)
        .unwrap_or(SignalSource::Inferred);
    let mut pref = UserPreference::new(key, value, scope, source, node.confidence);
    pref.id = Some(node.id.as_str().to_string());
    pref.scope_value = node.metadata.get("scope_value").and_then(|v| v.as_str()).map(String::from);
    pref.usage_count = node.metadata.get("usage_count").and_then(serde_json::Value::as_u64).unwrap_or(1) as u32;
    pref
}

/// Projects a [`LearnedConstraint`] onto a [`Node`].
#[must_use]
pub fn constraint_to_node(constraint: &LearnedConstraint) -> Node {
    let mut node = Node::new(NodeType::Experience, constraint.description.clone())
        .with_subtype(CONSTRAINT_SUBTYPE)
        .with_confidence(constraint.severity)
        .with_metadata(json!({
            "constraint_type": constraint.constraint_type.as_str(),
            "correction": constraint.correction,
            "trigger": constraint.trigger,
            "domain": constraint.domain,
            "source": constraint.source.as_str(),
            "violation_count": constraint.violation_count,
            "last_triggered": constraint.last_triggered,
        }));
    if let Some(id) = &constraint.id {
        node.id = crate::models::NodeId::from_string(id.clone());
    }
    node
}

/// Recovers a [`LearnedConstraint`] from its projected [`Node`].
#[must_use]
pub fn node_to_constraint(node: &Node) -> LearnedConstraint {
    use crate::models::ConstraintType;

    let constraint_type = node
        .metadata
        .get("constraint_type")
        .and_then(|v| v.as_str())
        .and_then(ConstraintType::parse)
        .unwrap_or(ConstraintType::Avoid);
    let domain = node.metadata.get("domain").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let source = node
        .metadata
        .get("source")
        .and_then(|v| v.as_str())
        .and_then(SignalSource::parse)
        .unwrap_or(SignalSource::Inferred);
    let mut constraint = LearnedConstraint::new(constraint_type, node.content.clone(), domain, node.confidence, source);
    constraint.id = Some(node.id.as_str().to_string());
    constraint.correction = node.metadata.get("correction").and_then(|v| v.as_str()).map(String::from);
    constraint.trigger = node.metadata.get("trigger").and_then(|v| v.as_str()).unwrap_or("").to_string();
    constraint.violation_count = node.metadata.get("violation_count").and_then(serde_json::Value::as_u64).unwrap_or(0) as u32;
    constraint.last_triggered = node.metadata.get("last_triggered").and_then(|v| serde_json::from_value(v.clone()).ok());
    constraint
}

/// Projects a [`LearningSignal`] onto an audit-trail [`Node`].
///
/// Signals are write-only audit records; nothing reads them back into a
/// `LearningSignal`.
#[must_use]
pub fn signal_to_node(signal: &LearningSignal) -> Node {
    Node::new(NodeType::Experience, signal.context.query.clone())
        .with_subtype(SIGNAL_SUBTYPE)
        .with_confidence(signal.confidence)
        .with_provenance(json!({
            "signal_type": signal.signal_type.as_str(),
            "session_id": signal.context.session_id,
            "task_id": signal.context.task_id,
            "domain": signal.domain,
        }))
        .with_metadata(serde_json::to_value(signal).unwrap_or(serde_json::Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConstraintType, SignalContext, SignalType};

    #[test]
    fn test_fact_roundtrip() {
        let fact = LearnedFact::new("Go uses if err != nil", "go", SignalSource::Explicit, 0.95);
        let node = fact_to_node(&fact);
        assert_eq!(node.node_type, NodeType::Fact);
        assert_eq!(node.subtype.as_deref(), Some(FACT_SUBTYPE));
        let back = node_to_fact(&node);
        assert_eq!(back.content, fact.content);
        assert_eq!(back.domain, fact.domain);
        assert_eq!(back.source, fact.source);
        assert!((back.confidence - fact.confidence).abs() < 1e-4);
    }

    #[test]
    fn test_pattern_roundtrip() {
        let mut pattern = LearnedPattern::new("Go Error Handling", PatternType::Code, "if err", "if err != nil {}", 0.9);
        pattern.usage_count = 2;
        pattern.examples.push("if err != nil { return err }".to_string());
        let node = pattern_to_node(&pattern);
        assert_eq!(node.node_type, NodeType::Experience);
        let back = node_to_pattern(&node);
        assert_eq!(back.name, pattern.name);
        assert_eq!(back.usage_count, 2);
        assert_eq!(back.examples.len(), 1);
    }

    #[test]
    fn test_preference_roundtrip() {
        let pref = UserPreference::new(
            "tabs_or_spaces",
            PreferenceValue::Text("spaces".to_string()),
            PreferenceScope::Domain,
            SignalSource::Explicit,
            0.8,
        )
        .with_scope_value("go");
        let node = preference_to_node(&pref);
        assert_eq!(node.node_type, NodeType::Decision);
        let back = node_to_preference(&node);
        assert_eq!(back.key, pref.key);
        assert_eq!(back.scope_value, pref.scope_value);
    }

    #[test]
    fn test_constraint_roundtrip() {
        let constraint = LearnedConstraint::new(ConstraintType::Avoid, "Avoid: panic(err)", "go", 0.3, SignalSource::Correction)
            .with_correction("return fmt.Errorf(...)");
        let node = constraint_to_node(&constraint);
        assert_eq!(node.node_type, NodeType::Experience);
        let back = node_to_constraint(&node);
        assert_eq!(back.description, constraint.description);
        assert_eq!(back.correction, constraint.correction);
        assert!((back.severity - constraint.severity).abs() < 1e-4);
    }

    #[test]
    fn test_signal_projection_is_audit_only() {
        let ctx = SignalContext {
            query: "fix the bug".to_string(),
            output: "panic!()".to_string(),
            ..Default::default()
        };
        let signal = LearningSignal::new(SignalType::Error, ctx, 0.3).with_domain("rust");
        let node = signal_to_node(&signal);
        assert_eq!(node.subtype.as_deref(), Some(SIGNAL_SUBTYPE));
        assert_eq!(node.content, "fix the bug");
    }
}
