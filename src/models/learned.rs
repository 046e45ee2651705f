//! The four projected learned-entity families: facts, patterns, preferences,
//! constraints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a learned entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Stated directly by the user.
    Explicit,
    /// Inferred by the agent from behavior.
    Inferred,
    /// Derived from a correction signal.
    Correction,
    /// Derived from observing repeated behavior.
    Observation,
}

impl SignalSource {
    /// Parses a source from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "explicit" => Some(Self::Explicit),
            "inferred" => Some(Self::Inferred),
            "correction" => Some(Self::Correction),
            "observation" => Some(Self::Observation),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Inferred => "inferred",
            Self::Correction => "correction",
            Self::Observation => "observation",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A learned or asserted fact.
#[derive(Debug, Clone)]
pub struct LearnedFact {
    /// Node id once projected, or `None` for a not-yet-inserted fact.
    pub id: Option<String>,
    /// The fact text.
    pub content: String,
    /// The domain this fact applies to.
    pub domain: String,
    /// Where this fact came from.
    pub source: SignalSource,
    /// Number of times this fact was reinforced by a success signal.
    pub success_count: u32,
    /// Number of times this fact was contradicted.
    pub failure_count: u32,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Access counter.
    pub access_count: u64,
    /// Last access timestamp.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Last time this fact's truth was reconfirmed.
    pub last_validated: Option<DateTime<Utc>>,
    /// Opaque embedding bytes, if available.
    pub embedding: Option<Vec<u8>>,
}

impl LearnedFact {
    /// Creates a new fact with default counters.
    #[must_use]
    pub fn new(content: impl Into<String>, domain: impl Into<String>, source: SignalSource, confidence: f32) -> Self {
        Self {
            id: None,
            content: content.into(),
            domain: domain.into(),
            source,
            success_count: 0,
            failure_count: 0,
            confidence,
            access_count: 0,
            last_accessed: None,
            last_validated: None,
            embedding: None,
        }
    }
}

/// The category of a [`LearnedPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// A code idiom (error handling, table-driven tests, ...).
    Code,
    /// A reasoning strategy.
    Reasoning,
    /// A structural/architectural pattern.
    Structural,
    /// A naming convention.
    Naming,
    /// A workflow/process pattern.
    Workflow,
}

impl PatternType {
    /// Parses a pattern type from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "code" => Some(Self::Code),
            "reasoning" => Some(Self::Reasoning),
            "structural" => Some(Self::Structural),
            "naming" => Some(Self::Naming),
            "workflow" => Some(Self::Workflow),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Reasoning => "reasoning",
            Self::Structural => "structural",
            Self::Naming => "naming",
            Self::Workflow => "workflow",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reusable pattern recognized across interactions.
#[derive(Debug, Clone)]
pub struct LearnedPattern {
    /// Node id once projected.
    pub id: Option<String>,
    /// Human-readable name.
    pub name: String,
    /// The category of pattern.
    pub pattern_type: PatternType,
    /// The trigger condition/keyword(s).
    pub trigger: String,
    /// A representative template/snippet.
    pub template: String,
    /// Example occurrences, capped at `max_examples`.
    pub examples: Vec<String>,
    /// Domains this pattern applies to. Empty = universal.
    pub domains: Vec<String>,
    /// Running success rate in `[0, 1]`.
    pub success_rate: f32,
    /// Number of times this pattern was observed/reinforced.
    pub usage_count: u32,
    /// Last time this pattern was observed.
    pub last_used: Option<DateTime<Utc>>,
}

impl LearnedPattern {
    /// Creates a new pattern with `usage_count = 1`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        pattern_type: PatternType,
        trigger: impl Into<String>,
        template: impl Into<String>,
        success_rate: f32,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            pattern_type,
            trigger: trigger.into(),
            template: template.into(),
            examples: Vec::new(),
            domains: Vec::new(),
            success_rate,
            usage_count: 1,
            last_used: Some(crate::now()),
        }
    }
}

/// The scope a [`UserPreference`] applies at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceScope {
    /// Applies everywhere.
    Global,
    /// Applies to a specific domain.
    Domain,
    /// Applies to a specific project.
    Project,
    /// Applies to a specific session only.
    Session,
}

impl PreferenceScope {
    /// Parses a scope from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "global" => Some(Self::Global),
            "domain" => Some(Self::Domain),
            "project" => Some(Self::Project),
            "session" => Some(Self::Session),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Domain => "domain",
            Self::Project => "project",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for PreferenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A free-form, user-supplied preference value.
///
/// Preference values are dynamically typed at the API boundary (numbers,
/// strings, booleans, small structured blobs); the core never attempts
/// structural typing, it just carries the tagged variant through to
/// persistence as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    /// A boolean value.
    Bool(bool),
    /// A numeric value.
    Number(f64),
    /// A string value.
    Text(String),
    /// An arbitrary structured blob.
    Json(serde_json::Value),
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// A standing user preference.
#[derive(Debug, Clone)]
pub struct UserPreference {
    /// Node id once projected.
    pub id: Option<String>,
    /// The preference key.
    pub key: String,
    /// The preference value.
    pub value: PreferenceValue,
    /// The scope this preference applies at.
    pub scope: PreferenceScope,
    /// Scope qualifier (domain name, project id, session id), if applicable.
    pub scope_value: Option<String>,
    /// Where this preference came from.
    pub source: SignalSource,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Number of times this preference was referenced/reinforced.
    pub usage_count: u32,
}

impl UserPreference {
    /// Creates a new preference with `usage_count = 1`.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: PreferenceValue,
        scope: PreferenceScope,
        source: SignalSource,
        confidence: f32,
    ) -> Self {
        Self {
            id: None,
            key: key.into(),
            value,
            scope,
            scope_value: None,
            source,
            confidence,
            usage_count: 1,
        }
    }

    /// Sets the scope qualifier.
    #[must_use]
    pub fn with_scope_value(mut self, scope_value: impl Into<String>) -> Self {
        self.scope_value = Some(scope_value.into());
        self
    }
}

/// A learned constraint on future behavior.
#[derive(Debug, Clone)]
pub struct LearnedConstraint {
    /// Node id once projected.
    pub id: Option<String>,
    /// The category of constraint.
    pub constraint_type: ConstraintType,
    /// Human-readable description.
    pub description: String,
    /// The corrected/preferred behavior, if derived from a correction.
    pub correction: Option<String>,
    /// The trigger condition for this constraint. Empty = always relevant.
    pub trigger: String,
    /// The domain this constraint applies to.
    pub domain: String,
    /// Severity in `[0, 1]`.
    pub severity: f32,
    /// Where this constraint came from.
    pub source: SignalSource,
    /// Number of times this constraint was violated.
    pub violation_count: u32,
    /// Last time this constraint was triggered/violated.
    pub last_triggered: Option<DateTime<Utc>>,
}

impl LearnedConstraint {
    /// Creates a new constraint with `violation_count = 0`.
    #[must_use]
    pub fn new(
        constraint_type: ConstraintType,
        description: impl Into<String>,
        domain: impl Into<String>,
        severity: f32,
        source: SignalSource,
    ) -> Self {
        Self {
            id: None,
            constraint_type,
            description: description.into(),
            correction: None,
            trigger: String::new(),
            domain: domain.into(),
            severity,
            source,
            violation_count: 0,
            last_triggered: None,
        }
    }

    /// Sets the correction text.
    #[must_use]
    pub fn with_correction(mut self, correction: impl Into<String>) -> Self {
        self.correction = Some(correction.into());
        self
    }

    /// Sets the trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }
}

/// The category of a [`LearnedConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// A behavior to avoid.
    Avoid,
    /// A behavior that is mandatory.
    Require,
    /// A behavior that is preferred but not mandatory.
    Prefer,
    /// A formatting rule.
    Format,
    /// A security rule.
    Security,
}

impl ConstraintType {
    /// Parses a constraint type from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "avoid" => Some(Self::Avoid),
            "require" => Some(Self::Require),
            "prefer" => Some(Self::Prefer),
            "format" => Some(Self::Format),
            "security" => Some(Self::Security),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avoid => "avoid",
            Self::Require => "require",
            Self::Prefer => "prefer",
            Self::Format => "format",
            Self::Security => "security",
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_source_roundtrip() {
        for s in [
            SignalSource::Explicit,
            SignalSource::Inferred,
            SignalSource::Correction,
            SignalSource::Observation,
        ] {
            assert_eq!(SignalSource::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_preference_scope_roundtrip() {
        for s in [
            PreferenceScope::Global,
            PreferenceScope::Domain,
            PreferenceScope::Project,
            PreferenceScope::Session,
        ] {
            assert_eq!(PreferenceScope::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_constraint_type_roundtrip() {
        for c in [
            ConstraintType::Avoid,
            ConstraintType::Require,
            ConstraintType::Prefer,
            ConstraintType::Format,
            ConstraintType::Security,
        ] {
            assert_eq!(ConstraintType::parse(c.as_str()), Some(c));
        }
    }

    #[test]
    fn test_preference_value_display() {
        assert_eq!(PreferenceValue::Bool(true).to_string(), "true");
        assert_eq!(PreferenceValue::Text("x".to_string()).to_string(), "x");
    }

    #[test]
    fn test_learned_pattern_default_usage_count() {
        let p = LearnedPattern::new("Go Error Handling", PatternType::Code, "if err", "if err != nil {}", 0.9);
        assert_eq!(p.usage_count, 1);
    }
}
