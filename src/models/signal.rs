//! Transient envelope carrying an observation from the host agent to be
//! learned from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of observation a [`LearningSignal`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// The agent's output was accepted/worked.
    Success,
    /// The agent's output was corrected by the user.
    Correction,
    /// The agent's output was rejected outright.
    Rejection,
    /// The user expressed a standing preference.
    Preference,
    /// A reusable pattern was observed directly (not mined from output).
    Pattern,
    /// The agent's output produced an error.
    Error,
}

impl SignalType {
    /// Parses a signal type from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "correction" => Some(Self::Correction),
            "rejection" => Some(Self::Rejection),
            "preference" => Some(Self::Preference),
            "pattern" => Some(Self::Pattern),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Correction => "correction",
            Self::Rejection => "rejection",
            Self::Preference => "preference",
            Self::Pattern => "pattern",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The execution context a signal was observed in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalContext {
    /// Session identifier.
    pub session_id: Option<String>,
    /// Task identifier.
    pub task_id: Option<String>,
    /// The query/prompt that produced the output.
    pub query: String,
    /// The agent's output.
    pub output: String,
    /// The model that produced the output.
    pub model: Option<String>,
    /// The strategy/approach used.
    pub strategy: Option<String>,
    /// Wall-clock duration of the interaction, in milliseconds.
    pub duration_ms: Option<u64>,
    /// Tokens consumed by the interaction.
    pub tokens_used: Option<u64>,
}

/// Type-specific payload carried by a [`LearningSignal`].
///
/// Exactly one variant's fields are populated, matching `signal.signal_type`;
/// the extractor matches on `signal_type` and destructures the corresponding
/// variant, defaulting to an empty/inert value if the payload and type
/// disagree (malformed input is absorbed, not fatal, per the crate's
/// decode/encode error policy).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalMetadata {
    /// Correction details: `(original, corrected, severity)`.
    pub correction: Option<CorrectionDetails>,
    /// Preference details.
    pub preference: Option<PreferenceDetails>,
    /// Pattern details.
    pub pattern: Option<PatternDetails>,
    /// Error message (for `SignalType::Error`).
    pub error_message: Option<String>,
    /// Rejection reason (for `SignalType::Rejection`).
    pub rejection_reason: Option<String>,
    /// Free-form domain-specific extras.
    pub extra: serde_json::Value,
}

/// Payload for a correction signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionDetails {
    /// The original (incorrect) text.
    pub original: String,
    /// The corrected text.
    pub corrected: String,
    /// Severity in `[0, 1]` to assign the resulting constraint.
    pub severity: f32,
}

/// Payload for a preference signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceDetails {
    /// The preference key.
    pub key: String,
    /// The preference value, as opaque JSON.
    pub value: serde_json::Value,
    /// Scope the preference applies at.
    pub scope: super::PreferenceScope,
    /// Scope qualifier (domain name, project id, session id).
    pub scope_value: Option<String>,
    /// Whether the user stated this explicitly (vs. the agent inferring it).
    pub explicit: bool,
}

/// Payload for a pattern signal, or the pattern mined from a success signal's
/// output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetails {
    /// Human-readable pattern name.
    pub name: String,
    /// The category of pattern.
    pub pattern_type: super::PatternType,
    /// The trigger condition/keyword(s) for this pattern.
    pub trigger: String,
    /// A representative template/snippet.
    pub template: String,
    /// Example occurrences (capped at ingestion time).
    pub examples: Vec<String>,
    /// Domains this pattern applies to. Empty = universal.
    pub domains: Vec<String>,
}

/// A structured observation from the host agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSignal {
    /// The kind of observation.
    pub signal_type: SignalType,
    /// The execution context.
    pub context: SignalContext,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// When the signal was observed.
    pub timestamp: DateTime<Utc>,
    /// The domain this signal belongs to.
    pub domain: String,
    /// Type-specific payload.
    pub metadata: SignalMetadata,
}

impl LearningSignal {
    /// Creates a new signal with `now()` as its timestamp.
    #[must_use]
    pub fn new(signal_type: SignalType, context: SignalContext, confidence: f32) -> Self {
        Self {
            signal_type,
            context,
            confidence,
            timestamp: crate::now(),
            domain: String::new(),
            metadata: SignalMetadata::default(),
        }
    }

    /// Sets the domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the metadata payload.
    #[must_use]
    pub fn with_metadata(mut self, metadata: SignalMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_type_roundtrip() {
        for t in [
            SignalType::Success,
            SignalType::Correction,
            SignalType::Rejection,
            SignalType::Preference,
            SignalType::Pattern,
            SignalType::Error,
        ] {
            assert_eq!(SignalType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_signal_builder() {
        let ctx = SignalContext {
            query: "fix the bug".to_string(),
            output: "panic!()".to_string(),
            ..Default::default()
        };
        let signal = LearningSignal::new(SignalType::Error, ctx, 0.3).with_domain("rust");
        assert_eq!(signal.domain, "rust");
        assert!((signal.confidence - 0.3).abs() < f32::EPSILON);
    }
}
