//! Hyperedge identity and attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for a hyperedge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperedgeId(String);

impl HyperedgeId {
    /// Allocates a fresh random hyperedge id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing id string.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is the empty string (unset).
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for HyperedgeId {
    fn default() -> Self {
        Self(String::new())
    }
}

impl fmt::Display for HyperedgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HyperedgeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HyperedgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The relational kind of a hyperedge.
///
/// In addition to the base relational kinds, a family of reasoning-trace
/// variants supports decision-trace style workflows (spawned sub-goals,
/// considered/chosen/rejected options, implementation and production links,
/// and cross-informing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperedgeType {
    /// A generic relation between nodes.
    Relation,
    /// A whole-part composition.
    Composition,
    /// A causal link.
    Causation,
    /// A contextual grouping.
    Context,
    /// A decision spawning a sub-goal or sub-task.
    Spawns,
    /// A decision considering an option.
    Considers,
    /// A decision choosing an option.
    Chooses,
    /// A decision rejecting an option.
    Rejects,
    /// A decision implemented by an artifact.
    Implements,
    /// A decision producing an artifact.
    Produces,
    /// One node informing another.
    Informs,
}

impl HyperedgeType {
    /// Parses a hyperedge type from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "relation" => Some(Self::Relation),
            "composition" => Some(Self::Composition),
            "causation" => Some(Self::Causation),
            "context" => Some(Self::Context),
            "spawns" => Some(Self::Spawns),
            "considers" => Some(Self::Considers),
            "chooses" => Some(Self::Chooses),
            "rejects" => Some(Self::Rejects),
            "implements" => Some(Self::Implements),
            "produces" => Some(Self::Produces),
            "informs" => Some(Self::Informs),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relation => "relation",
            Self::Composition => "composition",
            Self::Causation => "causation",
            Self::Context => "context",
            Self::Spawns => "spawns",
            Self::Considers => "considers",
            Self::Chooses => "chooses",
            Self::Rejects => "rejects",
            Self::Implements => "implements",
            Self::Produces => "produces",
            Self::Informs => "informs",
        }
    }
}

impl fmt::Display for HyperedgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An n-ary hyperedge connecting any number of nodes via [`super::Membership`]
/// rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperedge {
    /// Unique identifier.
    pub id: HyperedgeId,
    /// The relational type.
    #[serde(rename = "type")]
    pub edge_type: HyperedgeType,
    /// Human-readable label.
    pub label: String,
    /// Non-negative weight, default `1.0`.
    pub weight: f32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Opaque free-form metadata blob.
    pub metadata: Json,
}

impl Hyperedge {
    /// Creates a hyperedge with default weight `1.0` and an unset id/timestamp,
    /// to be filled in on insert.
    #[must_use]
    pub fn new(edge_type: HyperedgeType, label: impl Into<String>) -> Self {
        Self {
            id: HyperedgeId::default(),
            edge_type,
            label: label.into(),
            weight: 1.0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            metadata: Json::Null,
        }
    }

    /// Sets the weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Sets the metadata blob.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Json) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validates that `weight` is non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if `weight` is negative.
    pub fn validate(&self) -> crate::Result<()> {
        if self.weight < 0.0 {
            return Err(crate::Error::InvalidInput(format!(
                "hyperedge weight {} must be >= 0",
                self.weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyperedge_type_roundtrip() {
        for t in [
            HyperedgeType::Relation,
            HyperedgeType::Composition,
            HyperedgeType::Causation,
            HyperedgeType::Context,
            HyperedgeType::Spawns,
            HyperedgeType::Considers,
            HyperedgeType::Chooses,
            HyperedgeType::Rejects,
            HyperedgeType::Implements,
            HyperedgeType::Produces,
            HyperedgeType::Informs,
        ] {
            assert_eq!(HyperedgeType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_hyperedge_default_weight() {
        let e = Hyperedge::new(HyperedgeType::Relation, "relates to");
        assert!((e.weight - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_hyperedge_validate_negative_weight() {
        let e = Hyperedge::new(HyperedgeType::Relation, "x").with_weight(-1.0);
        assert!(e.validate().is_err());
    }
}
