//! Node identity and attributes.

use super::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit identifier for a node, carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Allocates a fresh random node id.
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

impl Default for NodeId {
    fn default() -> Self {
        Self(String::new())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The ontological kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A named thing (person, file, concept, ...).
    Entity,
    /// A learned or asserted fact.
    Fact,
    /// A recorded experience (signal audit trail, learned pattern, constraint).
    Experience,
    /// A recorded decision (including projected user preferences).
    Decision,
    /// A code or text snippet.
    Snippet,
}

impl NodeType {
    /// Parses a node type from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "entity" => Some(Self::Entity),
            "fact" => Some(Self::Fact),
            "experience" => Some(Self::Experience),
            "decision" => Some(Self::Decision),
            "snippet" => Some(Self::Snippet),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Fact => "fact",
            Self::Experience => "experience",
            Self::Decision => "decision",
            Self::Snippet => "snippet",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the hypergraph: an entity, fact, experience, decision, or
/// snippet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier.
    pub id: NodeId,
    /// The ontological type.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Free-form subtype tag (e.g. `file`, `function`, `goal`, `learned_fact`).
    pub subtype: Option<String>,
    /// Textual payload. Required to be non-empty by [`Node::validate`].
    pub content: String,
    /// Opaque little-endian f32 embedding bytes.
    pub embedding: Option<Vec<u8>>,
    /// Lifecycle tier.
    pub tier: Tier,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Monotone non-decreasing access counter.
    pub access_count: u64,
    /// Timestamp of the most recent access, if any.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Creation timestamp. Immutable after insert.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp. Bumped on every mutation.
    pub updated_at: DateTime<Utc>,
    /// Opaque provenance blob (file/line/commit/source).
    pub provenance: Json,
    /// Opaque free-form metadata blob.
    pub metadata: Json,
}

impl Node {
    /// Creates a node with sensible defaults (empty id, task tier, full
    /// confidence, zeroed timestamps) for the given type and content.
    ///
    /// Callers typically pass this to [`crate::storage::Backend::create_node`],
    /// which fills in the id and timestamps on insert.
    #[must_use]
    pub fn new(node_type: NodeType, content: impl Into<String>) -> Self {
        Self {
            id: NodeId::default(),
            node_type,
            subtype: None,
            content: content.into(),
            embedding: None,
            tier: Tier::default(),
            confidence: 1.0,
            access_count: 0,
            last_accessed: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            provenance: Json::Null,
            metadata: Json::Null,
        }
    }

    /// Sets the subtype tag.
    #[must_use]
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// Sets the tier.
    #[must_use]
    pub const fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sets the metadata blob.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Json) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the provenance blob.
    #[must_use]
    pub fn with_provenance(mut self, provenance: Json) -> Self {
        self.provenance = provenance;
        self
    }

    /// Validates the invariants that `Node::content` must be non-empty and
    /// `confidence` must fall in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if either invariant is violated.
    pub fn validate(&self) -> crate::Result<()> {
        if self.content.is_empty() {
            return Err(crate::Error::InvalidInput(
                "node content must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(crate::Error::InvalidInput(format!(
                "node confidence {} out of range [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_roundtrip() {
        for t in [
            NodeType::Entity,
            NodeType::Fact,
            NodeType::Experience,
            NodeType::Decision,
            NodeType::Snippet,
        ] {
            assert_eq!(NodeType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_node_defaults() {
        let n = Node::new(NodeType::Fact, "hello");
        assert_eq!(n.tier, Tier::Task);
        assert!((n.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(n.access_count, 0);
    }

    #[test]
    fn test_node_validate_empty_content() {
        let n = Node::new(NodeType::Fact, "");
        assert!(n.validate().is_err());
    }

    #[test]
    fn test_node_validate_confidence_out_of_range() {
        let n = Node::new(NodeType::Fact, "x").with_confidence(1.5);
        assert!(n.validate().is_err());
    }

    #[test]
    fn test_node_id_unset() {
        assert!(NodeId::default().is_unset());
        assert!(!NodeId::new().is_unset());
    }
}
