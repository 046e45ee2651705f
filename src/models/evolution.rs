//! Append-only audit log of lifecycle transitions.

use super::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// The kind of lifecycle transition an [`EvolutionEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionOperation {
    /// A node (or set of nodes) was created.
    Create,
    /// A consolidation pass touched the affected nodes.
    Consolidate,
    /// One or more nodes were promoted to a later tier.
    Promote,
    /// One or more nodes' confidence decayed.
    Decay,
    /// One or more nodes were pruned (deleted by the consolidator).
    Prune,
    /// One or more nodes were archived.
    Archive,
}

impl EvolutionOperation {
    /// Parses an operation from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(Self::Create),
            "consolidate" => Some(Self::Consolidate),
            "promote" => Some(Self::Promote),
            "decay" => Some(Self::Decay),
            "prune" => Some(Self::Prune),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Consolidate => "consolidate",
            Self::Promote => "promote",
            Self::Decay => "decay",
            Self::Prune => "prune",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for EvolutionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single append-only evolution-log row.
///
/// Evolution entries are never mutated after insert; the log is the audit
/// trail for lifecycle transitions (creation, consolidation, promotion,
/// decay, pruning, archival).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionEntry {
    /// Autoincrement id, assigned by the backend on insert.
    pub id: Option<i64>,
    /// When the transition was recorded.
    pub timestamp: DateTime<Utc>,
    /// The kind of transition.
    pub operation: EvolutionOperation,
    /// Node ids affected by this transition, if applicable.
    pub affected_nodes: Vec<NodeId>,
    /// The tier the affected nodes moved from, if applicable.
    pub from_tier: Option<super::Tier>,
    /// The tier the affected nodes moved to, if applicable.
    pub to_tier: Option<super::Tier>,
    /// Free-text explanation of why the transition occurred.
    pub reasoning: Option<String>,
    /// Opaque free-form metadata blob.
    pub metadata: Json,
}

impl EvolutionEntry {
    /// Creates a new evolution entry with an unset id and `now()` timestamp.
    #[must_use]
    pub fn new(operation: EvolutionOperation) -> Self {
        Self {
            id: None,
            timestamp: crate::now(),
            operation,
            affected_nodes: Vec::new(),
            from_tier: None,
            to_tier: None,
            reasoning: None,
            metadata: Json::Null,
        }
    }

    /// Sets the affected node ids.
    #[must_use]
    pub fn with_affected_nodes(mut self, ids: Vec<NodeId>) -> Self {
        self.affected_nodes = ids;
        self
    }

    /// Sets the from/to tier pair.
    #[must_use]
    pub const fn with_tiers(mut self, from: Option<super::Tier>, to: Option<super::Tier>) -> Self {
        self.from_tier = from;
        self.to_tier = to;
        self
    }

    /// Sets the free-text reasoning.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_roundtrip() {
        for op in [
            EvolutionOperation::Create,
            EvolutionOperation::Consolidate,
            EvolutionOperation::Promote,
            EvolutionOperation::Decay,
            EvolutionOperation::Prune,
            EvolutionOperation::Archive,
        ] {
            assert_eq!(EvolutionOperation::parse(op.as_str()), Some(op));
        }
    }

    #[test]
    fn test_new_entry_has_no_id() {
        let e = EvolutionEntry::new(EvolutionOperation::Create);
        assert!(e.id.is_none());
        assert!(e.affected_nodes.is_empty());
    }
}
