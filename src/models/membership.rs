//! The (hyperedge, node, role, position) tuple linking a node into an edge.

use super::{HyperedgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a node plays within a hyperedge.
///
/// A node may participate in the same edge under multiple roles; the
/// membership primary key is the full `(hyperedge_id, node_id, role)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The acting node ("subject = outgoing" for traversal direction).
    Subject,
    /// The acted-upon node ("object = incoming" for traversal direction).
    Object,
    /// A contextual participant.
    Context,
    /// A generic participant.
    Participant,
}

impl Role {
    /// Parses a role from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "subject" => Some(Self::Subject),
            "object" => Some(Self::Object),
            "context" => Some(Self::Context),
            "participant" => Some(Self::Participant),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Object => "object",
            Self::Context => "context",
            Self::Participant => "participant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single membership row linking a node into a hyperedge under a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// The hyperedge this membership belongs to.
    pub hyperedge_id: HyperedgeId,
    /// The node participating in the hyperedge.
    pub node_id: NodeId,
    /// The role the node plays.
    pub role: Role,
    /// Ordinal position among memberships of the same edge (stable ordering
    /// for n-ary edges, e.g. argument order).
    pub position: i32,
}

impl Membership {
    /// Creates a new membership.
    #[must_use]
    pub const fn new(hyperedge_id: HyperedgeId, node_id: NodeId, role: Role, position: i32) -> Self {
        Self {
            hyperedge_id,
            node_id,
            role,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for r in [Role::Subject, Role::Object, Role::Context, Role::Participant] {
            assert_eq!(Role::parse(r.as_str()), Some(r));
        }
    }

    #[test]
    fn test_role_parse_unknown() {
        assert_eq!(Role::parse("bogus"), None);
    }
}
