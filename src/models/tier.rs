//! Lifecycle tier controlling retrieval visibility and decay eligibility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a node.
///
/// Tiers form an ordered hierarchy `Task < Session < Longterm < Archive`.
/// Promotion moves a node rightward through this order; archival is terminal
/// for retrieval (archived nodes are never returned by search or traversal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Scoped to the current task; the most volatile tier.
    Task,
    /// Scoped to the current session.
    Session,
    /// Durable, cross-session knowledge.
    Longterm,
    /// Terminal tier; excluded from search, traversal, and recent-node listing.
    Archive,
}

impl Default for Tier {
    fn default() -> Self {
        Self::Task
    }
}

impl Tier {
    /// Parses a tier from its lowercase snake_case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "task" => Some(Self::Task),
            "session" => Some(Self::Session),
            "longterm" => Some(Self::Longterm),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }

    /// Returns the lowercase snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Session => "session",
            Self::Longterm => "longterm",
            Self::Archive => "archive",
        }
    }

    /// Returns `true` if this tier is excluded from retrieval (archived).
    #[must_use]
    pub const fn is_archived(self) -> bool {
        matches!(self, Self::Archive)
    }

    /// Returns the next tier rightward in the hierarchy, or `None` if already
    /// at the terminal tier.
    #[must_use]
    pub const fn promote(self) -> Option<Self> {
        match self {
            Self::Task => Some(Self::Session),
            Self::Session => Some(Self::Longterm),
            Self::Longterm => Some(Self::Archive),
            Self::Archive => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Tier::Task < Tier::Session);
        assert!(Tier::Session < Tier::Longterm);
        assert!(Tier::Longterm < Tier::Archive);
    }

    #[test]
    fn test_parse_roundtrip() {
        for t in [Tier::Task, Tier::Session, Tier::Longterm, Tier::Archive] {
            assert_eq!(Tier::parse(t.as_str()), Some(t));
        }
        assert_eq!(Tier::parse("unknown"), None);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Tier::parse("ARCHIVE"), Some(Tier::Archive));
    }

    #[test]
    fn test_promote_chain() {
        assert_eq!(Tier::Task.promote(), Some(Tier::Session));
        assert_eq!(Tier::Archive.promote(), None);
    }

    #[test]
    fn test_default_is_task() {
        assert_eq!(Tier::default(), Tier::Task);
    }

    #[test]
    fn test_is_archived() {
        assert!(Tier::Archive.is_archived());
        assert!(!Tier::Longterm.is_archived());
    }
}
