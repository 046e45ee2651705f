//! # hypergraph-memory
//!
//! A persistent, tiered hypergraph memory engine for LLM-driven agents.
//!
//! Heterogeneous nodes (entities, facts, experiences, decisions, snippets) are
//! connected by typed n-ary hyperedges with role-assigned memberships. A
//! learning layer continuously ingests interaction signals, extracts
//! structured knowledge, applies Ebbinghaus-style forgetting, and surfaces
//! relevant context for prompt augmentation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hypergraph_memory::{Engine, EngineConfig};
//! use hypergraph_memory::storage::memory::InMemoryBackend;
//!
//! let backend = InMemoryBackend::new();
//! let engine = Engine::new(backend, EngineConfig::default());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

use thiserror::Error as ThisError;

pub mod config;
pub mod embedding;
pub mod engine;
pub mod learning;
pub mod models;
pub mod observability;
pub mod search;
pub mod storage;
pub mod vector;

pub use config::EngineConfig;
pub use engine::{CancellationToken, Engine};
pub use models::{
    Hyperedge, HyperedgeFilter, Membership, Node, NodeFilter, Role, SearchOptions, SearchResult,
    Tier,
};

/// Error type for hypergraph-memory operations.
///
/// Uses `thiserror` for automatic `Display`/`Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NotFound` | A single-entity read or a write targeting a missing row |
/// | `InvalidInput` | Malformed filters, empty required content, bad ranges |
/// | `OperationFailed` | Backend I/O failures (SQLite, filesystem) |
/// | `Cancelled` | The ambient cancellation token was signalled mid-operation |
/// | `Timeout` | A bounded operation (e.g. `consolidate_all`) exceeded its deadline |
/// | `RateLimited` | The embedding provider's rate limiter rejected a call |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The requested entity does not exist.
    ///
    /// Recognizable via [`Error::is_not_found`]. Never retried automatically.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up (`"node"`, `"hyperedge"`, ...).
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A backend operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The ambient cancellation token was signalled.
    #[error("operation cancelled")]
    Cancelled,

    /// A bounded operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long the operation ran before timing out.
        elapsed_ms: u64,
    },

    /// An external call was rate-limited.
    #[error("rate limited: {0}")]
    RateLimited(String),
}

impl Error {
    /// Returns `true` if this error represents a missing entity.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Builds a [`Error::NotFound`] for the given entity kind and id.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type alias for hypergraph-memory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current UTC instant.
///
/// Centralized so tests can reason about a single time source and so the
/// "stamp `created_at`/`updated_at` if zero" defaulting logic has one place
/// to call.
#[must_use]
pub fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("node", "abc-123");
        assert_eq!(err.to_string(), "node not found: abc-123");
        assert!(err.is_not_found());

        let err = Error::InvalidInput("empty content".to_string());
        assert_eq!(err.to_string(), "invalid input: empty content");
        assert!(!err.is_not_found());

        let err = Error::OperationFailed {
            operation: "insert".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'insert' failed: disk full");
    }

    #[test]
    fn test_now_monotonic_enough() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }
}
