//! Core data types for the hypergraph store and learning layer.

mod evolution;
mod filter;
mod hyperedge;
mod learned;
mod membership;
mod node;
mod search;
mod signal;
mod tier;

pub use evolution::{EvolutionEntry, EvolutionOperation};
pub use filter::{ConnectOptions, Direction, HyperedgeFilter, NodeFilter};
pub use hyperedge::{Hyperedge, HyperedgeId, HyperedgeType};
pub use learned::{
    ConstraintType, LearnedConstraint, LearnedFact, LearnedPattern, PatternType, PreferenceScope,
    PreferenceValue, SignalSource, UserPreference,
};
pub use membership::{Membership, Role};
pub use node::{Node, NodeId, NodeType};
pub use search::{SearchOptions, SearchResult};
pub use signal::{
    CorrectionDetails, LearningSignal, PatternDetails, PreferenceDetails, SignalContext,
    SignalMetadata, SignalType,
};
pub use tier::Tier;
