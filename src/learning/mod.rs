//! The learning layer: turns transient signals into durable facts, patterns,
//! preferences, and constraints, keeps them fresh, and selects the relevant
//! ones back out for a query.
//!
//! [`projection`] is the shared wire format every other submodule in this
//! tree reads and writes through; [`extractor`], [`consolidator`], and
//! [`applier`] each own one stage of the write -> decay -> read lifecycle.

mod applier;
mod consolidator;
mod extractor;
pub mod patterns;
pub mod projection;

pub use applier::{Applier, ApplyResult};
pub use consolidator::{decay, ConsolidationReport, Consolidator, DecayOutcome, FamilyReport};
pub use extractor::Extractor;
