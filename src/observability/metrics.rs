//! Metrics handle.

/// Marker handle for metrics emission.
///
/// Counters and histograms are recorded through the `metrics` facade at
/// their call sites (for example the poisoned-mutex recovery counter in
/// [`crate::storage::sqlite::connection`]); this type is a handle, not a
/// registry.
pub struct Metrics;

impl Metrics {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
