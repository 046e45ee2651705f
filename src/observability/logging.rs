//! Structured logging handle.

/// Marker handle for structured logging.
///
/// Every component logs through `tracing` at its own call sites; this type
/// exists so an `Engine` has something concrete to hold and hand out, not to
/// mediate log calls itself.
pub struct Logger;

impl Logger {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
