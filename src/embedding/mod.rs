//! Embedding provider capability.
//!
//! Turning text into vectors, choosing a model, and deciding when to call
//! out to a remote service are all outside this crate's scope; `Provider`
//! is the seam a caller plugs an implementation into. [`http::HttpProvider`]
//! is the one reference implementation shipped here.

pub mod http;
mod rate_limit;

pub use http::HttpProvider;
pub use rate_limit::RateLimiter;

/// A capability that turns text into embedding vectors.
pub trait Provider: Send + Sync {
    /// Embeds a batch of texts, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's call fails, times out, or is
    /// rate-limited.
    fn embed(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>>;

    /// The dimensionality of vectors this provider returns.
    fn dimensions(&self) -> usize;

    /// The model identifier this provider is configured to use.
    fn model(&self) -> &str;
}
