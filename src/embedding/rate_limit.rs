//! Blocking token-bucket rate limiter for outbound embedding requests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Limits callers to a fixed number of requests per second, blocking the
/// calling thread until a token is available rather than rejecting.
///
/// Used by [`super::http::HttpProvider`] to respect the `rate_limit` option,
/// the token-bucket policy called for in the shared-resource section of the
/// design this crate follows for outbound HTTP.
pub struct RateLimiter {
    state: Mutex<State>,
    capacity: f64,
    refill_per_sec: f64,
}

struct State {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_sec` requests/second, with a
    /// burst capacity equal to one second's worth of tokens.
    #[must_use]
    pub fn new(requests_per_sec: f64) -> Self {
        let rate = requests_per_sec.max(0.001);
        Self {
            state: Mutex::new(State {
                tokens: rate,
                last_refill: Instant::now(),
            }),
            capacity: rate,
            refill_per_sec: rate,
        }
    }

    /// Blocks the calling thread until a token is available, then consumes
    /// it.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };
            std::thread::sleep(wait);
        }
    }
}
