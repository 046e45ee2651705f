//! HTTP-based reference implementation of [`super::Provider`].

use super::rate_limit::RateLimiter;
use super::Provider;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Built-in dimension table for known model identifiers.
///
/// Models absent from this table fall back to 1024, matching the
/// provider-agnostic default most current embedding APIs converge on.
const KNOWN_DIMENSIONS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
    ("nomic-embed-text", 768),
    ("mxbai-embed-large", 1024),
];

const DEFAULT_DIMENSIONS: usize = 1024;
const DEFAULT_RATE_LIMIT: f64 = 10.0;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn dimensions_for_model(model: &str) -> usize {
    KNOWN_DIMENSIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map_or(DEFAULT_DIMENSIONS, |(_, dims)| *dims)
}

/// HTTP-based embedding provider.
///
/// Posts `{model, input}` to `{endpoint}/embeddings` and expects
/// `{data: [{embedding, index}], model, usage}` back, the request/response
/// shape common to `OpenAI`-compatible embedding APIs.
pub struct HttpProvider {
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    dimensions: usize,
    client: reqwest::blocking::Client,
    limiter: RateLimiter,
}

impl HttpProvider {
    /// Default endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

    /// Creates a provider with the default endpoint, model, rate limit
    /// (10 req/s) and timeout (30s), and no API key configured.
    #[must_use]
    pub fn new() -> Self {
        let model = Self::DEFAULT_MODEL.to_string();
        let dimensions = dimensions_for_model(&model);
        Self {
            api_key: None,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model,
            dimensions,
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            limiter: RateLimiter::new(DEFAULT_RATE_LIMIT),
        }
    }

    /// Sets the bearer credential used for requests.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the API endpoint (no trailing slash).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model identifier, re-resolving `dimensions()` from the
    /// built-in table.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.dimensions = dimensions_for_model(&self.model);
        self
    }

    /// Sets the requests-per-second cap enforced before each request.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_sec: f64) -> Self {
        self.limiter = RateLimiter::new(requests_per_sec);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

impl Default for HttpProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(timeout: Duration) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to build embedding HTTP client, using default");
            reqwest::blocking::Client::new()
        })
}

impl Provider for HttpProvider {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.api_key.as_ref().ok_or_else(|| Error::OperationFailed {
            operation: "embedding_request".to_string(),
            cause: "no API key configured".to_string(),
        })?;

        self.limiter.acquire();

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .header("Authorization", format!("Bearer {}", api_key.expose_secret()))
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        operation: "embedding_request".to_string(),
                        elapsed_ms: 0,
                    }
                } else {
                    Error::OperationFailed {
                        operation: "embedding_request".to_string(),
                        cause: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().unwrap_or_default();
            return Err(Error::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::OperationFailed {
                operation: "embedding_request".to_string(),
                cause: format!("{status}: {body}"),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().map_err(|e| Error::OperationFailed {
            operation: "embedding_response".to_string(),
            cause: e.to_string(),
        })?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_and_dimensions() {
        let provider = HttpProvider::new();
        assert_eq!(provider.model(), HttpProvider::DEFAULT_MODEL);
        assert_eq!(provider.dimensions(), 1536);
    }

    #[test]
    fn test_unknown_model_defaults_to_1024_dimensions() {
        let provider = HttpProvider::new().with_model("some-custom-model");
        assert_eq!(provider.dimensions(), DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_empty_input_short_circuits_without_api_key() {
        let provider = HttpProvider::new();
        let result = provider.embed(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_embed_without_api_key_fails() {
        let provider = HttpProvider::new();
        let result = provider.embed(&["hello".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_api_key_builder() {
        let provider = HttpProvider::new().with_api_key("sk-test123");
        assert!(provider.api_key.is_some());
    }
}
