//! HTTP-backed embedder for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{EmbeddingPort, PromptTemplate, apply_template, normalize};
use crate::chunking::{ApproxTokenizer, Tokenizer};
use crate::error::{ProviderError, Result};

const PROVIDER: &str = "http-embeddings";
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(10);
const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Embedder backed by an OpenAI-compatible `/embeddings` HTTP endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    max_tokens: usize,
    template: Option<PromptTemplate>,
}

impl HttpEmbedder {
    /// Builds an embedder targeting `base_url` (e.g.
    /// `https://api.openai.com/v1`), authenticating with `api_key` and
    /// requesting `model`, which is expected to produce `dimension`-wide
    /// vectors and accept up to `max_tokens` input tokens.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        max_tokens: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
            max_tokens,
            template: None,
        }
    }

    /// Attaches a query prompt template, applied when `embed` is called
    /// with an `instruction`.
    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Posts `request`, retrying transient failures with exponential
    /// backoff and rate-limit responses with a fixed delay, per the port's
    /// error-handling contract.
    async fn post_with_retries(&self, request: &EmbeddingsRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let mut attempt = 0;
        loop {
            let sent = self.client.post(&url).bearer_auth(&self.api_key).json(request).send().await;

            match sent {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    warn!(model = %self.model, "rate limited, waiting before retry");
                    tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;
                    continue;
                }
                Ok(response) if response.status().is_server_error() => {
                    attempt += 1;
                    if attempt > MAX_TRANSIENT_RETRIES {
                        return Ok(response);
                    }
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(model = %self.model, attempt, status = %response.status(), "transient provider error, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Ok(response) => return Ok(response),
                Err(err) => {
                    attempt += 1;
                    if attempt > MAX_TRANSIENT_RETRIES {
                        return Err(ProviderError::RequestFailed {
                            provider: PROVIDER.to_string(),
                            reason: err.to_string(),
                        }
                        .into());
                    }
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(model = %self.model, attempt, "transient network error, retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingPort for HttpEmbedder {
    async fn embed(&self, texts: &[&str], instruction: Option<&str>) -> Result<Vec<Vec<f32>>> {
        let rendered = apply_template(self.template.as_ref(), instruction, texts);
        let input: Vec<&str> = rendered.iter().map(std::convert::AsRef::as_ref).collect();

        let request = EmbeddingsRequest {
            model: &self.model,
            input,
        };

        let response = self.post_with_retries(&request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {body}"),
            }
            .into());
        }

        let parsed: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::SchemaViolation {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                })?;

        if parsed.data.len() != rendered.len() {
            return Err(ProviderError::SchemaViolation {
                provider: PROVIDER.to_string(),
                reason: format!(
                    "expected {} embeddings, got {}",
                    rendered.len(),
                    parsed.data.len()
                ),
            }
            .into());
        }

        let mut ordered = vec![Vec::new(); parsed.data.len()];
        for item in parsed.data {
            let idx = item.index;
            let mut vector = item.embedding;
            if vector.len() != self.dimension {
                return Err(ProviderError::SchemaViolation {
                    provider: PROVIDER.to_string(),
                    reason: format!(
                        "expected {}-dimensional vector, got {}",
                        self.dimension,
                        vector.len()
                    ),
                }
                .into());
            }
            normalize(&mut vector);
            if let Some(slot) = ordered.get_mut(idx) {
                *slot = vector;
            }
        }

        Ok(ordered)
    }

    fn tokenize(&self, text: &str) -> usize {
        ApproxTokenizer.count_tokens(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embeds_texts_against_mock_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [3.0, 4.0], "index": 0},
                ]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(server.uri(), "test-key", "test-model", 2, 8192);
        let result = embedder.embed(&["hello"], None).await.unwrap();

        assert_eq!(result.len(), 1);
        let magnitude: f32 = result[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_schema_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [1.0, 2.0, 3.0], "index": 0},
                ]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(server.uri(), "test-key", "test-model", 2, 8192);
        let err = embedder.embed(&["hello"], None).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Provider(ProviderError::SchemaViolation { .. })
        ));
    }

    #[tokio::test]
    async fn server_error_is_a_request_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(server.uri(), "test-key", "test-model", 2, 8192);
        let err = embedder.embed(&["hello"], None).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Provider(ProviderError::RequestFailed { .. })
        ));
    }
}
