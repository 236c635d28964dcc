//! LLM port: chat-completions client with structured-output and cost
//! accounting, plus the three-role agent bundle used by the QA
//! orchestrator.

mod agents;
mod prompts;

pub use agents::{Agents, ResearcherDecision, SubQuestion};
pub use prompts::{MAIN_SYSTEM_PROMPT, QUERY_RESEARCHER_SYSTEM_PROMPT, RESEARCHER_SYSTEM_PROMPT};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, ImageUrlArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, ProviderError, Result};

const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(10);
const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Token usage reported by the most recent call to a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Tokens consumed by the prompt (system + user messages).
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
}

/// A named JSON schema used to constrain a structured-output call.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    /// Schema name, surfaced to the provider.
    pub name: String,
    /// The JSON schema itself.
    pub schema: Value,
}

/// A single chat-completions-backed model: name, endpoint, credentials, a
/// fixed system prompt, and per-million-token cost rates.
///
/// Cloning a model is intentionally shallow: the underlying HTTP client is
/// shared (cheap, connection-pooled) but `last_usage` is reset to `None` in
/// the clone, so concurrent fan-out workers each get a private usage slot
/// without racing on the same cell.
#[derive(Clone)]
pub struct LlmModel {
    name: String,
    system_prompt: String,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
    client: Client<OpenAIConfig>,
    last_usage: Arc<Mutex<Option<Usage>>>,
}

impl LlmModel {
    /// Builds a model targeting `endpoint` with the given credentials.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        system_prompt: impl Into<String>,
        input_cost_per_million: f64,
        output_cost_per_million: f64,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(endpoint.into())
            .with_api_key(api_key.into());
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            input_cost_per_million,
            output_cost_per_million,
            client: Client::with_config(config),
            last_usage: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns a shallow copy with a private `last_usage` slot, for handing
    /// to a fan-out worker that must not share usage state with its peers.
    #[must_use]
    pub fn checkout(&self) -> Self {
        Self {
            last_usage: Arc::new(Mutex::new(None)),
            ..self.clone()
        }
    }

    /// Replaces this model's system prompt.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// Model name as sent in each request.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Usage from the most recent completed call, if any.
    #[must_use]
    pub fn last_usage(&self) -> Option<Usage> {
        *self.last_usage.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Cost in dollars of the most recent call, derived from `last_usage`
    /// and this model's per-million-token rates.
    #[must_use]
    pub fn cost(&self) -> f64 {
        let Some(usage) = self.last_usage() else {
            return 0.0;
        };
        f64::from(usage.prompt_tokens) / 1e6 * self.input_cost_per_million
            + f64::from(usage.completion_tokens) / 1e6 * self.output_cost_per_million
    }

    /// Generates free-form text from `prompt`, optionally attaching image
    /// URLs as additional user-message content parts.
    ///
    /// # Errors
    ///
    /// Returns a `Provider` error if the request fails after retries, or if
    /// the provider returns no choices.
    pub async fn generate_text(&self, prompt: &str, images: &[String]) -> Result<String> {
        let messages = self.build_messages(prompt, images)?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.name)
            .messages(messages)
            .build()
            .map_err(|e| self.request_build_error(&e))?;

        let response = self.call_with_retries(request).await?;
        self.record_usage(&response);

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::SchemaViolation {
                    provider: self.name.clone(),
                    reason: "provider returned no message content".to_string(),
                }
                .into()
            })
    }

    /// Generates a value conforming to `schema`, deserialized as `T`.
    ///
    /// # Errors
    ///
    /// Returns a `Provider` error if the request fails after retries, or a
    /// `Provider::SchemaViolation` if the response cannot be parsed as JSON
    /// or does not deserialize into `T`.
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: &SchemaSpec,
    ) -> Result<T> {
        let messages = self.build_messages(prompt, &[])?;
        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                name: schema.name.clone(),
                description: None,
                schema: Some(schema.schema.clone()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.name)
            .messages(messages)
            .response_format(response_format)
            .build()
            .map_err(|e| self.request_build_error(&e))?;

        let response = self.call_with_retries(request).await?;
        self.record_usage(&response);

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::SchemaViolation {
                provider: self.name.clone(),
                reason: "provider returned no message content".to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::from(ProviderError::SchemaViolation {
                provider: self.name.clone(),
                reason: format!("response did not match requested schema: {e}"),
            })
        })
    }

    fn build_messages(
        &self,
        prompt: &str,
        images: &[String],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(self.system_prompt.clone())
            .build()
            .map_err(|e| self.request_build_error(&e))?;

        let user_message = if images.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| self.request_build_error(&e))?
        } else {
            let mut parts = vec![
                ChatCompletionRequestMessageContentPartTextArgs::default()
                    .text(prompt)
                    .build()
                    .map_err(|e| self.request_build_error(&e))?
                    .into(),
            ];
            for url in images {
                let image = ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(ImageUrlArgs::default().url(url.clone()).build().map_err(|e| {
                        self.request_build_error(&e)
                    })?)
                    .build()
                    .map_err(|e| self.request_build_error(&e))?;
                parts.push(image.into());
            }
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(parts))
                .build()
                .map_err(|e| self.request_build_error(&e))?
        };

        Ok(vec![system.into(), user_message.into()])
    }

    fn request_build_error(&self, err: &impl std::fmt::Display) -> Error {
        ProviderError::RequestFailed {
            provider: self.name.clone(),
            reason: err.to_string(),
        }
        .into()
    }

    /// Retries transient failures with exponential backoff, and rate-limit
    /// failures with a fixed delay, per the port's error-handling contract.
    async fn call_with_retries(
        &self,
        request: async_openai::types::CreateChatCompletionRequest,
    ) -> Result<async_openai::types::CreateChatCompletionResponse> {
        let mut attempt = 0;
        loop {
            match self.client.chat().create(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let is_rate_limit = is_rate_limit_error(&err);
                    attempt += 1;
                    if is_rate_limit {
                        warn!(model = %self.name, "rate limited, waiting before retry");
                        tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;
                        continue;
                    }
                    if attempt > MAX_TRANSIENT_RETRIES {
                        return Err(ProviderError::RequestFailed {
                            provider: self.name.clone(),
                            reason: err.to_string(),
                        }
                        .into());
                    }
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(model = %self.name, attempt, "transient provider error, retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn record_usage(&self, response: &async_openai::types::CreateChatCompletionResponse) {
        if let Some(usage) = &response.usage {
            let mut slot = self
                .last_usage
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *slot = Some(Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            });
        }
    }
}

fn is_rate_limit_error(err: &async_openai::error::OpenAIError) -> bool {
    match err {
        async_openai::error::OpenAIError::ApiError(api_err) => {
            api_err.code.as_deref() == Some("rate_limit_exceeded")
        }
        async_openai::error::OpenAIError::Reqwest(e) => {
            e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_is_zero_with_no_usage_recorded() {
        let model = LlmModel::new("gpt-test", "http://localhost", "key", "prompt", 1.0, 2.0);
        assert_eq!(model.cost(), 0.0);
    }

    #[test]
    fn cost_combines_prompt_and_completion_rates() {
        let model = LlmModel::new("gpt-test", "http://localhost", "key", "prompt", 10.0, 30.0);
        *model.last_usage.lock().unwrap() = Some(Usage {
            prompt_tokens: 1_000_000,
            completion_tokens: 500_000,
        });
        assert!((model.cost() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn checkout_resets_usage_but_keeps_identity() {
        let model = LlmModel::new("gpt-test", "http://localhost", "key", "prompt", 1.0, 2.0);
        *model.last_usage.lock().unwrap() = Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 10,
        });
        let copy = model.checkout();
        assert_eq!(copy.name(), model.name());
        assert!(copy.last_usage().is_none());
        assert!(model.last_usage().is_some());
    }
}
