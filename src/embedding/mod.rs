//! Embedding generation for semantic retrieval.
//!
//! Two provider variants are expected to conform to the same contract: a
//! local, dependency-free fallback and an HTTP embeddings API. Both
//! unit-normalise their output and support wrapping query text in a prompt
//! template before embedding.

mod fallback;
mod http;

pub use fallback::FallbackEmbedder;
pub use http::HttpEmbedder;

use async_trait::async_trait;

use crate::error::{ConfigError, Result};

/// Default embedding dimension used when no model-specific value is known.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Default top-k used by retrieval when the caller does not override it.
pub const DEFAULT_TOP_K: usize = 10;

/// Abstract embedding capability: embed a batch of texts, tokenize, and
/// report the model's dimension and token budget.
///
/// Async so an HTTP-backed implementation can share the orchestrator's
/// `tokio` runtime instead of blocking it.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Embeds a batch of texts, returning one unit-normalised vector per
    /// input in the same order.
    ///
    /// When `instruction` is given and this port has a configured prompt
    /// template, each text is first wrapped via that template.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if a template is configured but
    /// lacks a `{query}` placeholder, or a `Provider` error if the
    /// underlying call fails.
    async fn embed(&self, texts: &[&str], instruction: Option<&str>) -> Result<Vec<Vec<f32>>>;

    /// Counts tokens in `text` under this model's tokenizer.
    fn tokenize(&self, text: &str) -> usize;

    /// Returns the embedding dimension `D`.
    fn dimension(&self) -> usize;

    /// Returns the maximum input length, in tokens, this model accepts.
    fn max_tokens(&self) -> usize;
}

/// A prompt template wrapping query text before embedding.
///
/// Must contain a `{query}` placeholder; `{instruction}` is optional.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Builds a template, rejecting one that lacks `{query}`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::MalformedTemplate` if `{query}` is absent.
    pub fn new(template: impl Into<String>) -> std::result::Result<Self, ConfigError> {
        let template = template.into();
        if !template.contains("{query}") {
            return Err(ConfigError::MalformedTemplate {
                reason: "template is missing required {query} placeholder".to_string(),
            });
        }
        Ok(Self { template })
    }

    /// Renders the template, substituting `{instruction}` and `{query}`.
    #[must_use]
    pub fn render(&self, instruction: &str, query: &str) -> String {
        self.template
            .replace("{instruction}", instruction)
            .replace("{query}", query)
    }
}

/// Unit-normalises a vector in place; leaves a zero vector untouched.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for v in embedding {
            *v /= magnitude;
        }
    }
}

/// Renders each text through `instruction`/`template`, or returns the text
/// unchanged if no template is configured.
pub(crate) fn apply_template<'a>(
    template: Option<&PromptTemplate>,
    instruction: Option<&str>,
    texts: &'a [&'a str],
) -> Vec<std::borrow::Cow<'a, str>> {
    match (template, instruction) {
        (Some(tmpl), Some(instruction)) => texts
            .iter()
            .map(|t| std::borrow::Cow::Owned(tmpl.render(instruction, t)))
            .collect(),
        _ => texts.iter().map(|t| std::borrow::Cow::Borrowed(*t)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_requires_query_placeholder() {
        let err = PromptTemplate::new("no placeholder here").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedTemplate { .. }));
    }

    #[test]
    fn template_renders_both_placeholders() {
        let tmpl = PromptTemplate::new("{instruction}: {query}").unwrap();
        assert_eq!(tmpl.render("find docs about", "rust"), "find docs about: rust");
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn apply_template_passes_through_without_instruction() {
        let texts = ["hello"];
        let out = apply_template(None, None, &texts);
        assert_eq!(out[0], "hello");
    }
}
