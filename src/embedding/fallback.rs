//! Hash-based fallback embedder.
//!
//! Deterministic pseudo-embeddings for tests and offline development, when
//! no real embedding provider is configured. Clusters by lexical overlap,
//! not semantics.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rayon::prelude::*;

use super::{EmbeddingPort, PromptTemplate, apply_template, normalize};
use crate::error::Result;

/// Hash-based fallback embedder.
pub struct FallbackEmbedder {
    dimensions: usize,
    max_tokens: usize,
    template: Option<PromptTemplate>,
}

impl FallbackEmbedder {
    /// Creates a fallback embedder with the given dimension and no template.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            max_tokens: 8192,
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

    fn hash_string(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();

        let words: Vec<&str> = normalized.split_whitespace().collect();

        for word in &words {
            let hash = Self::hash_string(word);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            let magnitude = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
            embedding[idx] += sign * magnitude;
        }

        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() >= 3 {
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let hash = Self::hash_string(&trigram);
                let idx = (hash as usize) % self.dimensions;
                let sign = if (hash >> 32) & 1 == 0 { 0.5 } else { -0.5 };
                embedding[idx] += sign;
            }
        }

        normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl EmbeddingPort for FallbackEmbedder {
    async fn embed(&self, texts: &[&str], instruction: Option<&str>) -> Result<Vec<Vec<f32>>> {
        let rendered = apply_template(self.template.as_ref(), instruction, texts);
        Ok(rendered
            .par_iter()
            .map(|t| self.generate_embedding(t))
            .collect())
    }

    fn tokenize(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}
