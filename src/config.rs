//! Minimal configuration loader: model endpoints, credentials, store path,
//! and chunking/orchestrator defaults, read from a TOML file with API keys
//! overridden from the environment.
//!
//! This is connective tissue for the CLI, not a general-purpose config
//! service: just enough to construct `LlmModel`/embedding/store instances
//! from a file on disk.

use std::path::Path;

use serde::Deserialize;

use crate::chunking::ChunkStrategy;
use crate::embedding::DEFAULT_DIMENSIONS;
use crate::error::{ConfigError, Result};
use crate::storage::DEFAULT_STORE_PATH;

/// Root configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the `SQLite` vector store.
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// Name of the collection within the store.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Target chunk size, in tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Chunking strategy: `max_tokens`, `balanced`, or `min_tokens`.
    #[serde(default = "default_chunk_strategy")]
    pub chunk_strategy: String,
    /// Upper bound on researcher/fan-out iterations per query.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Embedding model configuration.
    pub embedding: EmbeddingConfig,
    /// Main (synthesis) model configuration.
    pub main_model: ModelConfig,
    /// Researcher model configuration.
    pub researcher_model: ModelConfig,
    /// Query-researcher model configuration.
    pub query_researcher_model: ModelConfig,
}

/// A single chat-completions model endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model name as sent to the provider.
    pub name: String,
    /// API base URL.
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Input cost in dollars per million tokens.
    #[serde(default)]
    pub input_cost_per_million: f64,
    /// Output cost in dollars per million tokens.
    #[serde(default)]
    pub output_cost_per_million: f64,
}

/// Embedding provider configuration. `endpoint` absent selects the local
/// fallback embedder.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// API base URL; omit to use the local hash-based fallback.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key, when
    /// `endpoint` is set.
    pub api_key_env: Option<String>,
    /// Model name, when `endpoint` is set.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimension `D`.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Maximum input length, in tokens.
    #[serde(default = "default_embedding_max_tokens")]
    pub max_tokens: usize,
    /// Query prompt template wrapping text before embedding. Must contain
    /// `{query}`; `{instruction}` is optional. Omit to embed text as-is.
    pub prompt_template: Option<String>,
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

fn default_collection() -> String {
    "docs".to_string()
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_strategy() -> String {
    "balanced".to_string()
}

fn default_max_iterations() -> usize {
    3
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_embedding_max_tokens() -> usize {
    8192
}

/// Template written by `rag-engine init` when no config file exists yet.
/// `api_key_env` names are left pointing at the conventional `OPENAI_API_KEY`
/// variable; the endpoints point at the OpenAI API but are meant to be
/// edited to taste.
pub const DEFAULT_CONFIG_TOML: &str = r#"store_path = "rag-engine.db"
collection = "docs"
chunk_size = 512
chunk_strategy = "balanced"
max_iterations = 3

[embedding]
endpoint = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
model = "text-embedding-3-small"
dimension = 1536
max_tokens = 8192
# prompt_template = "Represent this query for retrieval: {query}"

[main_model]
name = "gpt-4o"
endpoint = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
input_cost_per_million = 2.5
output_cost_per_million = 10.0

[researcher_model]
name = "gpt-4o-mini"
endpoint = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
input_cost_per_million = 0.15
output_cost_per_million = 0.6

[query_researcher_model]
name = "gpt-4o-mini"
endpoint = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
input_cost_per_million = 0.15
output_cost_per_million = 0.6
"#;

impl Config {
    /// Writes [`DEFAULT_CONFIG_TOML`] to `path`, refusing to overwrite an
    /// existing file unless `force` is set.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the file exists and `force` is false, or if
    /// the write fails.
    pub fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(ConfigError::Invalid {
                message: format!("config file already exists at {}; pass --force to overwrite", path.display()),
            }
            .into());
        }
        crate::io::write_file(path, DEFAULT_CONFIG_TOML)
    }

    /// Loads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the file cannot be read or does
    /// not parse as valid config TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = crate::io::read_file(path)?;
        toml::from_str(&text).map_err(|e| {
            ConfigError::Invalid {
                message: format!("failed to parse config at {}: {e}", path.display()),
            }
            .into()
        })
    }

    /// Resolves `model_config`'s API key from its configured environment
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the variable is unset.
    pub fn resolve_api_key(env_var: &str) -> Result<String> {
        std::env::var(env_var).map_err(|_| {
            ConfigError::MissingKey {
                key: env_var.to_string(),
            }
            .into()
        })
    }

    /// Parses [`Self::chunk_strategy`] into a [`ChunkStrategy`].
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the strategy name is unrecognized.
    pub fn chunk_strategy(&self) -> Result<ChunkStrategy> {
        match self.chunk_strategy.as_str() {
            "max_tokens" => Ok(ChunkStrategy::MaxTokens),
            "balanced" => Ok(ChunkStrategy::Balanced),
            "min_tokens" => Ok(ChunkStrategy::MinTokens),
            other => Err(ConfigError::Invalid {
                message: format!("unknown chunk strategy: {other}"),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
store_path = "test.db"

[embedding]
dimension = 8

[main_model]
name = "gpt-4o"
endpoint = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"

[researcher_model]
name = "gpt-4o-mini"
endpoint = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"

[query_researcher_model]
name = "gpt-4o-mini"
endpoint = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
"#;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.store_path, "test.db");
        assert_eq!(config.collection, "docs");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.embedding.dimension, 8);
    }

    #[test]
    fn missing_api_key_env_is_a_configuration_error() {
        let err = Config::resolve_api_key("RAG_ENGINE_TEST_VAR_DOES_NOT_EXIST").unwrap_err();
        assert!(matches!(err, crate::error::Error::Configuration(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn default_config_toml_parses_and_round_trips_through_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rag-engine.toml");
        Config::write_default(&path, false).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.main_model.name, "gpt-4o");
    }

    #[test]
    fn write_default_refuses_to_overwrite_without_force() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rag-engine.toml");
        Config::write_default(&path, false).unwrap();
        assert!(Config::write_default(&path, false).is_err());
        assert!(Config::write_default(&path, true).is_ok());
    }

    #[test]
    fn unknown_chunk_strategy_is_rejected() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.chunk_strategy = "semantic".to_string();
        assert!(config.chunk_strategy().is_err());
    }
}
