//! Error types for the RAG engine.
//!
//! Mirrors the error kinds of the QA pipeline: configuration, parsing,
//! provider (LLM/embedding), storage, and the two recoverable kinds
//! (partial research, rate limiting) that the orchestrator and ports
//! handle internally rather than surfacing to the caller.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the RAG engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors: missing keys, dimension mismatches, malformed templates.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Markdown/front-matter parse errors. Reported per file; ingestion continues.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// LLM/embedding provider errors, after retry exhaustion.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Vector store errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors encountered while walking or reading the corpus.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),
}

/// Configuration-layer errors. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration key is missing.
    #[error("missing required configuration key: {key}")]
    MissingKey {
        /// Name of the missing key.
        key: String,
    },

    /// A vector store collection was opened with a dimension different from
    /// the one it was created with.
    #[error("collection dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension requested on open.
        actual: usize,
    },

    /// A prompt template is missing a required placeholder, e.g. `{query}`.
    #[error("malformed template: {reason}")]
    MalformedTemplate {
        /// Why the template is malformed.
        reason: String,
    },

    /// Generic invalid configuration value.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the invalid value.
        message: String,
    },
}

/// Markdown parsing errors. Carries the source file name and a short cause.
#[derive(Error, Debug)]
#[error("failed to parse {file_name}: {cause}")]
pub struct ParseError {
    /// Name of the file that failed to parse.
    pub file_name: String,
    /// Short description of the cause.
    pub cause: String,
}

impl ParseError {
    /// Builds a new parse error for the given file.
    #[must_use]
    pub fn new(file_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            cause: cause.into(),
        }
    }
}

/// LLM/embedding provider errors, surfaced after retry/backoff exhaustion.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The request failed transitively (network, HTTP status) after retries.
    #[error("request to {provider} failed after retries: {reason}")]
    RequestFailed {
        /// Name of the provider/model that failed.
        provider: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The provider returned a value that did not validate against the
    /// requested schema.
    #[error("schema validation failed for {provider}: {reason}")]
    SchemaViolation {
        /// Name of the provider/model.
        provider: String,
        /// Reason validation failed.
        reason: String,
    },

    /// The rate-limit wait loop was given up on (non-rate-limit error broke it).
    #[error("rate limit wait aborted for {provider}: {reason}")]
    RateLimitAborted {
        /// Name of the provider/model.
        provider: String,
        /// Reason the wait was aborted.
        reason: String,
    },
}

/// Vector store errors. Fatal.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(String),

    /// The store has not been initialised (no `init` / `open` call yet).
    #[error("store not initialized. Run: rag-engine init")]
    NotInitialized,

    /// A requested collection does not exist.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the missing collection.
        name: String,
    },

    /// A requested stored vector does not exist.
    #[error("vector not found: {id}")]
    VectorNotFound {
        /// Id of the missing vector.
        id: i64,
    },

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction failure (e.g. a batch commit was rolled back).
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Metadata (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// I/O errors encountered during corpus traversal or file reads.
#[derive(Error, Debug)]
pub enum IoError {
    /// File or directory not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// Failed to read a file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write a file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping failure.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation failure.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::SchemaViolation {
            provider: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_display() {
        let err = Error::Configuration(ConfigError::DimensionMismatch {
            expected: 8,
            actual: 16,
        });
        assert!(err.to_string().contains("expected 8"));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::new("foo.md", "unterminated front-matter");
        assert_eq!(
            err.to_string(),
            "failed to parse foo.md: unterminated front-matter"
        );
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::SchemaViolation {
            provider: "researcher".to_string(),
            reason: "missing field satisfied".to_string(),
        };
        assert!(err.to_string().contains("researcher"));
    }

    #[test]
    fn storage_error_not_initialized() {
        let err = StorageError::NotInitialized;
        assert_eq!(err.to_string(), "store not initialized. Run: rag-engine init");
    }

    #[test]
    fn from_rusqlite_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn from_serde_json_error_to_storage() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn command_error_display() {
        let err = CommandError::MissingArgument("--dir".to_string());
        assert_eq!(err.to_string(), "missing required argument: --dir");
    }
}
