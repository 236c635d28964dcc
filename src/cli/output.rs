//! Output formatting: text and JSON renderings of command results, plus
//! uniform error formatting with per-variant recovery suggestions.

use serde::Serialize;

use crate::error::{CommandError, ConfigError, Error, IoError, ParseError, ProviderError, StorageError};
use crate::ingest::{FileOutcome, IngestReport};
use crate::orchestrator::QAPipelineResult;

/// Output rendering mode, shared across every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable plain text.
    Text,
    /// Pretty-printed JSON.
    Json,
    /// Newline-delimited JSON (currently rendered the same as `Json`; no
    /// command yet streams multiple records).
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name, defaulting to [`Self::Text`] for anything
    /// unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Whether this format streams one record at a time rather than a
    /// single aggregate document.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Renders an init-command result.
#[must_use]
pub fn format_init(store_path: &str, collection: &str, dimension: usize, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "Initialized collection '{collection}' (dimension {dimension}) at {store_path}\n"
        ),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&serde_json::json!({
            "store_path": store_path,
            "collection": collection,
            "dimension": dimension,
        })),
    }
}

#[derive(Serialize)]
struct IngestFileJson<'a> {
    file: &'a str,
    outcome: &'a str,
    chunks: usize,
}

/// Renders an ingestion report.
#[must_use]
pub fn format_ingest_report(report: &IngestReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for (file, outcome) in &report.files {
                let line = match outcome {
                    FileOutcome::Indexed(n) => format!("indexed  {file} ({n} chunks)\n"),
                    FileOutcome::Skipped => format!("skipped  {file}\n"),
                    FileOutcome::Failed(reason) => format!("failed   {file}: {reason}\n"),
                };
                out.push_str(&line);
            }
            out.push_str(&format!(
                "\n{} files, {} chunks written\n",
                report.files.len(),
                report.chunks_written()
            ));
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let files: Vec<IngestFileJson<'_>> = report
                .files
                .iter()
                .map(|(file, outcome)| match outcome {
                    FileOutcome::Indexed(n) => IngestFileJson { file, outcome: "indexed", chunks: *n },
                    FileOutcome::Skipped => IngestFileJson { file, outcome: "skipped", chunks: 0 },
                    FileOutcome::Failed(_) => IngestFileJson { file, outcome: "failed", chunks: 0 },
                })
                .collect();
            format_json(&serde_json::json!({
                "files": files,
                "chunks_written": report.chunks_written(),
            }))
        }
    }
}

/// Renders the result of an `ask` run.
#[must_use]
pub fn format_qa_result(result: &QAPipelineResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "{}\n\n({} iteration(s), {} sub-question(s) researched, ${:.4} cost)\n",
            result.final_answer,
            result.iterations,
            result.questions.len(),
            result.cost
        ),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(&serde_json::json!({
            "answer": result.final_answer,
            "iterations": result.iterations,
            "questions": result.questions,
            "cost": result.cost,
            "context_rows_used": result.used_context.len(),
        })),
    }
}

/// Renders an error uniformly across commands: plain text for [`OutputFormat::Text`],
/// a structured `{"success": false, "error": {...}}` object otherwise.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (kind, suggestion) = get_error_details(error);
            format_json(&serde_json::json!({
                "success": false,
                "error": {
                    "type": kind,
                    "message": error.to_string(),
                    "suggestion": suggestion,
                }
            }))
        }
    }
}

/// Maps an error to a stable type tag plus an optional recovery suggestion,
/// for the JSON error envelope.
fn get_error_details(error: &Error) -> (&'static str, Option<&'static str>) {
    match error {
        Error::Configuration(e) => match e {
            ConfigError::MissingKey { .. } => {
                ("MissingKey", Some("Set the referenced environment variable, or edit the config file"))
            }
            ConfigError::DimensionMismatch { .. } => (
                "DimensionMismatch",
                Some("Run 'rag-engine init --force' to recreate the store with the configured dimension"),
            ),
            ConfigError::MalformedTemplate { .. } => {
                ("MalformedTemplate", Some("Add a {query} placeholder to the prompt template"))
            }
            ConfigError::Invalid { .. } => ("InvalidConfig", Some("Check the config file for typos or bad values")),
        },
        Error::Parse(ParseError { .. }) => {
            ("ParseError", Some("Check the file's front-matter and Markdown syntax"))
        }
        Error::Provider(e) => match e {
            ProviderError::RequestFailed { .. } => {
                ("ProviderRequestFailed", Some("Check network connectivity and the provider endpoint/API key"))
            }
            ProviderError::SchemaViolation { .. } => {
                ("ProviderSchemaViolation", Some("The provider returned an unexpected response shape; check model compatibility"))
            }
            ProviderError::RateLimitAborted { .. } => {
                ("ProviderRateLimited", Some("Retry later, or lower request concurrency"))
            }
        },
        Error::Storage(e) => match e {
            StorageError::Database(_) => ("StorageDatabaseError", Some("Check that the store path is writable")),
            StorageError::NotInitialized => ("StorageNotInitialized", Some("Run: rag-engine init")),
            StorageError::CollectionNotFound { .. } => {
                ("CollectionNotFound", Some("Run: rag-engine init"))
            }
            StorageError::VectorNotFound { .. } => ("VectorNotFound", None),
            StorageError::Migration(_) => ("MigrationError", Some("The store file may be from an incompatible version")),
            StorageError::Transaction(_) => ("TransactionError", Some("Retry the command; the write was rolled back")),
            StorageError::Serialization(_) => ("SerializationError", None),
        },
        Error::Io(e) => match e {
            IoError::FileNotFound { .. } => ("FileNotFound", Some("Check the path passed to the command")),
            IoError::ReadFailed { .. } => ("ReadFailed", Some("Check file permissions")),
            IoError::WriteFailed { .. } => ("WriteFailed", Some("Check file permissions and available disk space")),
            IoError::MmapFailed { .. } => ("MmapFailed", None),
            IoError::DirectoryFailed { .. } => ("DirectoryFailed", Some("Check parent directory permissions")),
            IoError::Generic(_) => ("IoError", None),
        },
        Error::Command(e) => match e {
            CommandError::InvalidArgument(_) => ("InvalidArgument", Some("Run with --help to see valid arguments")),
            CommandError::MissingArgument(_) => ("MissingArgument", Some("Run with --help to see required arguments")),
            CommandError::ExecutionFailed(_) => ("ExecutionFailed", None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_unknown_names_to_text() {
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
    }

    #[test]
    fn format_error_text_is_plain_display() {
        let err = Error::Storage(StorageError::NotInitialized);
        assert_eq!(format_error(&err, OutputFormat::Text), err.to_string());
    }

    #[test]
    fn format_error_json_has_suggestion() {
        let err = Error::Storage(StorageError::NotInitialized);
        let out = format_error(&err, OutputFormat::Json);
        assert!(out.contains("\"type\": \"StorageNotInitialized\""));
        assert!(out.contains("rag-engine init"));
    }

    #[test]
    fn ingest_report_counts_chunks_in_text_output() {
        let report = IngestReport {
            files: vec![
                ("a.md".to_string(), FileOutcome::Indexed(3)),
                ("b.md".to_string(), FileOutcome::Skipped),
            ],
        };
        let out = format_ingest_report(&report, OutputFormat::Text);
        assert!(out.contains("2 files, 3 chunks written"));
    }
}
