//! Directory ingestion: walk a corpus, parse, chunk, embed, and index it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{info, warn};

use crate::chunking::Chunker;
use crate::document::parse_document;
use crate::embedding::EmbeddingPort;
use crate::error::Result;
use crate::storage::{VectorRow, VectorStore};

/// Whether ingestion starts from a clean collection or incrementally
/// refreshes an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Clears the collection first, then indexes every Markdown file found.
    Create,
    /// Indexes files with no existing rows or whose on-disk mtime is newer
    /// than their stored rows; leaves up-to-date files untouched.
    Update,
}

/// Per-file outcome of an ingestion run, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was (re-)indexed; carries the number of chunks written.
    Indexed(usize),
    /// The file already had up-to-date rows and was left alone.
    Skipped,
    /// The file failed to parse; ingestion continues with the next file.
    Failed(String),
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// One entry per Markdown file visited, in walk order.
    pub files: Vec<(String, FileOutcome)>,
}

impl IngestReport {
    /// Total chunks written across every indexed file.
    #[must_use]
    pub fn chunks_written(&self) -> usize {
        self.files
            .iter()
            .map(|(_, outcome)| match outcome {
                FileOutcome::Indexed(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

/// Walks `root`, indexing every `.md` file it finds into `store` via
/// `chunker` and `embedder`, per `mode`.
///
/// # Errors
///
/// Returns an error if the directory cannot be walked, or if the store
/// rejects a write (e.g. a dimension mismatch).
pub async fn ingest_directory(
    root: &Path,
    chunker: &Chunker,
    embedder: &dyn EmbeddingPort,
    store: &mut dyn VectorStore,
    mode: IngestMode,
) -> Result<IngestReport> {
    if mode == IngestMode::Create {
        store.clear()?;
    }

    let mut files = Vec::new();
    walk_markdown_files(root, &mut files)?;

    let mut report = IngestReport::default();
    for path in files {
        let display_name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();

        match ingest_file(&path, &display_name, chunker, embedder, store, mode).await {
            Ok(outcome) => {
                info!(file = %display_name, ?outcome, "ingested file");
                report.files.push((display_name, outcome));
            }
            Err(err) => {
                warn!(file = %display_name, error = %err, "failed to ingest file");
                report.files.push((display_name, FileOutcome::Failed(err.to_string())));
            }
        }
    }

    Ok(report)
}

async fn ingest_file(
    path: &Path,
    display_name: &str,
    chunker: &Chunker,
    embedder: &dyn EmbeddingPort,
    store: &mut dyn VectorStore,
    mode: IngestMode,
) -> Result<FileOutcome> {
    let mtime = file_mtime(path);

    if mode == IngestMode::Update && !needs_reindex(store, display_name, mtime)? {
        return Ok(FileOutcome::Skipped);
    }

    let source = crate::io::read_file(path)?;
    let document = parse_document(display_name, &source, mtime)
        .map_err(crate::error::Error::from)?;
    let chunks = chunker.chunk(&document);

    if chunks.is_empty() {
        if mode == IngestMode::Update {
            store.delete_file(display_name)?;
        }
        return Ok(FileOutcome::Indexed(0));
    }

    let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let embeddings = embedder.embed(&texts, None).await?;

    let rows: Vec<VectorRow> = chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| {
            let mut row = VectorRow::from_chunk(chunk, embedding);
            row.updated_at = mtime;
            row
        })
        .collect();

    if mode == IngestMode::Update {
        store.delete_file(display_name)?;
    }
    store.batch_insert(&rows, 1000)?;

    Ok(FileOutcome::Indexed(rows.len()))
}

/// True if `file_name` has no stored rows, or its stored rows predate
/// `mtime`.
fn needs_reindex(store: &dyn VectorStore, file_name: &str, mtime: Option<i64>) -> Result<bool> {
    let existing = store.get_file(file_name)?;
    if existing.is_empty() {
        return Ok(true);
    }
    let Some(mtime) = mtime else {
        return Ok(false);
    };
    Ok(existing
        .iter()
        .any(|row| row.updated_at.is_none_or(|stored| stored < mtime)))
}

fn file_mtime(path: &Path) -> Option<i64> {
    let metadata = fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    #[allow(clippy::cast_possible_wrap)]
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs() as i64;
    Some(secs)
}

/// Recursively collects every `.md` file under `dir`, in directory-read
/// order. Non-Markdown files and unreadable subdirectories are silently
/// skipped.
fn walk_markdown_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| crate::error::IoError::ReadFailed {
        path: dir.to_string_lossy().into_owned(),
        reason: e.to_string(),
    })?;

    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            walk_markdown_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md")) {
            out.push(path);
        }
    }

    Ok(())
}
