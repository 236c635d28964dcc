//! # rag-engine
//!
//! Iterative, agentic retrieval-augmented QA engine over Markdown corpora.
//!
//! A corpus of Markdown files is parsed into heading-structured documents,
//! split into token-budgeted chunks, embedded, and indexed into a
//! `SQLite`-backed vector store. Questions are answered by an iterative
//! researcher/fan-out/synthesize loop: a researcher model decides whether
//! retrieved context already answers the question or proposes sub-questions,
//! each sub-question is researched concurrently against the store, and a
//! main model synthesizes the final answer once the researcher is satisfied
//! or the iteration budget is exhausted.
//!
//! ## Modules
//!
//! - [`document`]: Markdown + front-matter parsing into a heading tree.
//! - [`chunking`]: splits parsed documents into token-budgeted chunks.
//! - [`embedding`]: embedding ports (local fallback and HTTP-backed).
//! - [`storage`]: `SQLite`-backed vector store.
//! - [`llm`]: chat-completions client and the three-role agent bundle.
//! - [`orchestrator`]: the researcher/fan-out/synthesize loop.
//! - [`ingest`]: directory-to-store ingestion pipeline.
//! - [`config`]: TOML configuration loader.
//! - [`cli`]: command-line front end.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod io;
pub mod llm;
pub mod orchestrator;
pub mod storage;

pub use error::{Error, Result};

pub use chunking::{Chunk, ChunkStrategy, Chunker};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use document::{Document, Section, parse_document};
pub use embedding::{DEFAULT_DIMENSIONS, EmbeddingPort, FallbackEmbedder, HttpEmbedder};
pub use ingest::{FileOutcome, IngestMode, IngestReport, ingest_directory};
pub use llm::{Agents, LlmModel};
pub use orchestrator::{Orchestrator, QAPipelineResult};
pub use storage::{DEFAULT_STORE_PATH, Distance, QueryResult, SqliteVectorStore, VectorRow, VectorStore};
