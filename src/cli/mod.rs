//! CLI layer for the RAG engine.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing the vector store, ingesting a corpus, and asking questions
//! against it.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
