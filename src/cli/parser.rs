//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Iterative agentic retrieval-augmented QA engine over Markdown corpora.
#[derive(Parser, Debug)]
#[command(name = "rag-engine", version, about, propagate_version = true)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "RAG_ENGINE_CONFIG", default_value = "rag-engine.toml")]
    pub config: PathBuf,

    /// Output format: `text`, `json`, or `ndjson`.
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Emit verbose (debug-level) logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Creates the vector store collection described by the config file.
    Init {
        /// Overwrite an existing store file.
        #[arg(long)]
        force: bool,
    },

    /// Walks a directory of Markdown files, chunking, embedding, and
    /// indexing them into the vector store.
    Ingest {
        /// Root directory to walk.
        #[arg(long)]
        dir: PathBuf,

        /// `create` clears the collection first; `update` only (re)indexes
        /// changed files.
        #[arg(long, default_value = "update")]
        mode: String,
    },

    /// Answers a question against the indexed corpus via the
    /// researcher/fan-out/synthesize loop.
    Ask {
        /// The question to answer.
        query: String,

        /// Upper bound on researcher iterations.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// File whose contents are prepended to every researcher prompt as
        /// global context.
        #[arg(long)]
        context: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ingest_defaults_to_update_mode() {
        let cli = Cli::parse_from(["rag-engine", "ingest", "--dir", "docs"]);
        match cli.command {
            Commands::Ingest { mode, .. } => assert_eq!(mode, "update"),
            _ => panic!("expected Ingest"),
        }
    }

    #[test]
    fn ask_parses_query_and_flags() {
        let cli = Cli::parse_from([
            "rag-engine",
            "ask",
            "what is the treaty clause?",
            "--max-iterations",
            "5",
        ]);
        match cli.command {
            Commands::Ask { query, max_iterations, context } => {
                assert_eq!(query, "what is the treaty clause?");
                assert_eq!(max_iterations, Some(5));
                assert!(context.is_none());
            }
            _ => panic!("expected Ask"),
        }
    }
}
