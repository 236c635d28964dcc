//! CLI command implementations: wires the config file to the core modules
//! and renders their results.

use std::sync::Arc;

use crate::chunking::Chunker;
use crate::cli::output::{OutputFormat, format_ingest_report, format_init, format_qa_result};
use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::embedding::{EmbeddingPort, FallbackEmbedder, HttpEmbedder, PromptTemplate};
use crate::error::{CommandError, Result};
use crate::ingest::{IngestMode, ingest_directory};
use crate::llm::{Agents, LlmModel};
use crate::orchestrator::Orchestrator;
use crate::storage::{SqliteVectorStore, VectorStore};

/// Executes the parsed CLI invocation, returning the text to print on
/// success.
///
/// # Errors
///
/// Returns whatever error the dispatched command produces: configuration
/// errors from a missing/malformed config file or API key, storage errors
/// from opening the vector store, or provider errors from a failed LLM or
/// embedding call.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    if let Commands::Init { force } = &cli.command {
        if !cli.config.exists() || *force {
            Config::write_default(&cli.config, *force)?;
        }
    }

    let config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::Init { force } => cmd_init(&config, *force, format),
        Commands::Ingest { dir, mode } => cmd_ingest(&config, dir, mode, format).await,
        Commands::Ask { query, max_iterations, context } => {
            cmd_ask(&config, query, *max_iterations, context.as_deref(), format).await
        }
    }
}

fn build_embedder(config: &Config) -> Result<Box<dyn EmbeddingPort>> {
    let embedding = &config.embedding;
    let template = embedding.prompt_template.as_deref().map(PromptTemplate::new).transpose()?;

    match (&embedding.endpoint, &embedding.api_key_env) {
        (Some(endpoint), Some(api_key_env)) => {
            let api_key = Config::resolve_api_key(api_key_env)?;
            let mut embedder = HttpEmbedder::new(
                endpoint.clone(),
                api_key,
                embedding.model.clone(),
                embedding.dimension,
                embedding.max_tokens,
            );
            if let Some(template) = template {
                embedder = embedder.with_template(template);
            }
            Ok(Box::new(embedder))
        }
        _ => {
            let mut embedder = FallbackEmbedder::new(embedding.dimension);
            if let Some(template) = template {
                embedder = embedder.with_template(template);
            }
            Ok(Box::new(embedder))
        }
    }
}

fn build_model(model: &crate::config::ModelConfig) -> Result<LlmModel> {
    let api_key = Config::resolve_api_key(&model.api_key_env)?;
    Ok(LlmModel::new(
        &model.name,
        &model.endpoint,
        api_key,
        String::new(),
        model.input_cost_per_million,
        model.output_cost_per_million,
    ))
}

fn build_agents(config: &Config) -> Result<Agents> {
    Ok(Agents::new(
        build_model(&config.main_model)?,
        build_model(&config.researcher_model)?,
        build_model(&config.query_researcher_model)?,
    ))
}

fn open_store(config: &Config, dimension: usize) -> Result<SqliteVectorStore> {
    SqliteVectorStore::open(&config.store_path, &config.collection, dimension)
}

fn cmd_init(config: &Config, force: bool, format: OutputFormat) -> Result<String> {
    let path = std::path::Path::new(&config.store_path);
    if force && path.exists() {
        std::fs::remove_file(path)
            .map_err(|e| CommandError::ExecutionFailed(format!("failed to remove existing store: {e}")))?;
    }

    let store = open_store(config, config.embedding.dimension)?;
    Ok(format_init(
        &store.path().map_or_else(|| "<in-memory>".to_string(), |p| p.display().to_string()),
        &config.collection,
        config.embedding.dimension,
        format,
    ))
}

async fn cmd_ingest(config: &Config, dir: &std::path::Path, mode: &str, format: OutputFormat) -> Result<String> {
    let mode = match mode {
        "create" => IngestMode::Create,
        "update" => IngestMode::Update,
        other => {
            return Err(CommandError::InvalidArgument(format!(
                "unknown ingest mode '{other}', expected 'create' or 'update'"
            ))
            .into());
        }
    };

    let chunker = Chunker::new(config.chunk_size, config.chunk_strategy()?);
    let embedder = build_embedder(config)?;
    let mut store = open_store(config, config.embedding.dimension)?;

    let report = ingest_directory(dir, &chunker, embedder.as_ref(), &mut store, mode).await?;
    Ok(format_ingest_report(&report, format))
}

async fn cmd_ask(
    config: &Config,
    query: &str,
    max_iterations: Option<usize>,
    context_file: Option<&std::path::Path>,
    format: OutputFormat,
) -> Result<String> {
    let global_context = context_file.map(crate::io::read_file).transpose()?;

    let agents = build_agents(config)?;
    let embedder: Arc<dyn EmbeddingPort> = Arc::from(build_embedder(config)?);
    let store: Arc<dyn VectorStore> = Arc::new(open_store(config, config.embedding.dimension)?);

    let orchestrator = Orchestrator::new(
        agents,
        embedder,
        store,
        global_context,
        max_iterations.unwrap_or(config.max_iterations),
    );

    let result = orchestrator.run(query).await?;
    Ok(format_qa_result(&result, format))
}
