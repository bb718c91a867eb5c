//! Command-line interface for recollect.

use clap::{Parser, Subcommand};
use recollect::config::RecollectConfig;
use recollect::embedding::{Embedder, HashEmbedder, ImageEmbedder, OpenAiEmbedder};
use recollect::ingest::{DirectorySource, MtimeExtractor};
use recollect::llm::{OpenAiClient, ReasoningProvider};
use recollect::services::{BurstGrouper, MemoryBuilder, RetrievalPipeline};
use recollect::storage::GraphStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "recollect", version, about = "A personal-memory graph engine for captured media")]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the media directory and update the persisted graphs.
    Build {
        /// Directory of raw media to ingest.
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },
    /// Query the memory graph.
    Query {
        /// The natural-language query.
        query: String,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "recollect=debug"
    } else {
        "recollect=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> recollect::Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => RecollectConfig::load_from_file(path)?,
        None => RecollectConfig::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Command::Build { media_dir } => {
            if let Some(media_dir) = media_dir {
                config.raw_media_dir = media_dir;
            }
            build(&config)
        }
        Command::Query { query } => run_query(&config, &query),
    }
}

fn build(config: &RecollectConfig) -> recollect::Result<ExitCode> {
    let builder = MemoryBuilder::new(
        Arc::new(DirectorySource::new(&config.raw_media_dir)),
        Arc::new(MtimeExtractor::new()),
        make_image_embedder(),
        make_provider(config),
        GraphStore::new(&config.data_dir),
        BurstGrouper::new(config.photo_threshold, config.screenshot_threshold),
        config.fact_merge_threshold,
    );

    let report = builder.build()?;
    println!(
        "built memory graph: {} nodes ({} scanned, {} grouped, {} enriched), \
         {} events, {} facts, cost ${:.4}",
        report.memory_graph.len(),
        report.scanned,
        report.grouped,
        report.enriched,
        report.knowledge_graph.events.event_count(),
        report.knowledge_graph.knowledge.len(),
        report.cost,
    );

    if let Some(failure) = report.phase_failure {
        eprintln!(
            "warning: {} phase failed ({}); partial progress was saved and the next build resumes from it",
            failure.phase.as_str(),
            failure.error,
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_query(config: &RecollectConfig, query: &str) -> recollect::Result<ExitCode> {
    let store = GraphStore::new(&config.data_dir);
    let memory = store.load_memory_graph()?;
    let knowledge = store.load_knowledge_graph()?;

    let mut pipeline = RetrievalPipeline::load(
        make_provider(config),
        make_embedder(config),
        &store,
        config.top_k,
    )?;
    pipeline.prepare(&memory, &knowledge)?;

    let outcome = pipeline.query(query, &memory, &knowledge)?;
    println!("[{}] {} result(s), cost ${:.4}", outcome.kind.as_str(), outcome.nodes.len(), outcome.cost);
    for key in &outcome.nodes {
        let path = memory
            .get(key.as_str())
            .map(|node| node.filepath.display().to_string())
            .unwrap_or_default();
        println!("  {key}  {path}");
    }
    if let Some(answer) = &outcome.answer {
        println!("\n{answer}");
    }
    Ok(ExitCode::SUCCESS)
}

fn make_provider(config: &RecollectConfig) -> Arc<dyn ReasoningProvider> {
    let mut client = OpenAiClient::new()
        .with_model(config.llm.model.clone())
        .with_similarity_model(config.llm.similarity_model.clone())
        .with_http_config(config.llm.http_config());
    if let Some(key) = config.resolve_api_key() {
        client = client.with_api_key(key);
    }
    if let Some(base_url) = &config.llm.base_url {
        client = client.with_endpoint(base_url.clone());
    }
    Arc::new(client)
}

fn make_embedder(config: &RecollectConfig) -> Arc<dyn Embedder> {
    match config.resolve_api_key() {
        Some(key) => {
            let mut embedder = OpenAiEmbedder::new().with_api_key(key);
            if let Some(base_url) = &config.llm.base_url {
                embedder = embedder.with_endpoint(base_url.clone());
            }
            Arc::new(embedder)
        }
        None => {
            tracing::warn!("no API key configured; using hash-based text embeddings");
            Arc::new(HashEmbedder::new())
        }
    }
}

fn make_image_embedder() -> Arc<dyn ImageEmbedder> {
    // Visual embedding models stay external; the deterministic fallback keeps
    // burst grouping functional (identical bytes still group).
    Arc::new(HashEmbedder::new())
}
