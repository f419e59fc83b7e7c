use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex as TokioMutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use castwise::config::Config;
use castwise::embedder::onnx::OnnxEmbedder;
use castwise::embedder::{download, Embedder};
use castwise::index::builder::IndexBuilder;
use castwise::index::Db;
use castwise::llm::LlmRouter;
use castwise::pipeline::QueryPipeline;
use castwise::server;

#[derive(Parser)]
#[command(name = "castwise", version, about = "Podcast transcript Q&A server")]
struct Cli {
    /// Path to config.json
    #[arg(short, long, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Build the vector index from pre-chunked episode files
    Index {
        /// Directory of episode *.json files (defaults to config value)
        #[arg(short, long)]
        transcripts: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    config.validate()?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Index { transcripts } => {
            let dir = transcripts.unwrap_or_else(|| config.transcripts_dir.clone());
            // model download and ONNX inference are blocking
            tokio::task::spawn_blocking(move || build_index(&config, &dir)).await?
        }
    }
}

fn load_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let model_dir = Path::new(&config.model.dir);
    download::download_model_files(model_dir).context("failed to fetch embedding model")?;

    let embedder = OnnxEmbedder::new(model_dir).context("failed to load embedding model")?;
    anyhow::ensure!(
        embedder.dimensions() == config.model.dimensions,
        "model dimensionality {} does not match configured {}",
        embedder.dimensions(),
        config.model.dimensions
    );
    Ok(Arc::new(embedder))
}

fn build_index(config: &Config, transcripts_dir: &str) -> Result<()> {
    let embedder = load_embedder(config)?;
    let mut db = Db::open(&config.db_path).context("failed to open index database")?;

    let stats = IndexBuilder::new(&mut db, embedder.as_ref())
        .build_from_dir(Path::new(transcripts_dir))?;

    println!(
        "Indexed {} videos: {} core chunks, {} longtail chunks ({} dropped as junk)",
        stats.videos,
        stats.classify.content,
        stats.classify.anecdote,
        stats.classify.total - stats.classify.embeddable()
    );
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting castwise server...");

    // A missing or empty index is a startup failure, not a per-query one.
    let db = Db::open(&config.db_path).context("index unavailable")?;
    let videos = db.video_count().context("index unavailable")?;
    anyhow::ensure!(
        videos > 0,
        "index is empty; run `castwise index` before serving"
    );
    info!("Index ready: {videos} videos");
    let db = Arc::new(TokioMutex::new(db));

    let embedder = {
        let cfg = config.clone();
        tokio::task::spawn_blocking(move || load_embedder(&cfg)).await??
    };
    let llm = Arc::new(LlmRouter::from_config(&config.llm)?);
    info!("Completion chain ready (primary: {})", llm.primary_name());

    let pipeline = Arc::new(QueryPipeline::new(
        Arc::clone(&db),
        embedder,
        llm,
        config.clone(),
    ));

    server::serve(&config, pipeline, db).await
}
