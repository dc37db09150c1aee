use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use phishvec_core::config::StoreProvider;
use phishvec_core::summary::EXIT_FATAL;
use phishvec_core::{Config, IngestPipeline, RunSummary};
use phishvec_embed::{PineconeEmbedder, RetryPolicy};
use phishvec_store::{PineconeStore, QdrantStore, VectorStore};
use tokio_util::sync::CancellationToken;

const INDEX_READY_POLL: std::time::Duration = std::time::Duration::from_secs(2);

/// Embed labeled email datasets and upsert them into a vector index.
#[derive(Debug, Parser)]
#[command(name = "phishvec", version, about)]
struct Args {
    /// Configuration file (falls back to `PHISHVEC_CONFIG`, then `config/default.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("PHISHVEC_CONFIG")
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_store(config: &Config, client: &reqwest::Client) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.store.provider {
        StoreProvider::Pinecone => {
            let key = config
                .pinecone_api_key()
                .context("PINECONE_API_KEY is not set")?;
            let store = PineconeStore::new(client.clone(), key)
                .with_control_url(config.store.control_url.clone())
                .with_retry(RetryPolicy::new(config.retry.max_retries))
                .with_ready_timeout(config.index_ready_timeout(), INDEX_READY_POLL);
            Ok(Arc::new(store))
        }
        StoreProvider::Qdrant => {
            let key = config
                .secrets
                .qdrant_api_key
                .as_ref()
                .map(|s| s.expose().to_owned());
            let store = QdrantStore::new(&config.store.qdrant_url, key, config.store_timeout())
                .with_context(|| format!("failed to connect to qdrant at {}", config.store.qdrant_url))?;
            Ok(Arc::new(store))
        }
    }
}

fn build_embedder(config: &Config, client: reqwest::Client) -> anyhow::Result<PineconeEmbedder> {
    let key = config
        .pinecone_api_key()
        .context("PINECONE_API_KEY is not set")?;
    Ok(PineconeEmbedder::new(client, key)
        .with_base_url(config.embedding.base_url.clone())
        .with_model(config.embedding.model.clone())
        .with_input_type(config.embedding.input_type.clone())
        .with_truncate(config.embedding.truncate.clone())
        .with_retry(RetryPolicy::new(config.retry.max_retries)))
}

/// Per-request timeout for the shared client, below the tightest per-call budget so
/// that a timed-out request can still be retried.
fn client_request_timeout(config: &Config) -> std::time::Duration {
    let budget = config.embedding_timeout().min(config.store_timeout());
    phishvec_embed::http::request_timeout(budget, config.retry.max_retries)
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal, cancelling run");
        cancel.cancel();
    });
}

async fn run(args: Args) -> anyhow::Result<RunSummary> {
    let config_path = resolve_config_path(args.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    config.validate()?;
    tracing::info!(
        config = %config_path.display(),
        store = ?config.store.provider,
        index = %config.store.index_name,
        strategy = ?config.chunking.strategy,
        "starting ingestion"
    );

    let client = phishvec_embed::http::build_client(client_request_timeout(&config))
        .context("failed to build HTTP client")?;
    let store = build_store(&config, &client)?;
    let embedder = build_embedder(&config, client)?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let pipeline = IngestPipeline::from_config(&config, embedder, store);
    let summary = pipeline.run(&cancel).await?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_subscriber();
    let args = Args::parse();

    match run(args).await {
        Ok(summary) => {
            summary.log();
            ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
