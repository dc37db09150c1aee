use std::sync::Arc;

use phishvec_dataset::DatasetLoader;
use phishvec_embed::EmbeddingProvider;
use phishvec_store::VectorStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::datapoint::build_datapoints;
use crate::error::PipelineError;
use crate::orchestrator::Orchestrator;
use crate::summary::RunSummary;
use crate::upload::Uploader;

/// Load, embed, build datapoints, upload. Each stage finishes before the next starts.
pub struct IngestPipeline<P> {
    loader: DatasetLoader,
    orchestrator: Orchestrator,
    provider: P,
    uploader: Uploader,
}

impl<P: EmbeddingProvider> IngestPipeline<P> {
    #[must_use]
    pub fn new(
        loader: DatasetLoader,
        orchestrator: Orchestrator,
        provider: P,
        uploader: Uploader,
    ) -> Self {
        Self {
            loader,
            orchestrator,
            provider,
            uploader,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, provider: P, store: Arc<dyn VectorStore>) -> Self {
        let loader = DatasetLoader::new(config.dataset.dir.clone(), config.dataset.registry())
            .with_generic_fallback(config.dataset.generic_fallback);
        let orchestrator = Orchestrator::from_config(&config.chunking, config.embedding_timeout());
        let uploader = Uploader::from_config(store, &config.store, config.store_timeout());
        Self::new(loader, orchestrator, provider, uploader)
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run every stage once.
    ///
    /// Embedding and upsert failures are counted in the summary. Cancellation
    /// stops the run before the next stage and nothing is uploaded after it.
    ///
    /// # Errors
    ///
    /// Returns an error when the dataset directory cannot be read, when an
    /// embedded unit has no record, or when the index cannot be checked or created.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        info!(dir = %self.loader.dir().display(), "loading datasets");
        let loaded = self.loader.load().await?;
        summary.files_loaded = loaded.report.files_loaded();
        summary.rows_skipped = loaded.report.rows_skipped();
        summary.records = loaded.records.len();
        info!(
            files = summary.files_loaded,
            records = summary.records,
            skipped = summary.rows_skipped,
            "datasets loaded"
        );

        if loaded.is_empty() {
            info!("no records loaded, nothing to embed");
            return Ok(summary);
        }
        if cancel.is_cancelled() {
            summary.cancelled = true;
            return Ok(summary);
        }

        let embedded = self
            .orchestrator
            .embed(&self.provider, &loaded.records, cancel)
            .await;
        summary.record_embedding(&embedded);
        if embedded.cancelled {
            info!(vectors = summary.vectors, "run cancelled, skipping upload");
            return Ok(summary);
        }

        let datapoints = build_datapoints(&loaded.records, embedded.units)?;
        summary.datapoints = datapoints.len();
        if datapoints.is_empty() {
            warn!("no vectors produced, skipping upload");
            return Ok(summary);
        }

        info!(
            datapoints = summary.datapoints,
            index = self.uploader.index_name(),
            "uploading datapoints"
        );
        let report = self.uploader.upload(datapoints, cancel).await?;
        summary.record_upload(&report);
        Ok(summary)
    }
}
