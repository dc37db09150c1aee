mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};

/// Pinecone caps a single upsert request at 1000 vectors.
pub const MAX_UPSERT_BATCH_SIZE: usize = 1000;

/// Hosted embedding models accept at most 96 inputs per request.
pub const MAX_INPUTS_PER_CALL: usize = 96;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.chunking;
        if c.batch_size == 0 {
            bail!("chunking.batch_size must be at least 1");
        }
        if c.max_body_chars == 0 {
            bail!("chunking.max_body_chars must be at least 1");
        }
        if c.concurrency == 0 {
            bail!("chunking.concurrency must be at least 1");
        }
        if !(1..=MAX_INPUTS_PER_CALL).contains(&c.max_inputs_per_call) {
            bail!(
                "chunking.max_inputs_per_call must be between 1 and {MAX_INPUTS_PER_CALL}, got {}",
                c.max_inputs_per_call
            );
        }
        if c.strategy == ChunkStrategy::Split && c.chunk_overlap >= c.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                c.chunk_overlap,
                c.chunk_size
            );
        }
        if !(1..=MAX_UPSERT_BATCH_SIZE).contains(&self.store.upsert_batch_size) {
            bail!(
                "store.upsert_batch_size must be between 1 and {MAX_UPSERT_BATCH_SIZE}, got {}",
                self.store.upsert_batch_size
            );
        }
        if self.store.index_name.trim().is_empty() {
            bail!("store.index_name must not be empty");
        }
        if self.timeouts.embedding_seconds == 0 || self.timeouts.store_seconds == 0 {
            bail!("timeouts must be at least 1 second");
        }
        if self.pinecone_api_key().is_none() {
            bail!("PINECONE_API_KEY is not set");
        }
        Ok(())
    }

    /// Embedding always goes through Pinecone inference, so the key is needed for every provider.
    #[must_use]
    pub fn pinecone_api_key(&self) -> Option<&str> {
        self.secrets
            .pinecone_api_key
            .as_ref()
            .map(Secret::expose)
    }

    #[must_use]
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.embedding_seconds)
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.store_seconds)
    }

    #[must_use]
    pub fn index_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.index_ready_seconds)
    }
}
