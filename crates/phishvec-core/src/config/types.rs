use std::fmt;
use std::path::PathBuf;

use phishvec_dataset::{DatasetRegistry, RegistryEntry};
use serde::{Deserialize, Serialize};

/// Credential that never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("datasets")
}

fn default_true() -> bool {
    true
}

fn default_registry() -> Vec<RegistryEntry> {
    DatasetRegistry::builtin().entries().to_vec()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub generic_fallback: bool,
    #[serde(default = "default_registry")]
    pub registry: Vec<RegistryEntry>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dir: default_dataset_dir(),
            generic_fallback: true,
            registry: default_registry(),
        }
    }
}

impl DatasetConfig {
    #[must_use]
    pub fn registry(&self) -> DatasetRegistry {
        DatasetRegistry::new(self.registry.clone())
    }
}

fn default_embedding_base_url() -> String {
    phishvec_embed::pinecone::DEFAULT_BASE_URL.to_owned()
}

fn default_embedding_model() -> String {
    phishvec_embed::pinecone::DEFAULT_MODEL.to_owned()
}

fn default_input_type() -> String {
    "passage".into()
}

fn default_truncate() -> String {
    "END".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_input_type")]
    pub input_type: String,
    #[serde(default = "default_truncate")]
    pub truncate: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            input_type: default_input_type(),
            truncate: default_truncate(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// One unit per record: the body cut to `max_body_chars`.
    #[default]
    Truncate,
    /// Overlapping chunks from the text splitter.
    Split,
}

fn default_batch_size() -> usize {
    5
}

fn default_max_body_chars() -> usize {
    1500
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_concurrency() -> usize {
    1
}

fn default_max_inputs_per_call() -> usize {
    96
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub strategy: ChunkStrategy,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub sentence_aware: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Texts per embedding request. A batch with more units is sent as several requests.
    #[serde(default = "default_max_inputs_per_call")]
    pub max_inputs_per_call: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::default(),
            batch_size: default_batch_size(),
            max_body_chars: default_max_body_chars(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            sentence_aware: true,
            concurrency: default_concurrency(),
            max_inputs_per_call: default_max_inputs_per_call(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    #[default]
    Pinecone,
    Qdrant,
}

fn default_index_name() -> String {
    "fraud-email-index".into()
}

fn default_cloud() -> String {
    "aws".into()
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_upsert_batch_size() -> usize {
    100
}

fn default_control_url() -> String {
    phishvec_store::pinecone::DEFAULT_CONTROL_URL.to_owned()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub provider: StoreProvider,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::default(),
            index_name: default_index_name(),
            cloud: default_cloud(),
            region: default_region(),
            upsert_batch_size: default_upsert_batch_size(),
            control_url: default_control_url(),
            qdrant_url: default_qdrant_url(),
        }
    }
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_store_timeout() -> u64 {
    30
}

fn default_index_ready_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_store_timeout")]
    pub store_seconds: u64,
    #[serde(default = "default_index_ready_timeout")]
    pub index_ready_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_seconds: default_embedding_timeout(),
            store_seconds: default_store_timeout(),
            index_ready_seconds: default_index_ready_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub pinecone_api_key: Option<Secret>,
    pub qdrant_api_key: Option<Secret>,
}
