use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("index error: {0}")]
    Index(String),
    #[error("index {index} not ready after {waited_secs}s")]
    NotReady { index: String, waited_secs: u64 },
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("API key for {provider} is not set")]
    MissingApiKey { provider: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Parameters for a new serverless index. Distance is always cosine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: u64,
    pub cloud: String,
    pub region: String,
}

impl IndexSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, dimension: u64) -> Self {
        Self {
            name: name.into(),
            dimension,
            cloud: "aws".to_owned(),
            region: "us-east-1".to_owned(),
        }
    }

    #[must_use]
    pub fn with_serverless(mut self, cloud: impl Into<String>, region: impl Into<String>) -> Self {
        self.cloud = cloud.into();
        self.region = region.into();
        self
    }
}

/// Store acknowledgement for one upsert request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertAck {
    pub upserted: usize,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Vector dimension of `index`, or `None` when the index does not exist.
    fn index_dimension(&self, index: &str) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>>;

    /// Create the index and return once it accepts writes.
    ///
    /// Creating an index that already exists is not an error.
    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn upsert(
        &self,
        index: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<UpsertAck, VectorStoreError>>;
}
