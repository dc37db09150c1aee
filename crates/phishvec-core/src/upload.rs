use std::sync::Arc;
use std::time::Duration;

use phishvec_store::{IndexSpec, VectorPoint, VectorStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::datapoint::Datapoint;
use crate::error::UploadError;

/// Result of one upsert request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub chunk_index: usize,
    pub ids: Vec<String>,
    pub upserted: usize,
    /// Every id of the chunk when the request failed, otherwise empty.
    pub failed_ids: Vec<String>,
    /// Points sent minus points acknowledged.
    pub shortfall: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub index_created: bool,
    pub dimension: usize,
    pub chunks: Vec<UpsertOutcome>,
    pub cancelled: bool,
}

impl UploadReport {
    #[must_use]
    pub fn upserted(&self) -> usize {
        self.chunks.iter().map(|c| c.upserted).sum()
    }

    #[must_use]
    pub fn failed_ids(&self) -> Vec<String> {
        self.chunks
            .iter()
            .flat_map(|c| c.failed_ids.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn shortfall(&self) -> usize {
        self.chunks.iter().map(|c| c.shortfall).sum()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.cancelled
            && self
                .chunks
                .iter()
                .all(|c| c.failed_ids.is_empty() && c.shortfall == 0)
    }
}

/// Check that every datapoint has the dimension of the first one.
///
/// # Errors
///
/// Returns an error for an empty vector or the first mismatching datapoint.
pub fn check_dimensions(datapoints: &[Datapoint]) -> Result<usize, UploadError> {
    let Some(first) = datapoints.first() else {
        return Ok(0);
    };
    let expected = first.dimension();
    if expected == 0 {
        return Err(UploadError::EmptyVector {
            id: first.id.clone(),
        });
    }
    match datapoints.iter().find(|d| d.dimension() != expected) {
        Some(d) => Err(UploadError::DimensionMismatch {
            id: d.id.clone(),
            expected,
            got: d.dimension(),
        }),
        None => Ok(expected),
    }
}

/// Writes datapoints to one index of a vector store, creating the index on demand.
pub struct Uploader {
    store: Arc<dyn VectorStore>,
    index_name: String,
    cloud: String,
    region: String,
    batch_size: usize,
    timeout: Duration,
}

impl Uploader {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, index_name: impl Into<String>) -> Self {
        Self {
            store,
            index_name: index_name.into(),
            cloud: "aws".to_owned(),
            region: "us-east-1".to_owned(),
            batch_size: 100,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn from_config(store: Arc<dyn VectorStore>, config: &StoreConfig, timeout: Duration) -> Self {
        Self::new(store, config.index_name.clone())
            .with_serverless(config.cloud.clone(), config.region.clone())
            .with_batch_size(config.upsert_batch_size)
            .with_timeout(timeout)
    }

    #[must_use]
    pub fn with_serverless(mut self, cloud: impl Into<String>, region: impl Into<String>) -> Self {
        self.cloud = cloud.into();
        self.region = region.into();
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn timed_out(&self, operation: &'static str) -> UploadError {
        UploadError::Timeout {
            operation,
            index: self.index_name.clone(),
            secs: self.timeout.as_secs(),
        }
    }

    fn index_error(&self, source: phishvec_store::VectorStoreError) -> UploadError {
        UploadError::Index {
            index: self.index_name.clone(),
            source,
        }
    }

    /// Create the index only when the store reports it absent. Returns whether it was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or the creation fails, or if an existing index
    /// holds vectors of another dimension.
    pub async fn ensure_index(&self, dimension: usize) -> Result<bool, UploadError> {
        let existing = tokio::time::timeout(self.timeout, self.store.index_dimension(&self.index_name))
            .await
            .map_err(|_| self.timed_out("index lookup"))?
            .map_err(|e| self.index_error(e))?;
        if let Some(index_dimension) = existing {
            if index_dimension != dimension as u64 {
                return Err(UploadError::IndexDimension {
                    index: self.index_name.clone(),
                    index_dimension,
                    vectors: dimension,
                });
            }
            debug!(index = %self.index_name, dimension, "index already exists");
            return Ok(false);
        }

        info!(
            index = %self.index_name,
            dimension,
            store = self.store.name(),
            "creating index"
        );
        let spec = IndexSpec::new(self.index_name.clone(), dimension as u64)
            .with_serverless(self.cloud.clone(), self.region.clone());
        self.store
            .create_index(&spec)
            .await
            .map_err(|e| self.index_error(e))?;
        Ok(true)
    }

    /// Upsert `datapoints` in chunks of the configured batch size.
    ///
    /// Failed chunks are recorded in the report and the remaining chunks still run.
    /// Cancellation stops before the next chunk.
    ///
    /// # Errors
    ///
    /// Returns an error for dimension problems, metadata encoding failures and
    /// index-level failures. No point is written in those cases.
    pub async fn upload(
        &self,
        datapoints: Vec<Datapoint>,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let mut report = UploadReport {
            dimension: check_dimensions(&datapoints)?,
            ..UploadReport::default()
        };
        if datapoints.is_empty() {
            return Ok(report);
        }

        let points = datapoints
            .into_iter()
            .map(|d| {
                let id = d.id.clone();
                d.into_point()
                    .map_err(|source| UploadError::Metadata { id, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        report.index_created = self.ensure_index(report.dimension).await?;

        let total = points.len();
        let mut points = points.into_iter().peekable();
        let mut chunk_index = 0;
        while points.peek().is_some() {
            if cancel.is_cancelled() {
                info!(chunk = chunk_index, "upload cancelled");
                report.cancelled = true;
                break;
            }
            let chunk: Vec<VectorPoint> = points.by_ref().take(self.batch_size).collect();
            report.chunks.push(self.upsert_chunk(chunk_index, chunk).await);
            chunk_index += 1;
        }

        if report.is_clean() {
            info!(
                index = %self.index_name,
                points = total,
                upserted = report.upserted(),
                chunks = report.chunks.len(),
                "upload finished"
            );
        } else {
            warn!(
                index = %self.index_name,
                points = total,
                upserted = report.upserted(),
                failed = report.failed_ids().len(),
                shortfall = report.shortfall(),
                cancelled = report.cancelled,
                "upload finished with losses"
            );
        }
        Ok(report)
    }

    async fn upsert_chunk(&self, chunk_index: usize, chunk: Vec<VectorPoint>) -> UpsertOutcome {
        let ids: Vec<String> = chunk.iter().map(|p| p.id.clone()).collect();
        let sent = chunk.len();
        let result =
            tokio::time::timeout(self.timeout, self.store.upsert(&self.index_name, chunk)).await;

        let error = match result {
            Ok(Ok(ack)) => {
                let shortfall = sent.saturating_sub(ack.upserted);
                if shortfall > 0 {
                    warn!(
                        chunk = chunk_index,
                        sent,
                        acknowledged = ack.upserted,
                        "store acknowledged fewer points than sent"
                    );
                }
                debug!(chunk = chunk_index, upserted = ack.upserted, "chunk upserted");
                return UpsertOutcome {
                    chunk_index,
                    ids,
                    upserted: ack.upserted,
                    failed_ids: Vec::new(),
                    shortfall,
                    error: None,
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => self.timed_out("upsert").to_string(),
        };

        warn!(chunk = chunk_index, points = sent, "upsert failed: {error}");
        UpsertOutcome {
            chunk_index,
            failed_ids: ids.clone(),
            ids,
            upserted: 0,
            shortfall: 0,
            error: Some(error),
        }
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("store", &self.store.name())
            .field("index_name", &self.index_name)
            .field("batch_size", &self.batch_size)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use phishvec_store::vector_store::BoxFuture;
    use phishvec_store::{InMemoryVectorStore, UpsertAck, VectorStoreError};

    use super::*;
    use crate::datapoint::DatapointMetadata;

    fn datapoint(id: &str, dimension: usize) -> Datapoint {
        Datapoint {
            id: id.to_owned(),
            values: vec![0.25; dimension],
            metadata: DatapointMetadata {
                sender: "s@example.com".into(),
                receiver: String::new(),
                subject: "subject".into(),
                body: "body".into(),
                urls: Vec::new(),
                label: String::new(),
                dataset: "generic".into(),
                chunk_index: 0,
            },
        }
    }

    fn datapoints(n: usize) -> Vec<Datapoint> {
        (0..n).map(|i| datapoint(&format!("id-{i}"), 4)).collect()
    }

    fn uploader(store: &Arc<InMemoryVectorStore>, batch_size: usize) -> Uploader {
        let store: Arc<dyn VectorStore> = store.clone();
        Uploader::new(store, "emails").with_batch_size(batch_size)
    }

    #[tokio::test]
    async fn creates_index_when_absent() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = uploader(&store, 100)
            .upload(datapoints(3), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.index_created);
        assert_eq!(store.create_calls(), 1);
        assert_eq!(store.dimension("emails"), Some(4));
        assert_eq!(report.upserted(), 3);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn existing_index_is_not_recreated() {
        let store = Arc::new(InMemoryVectorStore::new().with_index("emails", 4));
        let report = uploader(&store, 100)
            .upload(datapoints(2), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.index_created);
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.point_count("emails"), 2);
    }

    #[tokio::test]
    async fn existing_index_of_other_dimension_aborts() {
        let store = Arc::new(InMemoryVectorStore::new().with_index("emails", 8));
        let err = uploader(&store, 2)
            .upload(datapoints(5), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::IndexDimension { index_dimension: 8, vectors: 4, .. }
        ));
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn upserts_in_chunks() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = uploader(&store, 2)
            .upload(datapoints(5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.upsert_calls(), 3);
        let sizes: Vec<usize> = report.chunks.iter().map(|c| c.ids.len()).collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert_eq!(store.point_count("emails"), 5);
    }

    #[tokio::test]
    async fn failed_chunk_records_ids_and_others_continue() {
        let store = Arc::new(InMemoryVectorStore::new().failing_on_ids(["id-2"]));
        let report = uploader(&store, 2)
            .upload(datapoints(5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed_ids(), ["id-2", "id-3"]);
        assert!(report.chunks[1].error.is_some());
        assert_eq!(report.upserted(), 3);
        assert_eq!(store.point_count("emails"), 3);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn short_acknowledgement_is_a_shortfall() {
        let store = Arc::new(InMemoryVectorStore::new().with_shortfall(1));
        let report = uploader(&store, 3)
            .upload(datapoints(6), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.shortfall(), 2);
        assert_eq!(report.upserted(), 4);
        assert!(report.failed_ids().is_empty());
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn dimension_mismatch_aborts_before_any_write() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mut points = datapoints(3);
        points.push(datapoint("odd", 5));

        let err = uploader(&store, 2)
            .upload(points, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::DimensionMismatch { expected: 4, got: 5, .. }
        ));
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn empty_upload_makes_no_calls() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = uploader(&store, 2)
            .upload(Vec::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.chunks.is_empty());
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_upload_writes_nothing_more() {
        let store = Arc::new(InMemoryVectorStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = uploader(&store, 2).upload(datapoints(4), &cancel).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[test]
    fn empty_vector_is_rejected() {
        let err = check_dimensions(&[datapoint("zero", 0)]).unwrap_err();
        assert!(matches!(err, UploadError::EmptyVector { .. }));
    }

    struct BrokenStore;

    impl VectorStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn index_dimension(
            &self,
            _index: &str,
        ) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>> {
            Box::pin(async { Err(VectorStoreError::Connection("refused".into())) })
        }

        fn create_index(&self, _spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorStoreError>> {
            Box::pin(async { Ok(()) })
        }

        fn upsert(
            &self,
            _index: &str,
            _points: Vec<VectorPoint>,
        ) -> BoxFuture<'_, Result<UpsertAck, VectorStoreError>> {
            Box::pin(async { Ok(UpsertAck { upserted: 0 }) })
        }
    }

    #[tokio::test]
    async fn index_lookup_failure_aborts() {
        let uploader = Uploader::new(Arc::new(BrokenStore), "emails");
        let err = uploader
            .upload(datapoints(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Index { .. }));
        assert!(err.to_string().contains("refused"));
    }

    struct SlowStore;

    impl VectorStore for SlowStore {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn index_dimension(
            &self,
            _index: &str,
        ) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>> {
            Box::pin(async { Ok(Some(4)) })
        }

        fn create_index(&self, _spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorStoreError>> {
            Box::pin(async { Ok(()) })
        }

        fn upsert(
            &self,
            _index: &str,
            points: Vec<VectorPoint>,
        ) -> BoxFuture<'_, Result<UpsertAck, VectorStoreError>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(UpsertAck {
                    upserted: points.len(),
                })
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upsert_times_out_as_failed_chunk() {
        let uploader = Uploader::new(Arc::new(SlowStore), "emails")
            .with_timeout(Duration::from_secs(2));
        let report = uploader
            .upload(datapoints(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed_ids().len(), 2);
        assert!(report.chunks[0].error.as_deref().unwrap().contains("timed out"));
    }
}
