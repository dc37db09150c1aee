use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::vector_store::{
    BoxFuture, IndexSpec, UpsertAck, VectorPoint, VectorStore, VectorStoreError,
};

struct InMemoryIndex {
    dimension: u64,
    points: HashMap<String, VectorPoint>,
}

/// Process-local store for tests and dry runs.
pub struct InMemoryVectorStore {
    indexes: RwLock<HashMap<String, InMemoryIndex>>,
    create_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    fail_ids: Vec<String>,
    drop_per_upsert: usize,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            create_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            fail_ids: Vec::new(),
            drop_per_upsert: 0,
        }
    }

    /// Reject any upsert request that carries one of `ids`.
    #[must_use]
    pub fn failing_on_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fail_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Acknowledge `n` fewer points than received on every upsert.
    #[must_use]
    pub fn with_shortfall(mut self, n: usize) -> Self {
        self.drop_per_upsert = n;
        self
    }

    /// Pre-create an index, as if it already existed remotely.
    #[must_use]
    pub fn with_index(self, name: &str, dimension: u64) -> Self {
        if let Ok(mut indexes) = self.indexes.write() {
            indexes.insert(
                name.to_owned(),
                InMemoryIndex {
                    dimension,
                    points: HashMap::new(),
                },
            );
        }
        self
    }

    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dimension(&self, index: &str) -> Option<u64> {
        self.indexes.read().ok()?.get(index).map(|i| i.dimension)
    }

    #[must_use]
    pub fn points(&self, index: &str) -> Vec<VectorPoint> {
        self.indexes
            .read()
            .ok()
            .and_then(|indexes| {
                indexes
                    .get(index)
                    .map(|i| i.points.values().cloned().collect())
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn point_count(&self, index: &str) -> usize {
        self.indexes
            .read()
            .ok()
            .and_then(|indexes| indexes.get(index).map(|i| i.points.len()))
            .unwrap_or(0)
    }

    fn upsert_sync(&self, index: &str, points: Vec<VectorPoint>) -> Result<UpsertAck, VectorStoreError> {
        if let Some(id) = points
            .iter()
            .map(|p| &p.id)
            .find(|id| self.fail_ids.contains(id))
        {
            return Err(VectorStoreError::Upsert(format!("rejected point {id}")));
        }
        let mut indexes = self
            .indexes
            .write()
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
        let target = indexes
            .get_mut(index)
            .ok_or_else(|| VectorStoreError::Index(format!("index {index} not found")))?;

        let received = points.len();
        let keep = received.saturating_sub(self.drop_per_upsert);
        for point in points.into_iter().take(keep) {
            if point.vector.len() as u64 != target.dimension {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has dimension {}, index expects {}",
                    point.id,
                    point.vector.len(),
                    target.dimension
                )));
            }
            target.points.insert(point.id.clone(), point);
        }
        Ok(UpsertAck { upserted: keep })
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("create_calls", &self.create_calls())
            .finish_non_exhaustive()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn index_dimension(&self, index: &str) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>> {
        let dimension = self
            .indexes
            .read()
            .map(|indexes| indexes.get(index).map(|i| i.dimension))
            .map_err(|e| VectorStoreError::Connection(e.to_string()));
        Box::pin(async move { dimension })
    }

    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        let result = self
            .indexes
            .write()
            .map(|mut indexes| {
                indexes
                    .entry(spec.name.clone())
                    .or_insert_with(|| InMemoryIndex {
                        dimension: spec.dimension,
                        points: HashMap::new(),
                    });
            })
            .map_err(|e| VectorStoreError::Index(e.to_string()));
        Box::pin(async move { result })
    }

    fn upsert(
        &self,
        index: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<UpsertAck, VectorStoreError>> {
        self.upsert_calls.fetch_add(1, Ordering::Relaxed);
        let result = self.upsert_sync(index, points);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, dim: usize) -> VectorPoint {
        VectorPoint {
            id: id.to_owned(),
            vector: vec![0.5; dim],
            payload: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn create_then_exists() {
        let store = InMemoryVectorStore::new();
        assert_eq!(store.index_dimension("idx").await.unwrap(), None);
        store.create_index(&IndexSpec::new("idx", 3)).await.unwrap();
        assert_eq!(store.index_dimension("idx").await.unwrap(), Some(3));
        assert_eq!(store.dimension("idx"), Some(3));
        assert_eq!(store.create_calls(), 1);
    }

    #[tokio::test]
    async fn upsert_into_missing_index_fails() {
        let store = InMemoryVectorStore::new();
        let err = store.upsert("idx", vec![point("a", 3)]).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Index(_)));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let store = InMemoryVectorStore::new().with_index("idx", 2);
        store.upsert("idx", vec![point("a", 2), point("b", 2)]).await.unwrap();
        let ack = store.upsert("idx", vec![point("a", 2)]).await.unwrap();
        assert_eq!(ack.upserted, 1);
        assert_eq!(store.point_count("idx"), 2);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let store = InMemoryVectorStore::new().with_index("idx", 2);
        assert!(store.upsert("idx", vec![point("a", 4)]).await.is_err());
    }

    #[tokio::test]
    async fn configured_failures_and_shortfall() {
        let store = InMemoryVectorStore::new()
            .with_index("idx", 2)
            .failing_on_ids(["bad"])
            .with_shortfall(1);
        assert!(store.upsert("idx", vec![point("bad", 2)]).await.is_err());
        let ack = store
            .upsert("idx", vec![point("a", 2), point("b", 2)])
            .await
            .unwrap();
        assert_eq!(ack.upserted, 1);
        assert_eq!(store.upsert_calls(), 2);
    }
}
