//! Qdrant collection backend.

use std::collections::HashMap;
use std::time::Duration;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CollectionInfo, CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder,
    VectorParamsBuilder,
};

use crate::vector_store::{
    BoxFuture, IndexSpec, UpsertAck, VectorPoint, VectorStore, VectorStoreError,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Thin wrapper over [`Qdrant`] exposing collections as indexes.
#[derive(Clone)]
pub struct QdrantStore {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore").finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Create a new `QdrantStore` connected to the given gRPC URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> QdrantResult<Self> {
        let mut builder = Qdrant::from_url(url).timeout(timeout);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(Box::new)?;
        Ok(Self { client })
    }

    async fn collection_exists(&self, collection: &str) -> QdrantResult<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(Box::new)
    }

    async fn collection_dimension(&self, collection: &str) -> Result<Option<u64>, VectorStoreError> {
        let connection = |e: qdrant_client::QdrantError| VectorStoreError::Connection(e.to_string());
        if !self.client.collection_exists(collection).await.map_err(connection)? {
            return Ok(None);
        }
        let response = self
            .client
            .collection_info(collection)
            .await
            .map_err(connection)?;
        response
            .result
            .as_ref()
            .and_then(vector_size)
            .map(Some)
            .ok_or_else(|| {
                VectorStoreError::Index(format!("collection {collection} reports no vector size"))
            })
    }

    async fn create_collection(&self, collection: &str, vector_size: u64) -> QdrantResult<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<PointStruct>) -> QdrantResult<()> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Convert a JSON payload to a Qdrant payload map.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if deserialization fails.
    pub fn json_to_payload(
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect()))
    }
}

/// Size of the unnamed vector, or of the first named one.
fn vector_size(info: &CollectionInfo) -> Option<u64> {
    let kind = info
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?;
    match kind {
        VectorsConfigKind::Params(params) => Some(params.size),
        VectorsConfigKind::ParamsMap(named) => named.map.values().next().map(|p| p.size),
    }
}

impl VectorStore for QdrantStore {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    fn index_dimension(&self, index: &str) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>> {
        let index = index.to_owned();
        Box::pin(async move { self.collection_dimension(&index).await })
    }

    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let spec = spec.clone();
        Box::pin(async move {
            tracing::info!(collection = %spec.name, dimension = spec.dimension, "creating collection");
            if let Err(e) = self.create_collection(&spec.name, spec.dimension).await {
                // created concurrently by another writer
                if self.collection_exists(&spec.name).await.unwrap_or(false) {
                    return Ok(());
                }
                return Err(VectorStoreError::Index(e.to_string()));
            }
            Ok(())
        })
    }

    fn upsert(
        &self,
        index: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<UpsertAck, VectorStoreError>> {
        let index = index.to_owned();
        Box::pin(async move {
            let count = points.len();
            let mut qdrant_points = Vec::with_capacity(count);
            for p in points {
                let payload = Self::json_to_payload(p.payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                qdrant_points.push(PointStruct::new(p.id, p.vector, payload));
            }
            self.upsert_points(&index, qdrant_points)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            Ok(UpsertAck { upserted: count })
        })
    }
}
