use phishvec_dataset::DatasetError;
use phishvec_store::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum DatapointError {
    #[error("embedded unit refers to record {record_index}, but only {records} records were loaded")]
    DanglingUnit { record_index: usize, records: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("datapoint {id} has an empty vector")]
    EmptyVector { id: String },

    #[error("datapoint {id} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        got: usize,
    },

    #[error("index {index} has dimension {index_dimension}, but the vectors have dimension {vectors}")]
    IndexDimension {
        index: String,
        index_dimension: u64,
        vectors: usize,
    },

    #[error("index {index}: {source}")]
    Index {
        index: String,
        #[source]
        source: VectorStoreError,
    },

    #[error("{operation} on index {index} timed out after {secs}s")]
    Timeout {
        operation: &'static str,
        index: String,
        secs: u64,
    },

    #[error("failed to encode metadata for datapoint {id}: {source}")]
    Metadata {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("dataset load failed: {0}")]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Datapoint(#[from] DatapointError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),
}
