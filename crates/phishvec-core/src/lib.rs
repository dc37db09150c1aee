//! Configuration, batch orchestration and the ingestion pipeline.

pub mod config;
pub mod datapoint;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod splitter;
pub mod summary;
pub mod upload;

pub use config::Config;
pub use datapoint::{Datapoint, DatapointMetadata, build_datapoints};
pub use error::{DatapointError, PipelineError, UploadError};
pub use orchestrator::{
    BatchFailure, EmbedOutcome, EmbeddedUnit, Orchestrator, TextPreparation, TextUnit,
    truncate_chars,
};
pub use pipeline::IngestPipeline;
pub use splitter::{SplitterConfig, TextSplitter};
pub use summary::RunSummary;
pub use upload::{UploadReport, Uploader, UpsertOutcome};
