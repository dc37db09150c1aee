use std::time::Duration;

use futures::StreamExt;
use phishvec_embed::{EmbedError, EmbeddingProvider};
use phishvec_schema::EmailRecord;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ChunkStrategy, ChunkingConfig, MAX_INPUTS_PER_CALL};
use crate::splitter::{SplitterConfig, TextSplitter};

/// One string sent for embedding, tagged with the record and chunk it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub record_index: usize,
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedUnit {
    pub record_index: usize,
    pub chunk_index: usize,
    pub vector: Vec<f32>,
}

/// Prefix of `text` holding at most `max_chars` characters. Never splits a code point.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[derive(Debug, Clone)]
pub enum TextPreparation {
    Truncate { max_chars: usize },
    Split(TextSplitter),
}

impl TextPreparation {
    #[must_use]
    pub fn from_config(config: &ChunkingConfig) -> Self {
        match config.strategy {
            ChunkStrategy::Truncate => Self::Truncate {
                max_chars: config.max_body_chars,
            },
            ChunkStrategy::Split => Self::Split(TextSplitter::new(SplitterConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
                sentence_aware: config.sentence_aware,
            })),
        }
    }

    /// Text units for one record body. Blank bodies produce none.
    #[must_use]
    pub fn units(&self, record_index: usize, body: &str) -> Vec<TextUnit> {
        if body.trim().is_empty() {
            return Vec::new();
        }
        match self {
            Self::Truncate { max_chars } => vec![TextUnit {
                record_index,
                chunk_index: 0,
                text: truncate_chars(body, *max_chars).to_owned(),
            }],
            Self::Split(splitter) => splitter
                .split(body)
                .into_iter()
                .enumerate()
                .map(|(chunk_index, text)| TextUnit {
                    record_index,
                    chunk_index,
                    text,
                })
                .collect(),
        }
    }
}

/// A batch whose embedding call failed; its records produce no datapoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub start_record: usize,
    pub record_count: usize,
    pub unit_count: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmbedOutcome {
    /// Sorted by `(record_index, chunk_index)`.
    pub units: Vec<EmbeddedUnit>,
    pub failures: Vec<BatchFailure>,
    pub batches_total: usize,
    pub batches_embedded: usize,
    pub batches_skipped: usize,
    pub empty_bodies: usize,
    pub cancelled: bool,
}

struct Batch {
    index: usize,
    start_record: usize,
    record_count: usize,
    units: Vec<TextUnit>,
}

enum BatchResult {
    Embedded(Vec<EmbeddedUnit>),
    Failed(BatchFailure),
    Cancelled,
}

enum CallError {
    Cancelled,
    Failed(EmbedError),
}

/// Groups records into fixed-size batches and embeds them with bounded parallelism.
///
/// A batch with more units than `max_inputs` is embedded in several consecutive calls.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    preparation: TextPreparation,
    batch_size: usize,
    concurrency: usize,
    max_inputs: usize,
    call_timeout: Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(preparation: TextPreparation, batch_size: usize, call_timeout: Duration) -> Self {
        Self {
            preparation,
            batch_size: batch_size.max(1),
            concurrency: 1,
            max_inputs: MAX_INPUTS_PER_CALL,
            call_timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &ChunkingConfig, call_timeout: Duration) -> Self {
        Self::new(
            TextPreparation::from_config(config),
            config.batch_size,
            call_timeout,
        )
        .with_concurrency(config.concurrency)
        .with_max_inputs(config.max_inputs_per_call)
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_max_inputs(mut self, max_inputs: usize) -> Self {
        self.max_inputs = max_inputs.max(1);
        self
    }

    fn plan(&self, records: &[EmailRecord], outcome: &mut EmbedOutcome) -> Vec<Batch> {
        let mut batches = Vec::new();
        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            outcome.batches_total += 1;
            let start_record = index * self.batch_size;
            let mut units = Vec::new();
            for (offset, record) in chunk.iter().enumerate() {
                let produced = self.preparation.units(start_record + offset, &record.body);
                if produced.is_empty() {
                    outcome.empty_bodies += 1;
                }
                units.extend(produced);
            }
            if units.is_empty() {
                debug!(batch = index, start_record, "batch has no text, skipping");
                outcome.batches_skipped += 1;
                continue;
            }
            batches.push(Batch {
                index,
                start_record,
                record_count: chunk.len(),
                units,
            });
        }
        batches
    }

    /// Embed every record body. Failed batches are recorded and do not stop the run.
    pub async fn embed<P: EmbeddingProvider>(
        &self,
        provider: &P,
        records: &[EmailRecord],
        cancel: &CancellationToken,
    ) -> EmbedOutcome {
        let mut outcome = EmbedOutcome::default();
        let batches = self.plan(records, &mut outcome);
        info!(
            records = records.len(),
            batches = batches.len(),
            concurrency = self.concurrency,
            provider = provider.name(),
            "embedding records"
        );

        let mut results = futures::stream::iter(batches)
            .map(|batch| self.run_batch(provider, batch, cancel))
            .buffer_unordered(self.concurrency);

        while let Some(result) = results.next().await {
            match result {
                BatchResult::Embedded(units) => {
                    outcome.batches_embedded += 1;
                    outcome.units.extend(units);
                }
                BatchResult::Failed(failure) => outcome.failures.push(failure),
                BatchResult::Cancelled => outcome.cancelled = true,
            }
        }

        outcome.cancelled |= cancel.is_cancelled();
        outcome
            .units
            .sort_by_key(|u| (u.record_index, u.chunk_index));
        outcome.failures.sort_by_key(|f| f.batch_index);
        outcome
    }

    async fn run_batch<P: EmbeddingProvider>(
        &self,
        provider: &P,
        batch: Batch,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let mut vectors = Vec::with_capacity(batch.units.len());
        for call in batch.units.chunks(self.max_inputs) {
            match self.embed_call(provider, call, cancel).await {
                Ok(embedded) => vectors.extend(embedded),
                Err(CallError::Cancelled) => return BatchResult::Cancelled,
                Err(CallError::Failed(e)) => return batch_failed(&batch, &e),
            }
        }

        debug!(batch = batch.index, vectors = vectors.len(), "batch embedded");
        BatchResult::Embedded(
            batch
                .units
                .into_iter()
                .zip(vectors)
                .map(|(unit, vector)| EmbeddedUnit {
                    record_index: unit.record_index,
                    chunk_index: unit.chunk_index,
                    vector,
                })
                .collect(),
        )
    }

    /// One provider request; the vector count must match the number of texts sent.
    async fn embed_call<P: EmbeddingProvider>(
        &self,
        provider: &P,
        units: &[TextUnit],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, CallError> {
        if cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }
        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CallError::Cancelled),
            r = tokio::time::timeout(self.call_timeout, provider.embed_batch(&texts)) => r,
        };

        match result {
            Ok(Ok(vectors)) if vectors.len() == units.len() => Ok(vectors),
            Ok(Ok(vectors)) => Err(CallError::Failed(EmbedError::CountMismatch {
                provider: provider.name(),
                expected: units.len(),
                got: vectors.len(),
            })),
            Ok(Err(e)) => Err(CallError::Failed(e)),
            Err(_) => Err(CallError::Failed(EmbedError::Timeout(
                self.call_timeout.as_secs(),
            ))),
        }
    }
}

fn batch_failed(batch: &Batch, error: &EmbedError) -> BatchResult {
    warn!(
        batch = batch.index,
        start_record = batch.start_record,
        records = batch.record_count,
        "embedding batch failed: {error}"
    );
    BatchResult::Failed(BatchFailure {
        batch_index: batch.index,
        start_record: batch.start_record,
        record_count: batch.record_count,
        unit_count: batch.units.len(),
        error: error.to_string(),
    })
}
