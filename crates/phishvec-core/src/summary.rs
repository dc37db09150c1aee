use tracing::{info, warn};

use crate::orchestrator::EmbedOutcome;
use crate::upload::UploadReport;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FATAL: u8 = 1;
pub const EXIT_PARTIAL: u8 = 2;
pub const EXIT_CANCELLED: u8 = 130;

/// Counters for one ingestion run, logged at the end and mapped to an exit code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_loaded: usize,
    pub rows_skipped: usize,
    pub records: usize,
    pub empty_bodies: usize,
    pub batches_total: usize,
    pub batches_embedded: usize,
    pub batches_failed: usize,
    pub batches_skipped: usize,
    pub vectors: usize,
    pub datapoints: usize,
    pub index_created: bool,
    pub upserted: usize,
    pub failed_upsert_ids: Vec<String>,
    pub shortfall: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub(crate) fn record_embedding(&mut self, outcome: &EmbedOutcome) {
        self.empty_bodies = outcome.empty_bodies;
        self.batches_total = outcome.batches_total;
        self.batches_embedded = outcome.batches_embedded;
        self.batches_failed = outcome.failures.len();
        self.batches_skipped = outcome.batches_skipped;
        self.vectors = outcome.units.len();
        self.cancelled |= outcome.cancelled;
    }

    pub(crate) fn record_upload(&mut self, report: &UploadReport) {
        self.index_created = report.index_created;
        self.upserted = report.upserted();
        self.failed_upsert_ids = report.failed_ids();
        self.shortfall = report.shortfall();
        self.cancelled |= report.cancelled;
    }

    /// Whether some batch or upsert did not make it into the store.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.batches_failed > 0 || !self.failed_upsert_ids.is_empty() || self.shortfall > 0
    }

    /// 130 when cancelled, 2 for partial failure, 0 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.cancelled {
            EXIT_CANCELLED
        } else if self.is_partial() {
            EXIT_PARTIAL
        } else {
            EXIT_OK
        }
    }

    pub fn log(&self) {
        info!(
            files_loaded = self.files_loaded,
            rows_skipped = self.rows_skipped,
            records = self.records,
            empty_bodies = self.empty_bodies,
            batches_total = self.batches_total,
            batches_embedded = self.batches_embedded,
            batches_failed = self.batches_failed,
            batches_skipped = self.batches_skipped,
            vectors = self.vectors,
            datapoints = self.datapoints,
            index_created = self.index_created,
            upserted = self.upserted,
            failed_upserts = self.failed_upsert_ids.len(),
            shortfall = self.shortfall,
            cancelled = self.cancelled,
            "ingestion summary"
        );
        if !self.failed_upsert_ids.is_empty() {
            warn!(ids = ?self.failed_upsert_ids, "datapoints not written");
        }
    }
}
