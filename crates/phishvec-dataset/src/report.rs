use std::path::PathBuf;

use phishvec_schema::EmailRecord;

/// A row that failed CSV decoding or schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSkip {
    pub dataset: String,
    pub path: PathBuf,
    /// 1-based line in the source file, header included.
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub dataset: String,
    pub path: PathBuf,
    pub loaded: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files: Vec<FileReport>,
    pub skipped: Vec<RowSkip>,
}

impl LoadReport {
    #[must_use]
    pub fn files_loaded(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn rows_skipped(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub records: Vec<EmailRecord>,
    pub report: LoadReport,
}

impl LoadOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
