use std::path::{Path, PathBuf};

use phishvec_schema::{DatasetKind, EmailRecord, Header, Row, RowError, RowSchema};
use tracing::{debug, info, warn};

use crate::{DatasetError, DatasetRegistry, FileReport, LoadOutcome, RowSkip};

/// Default maximum dataset file size: 512 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Reads registered datasets, then any other `.csv` file in the directory as generic email rows.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    dir: PathBuf,
    registry: DatasetRegistry,
    generic_fallback: bool,
    max_file_size: u64,
}

impl DatasetLoader {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, registry: DatasetRegistry) -> Self {
        Self {
            dir: dir.into(),
            registry,
            generic_fallback: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    #[must_use]
    pub fn with_generic_fallback(mut self, enabled: bool) -> Self {
        self.generic_fallback = enabled;
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load on the blocking pool.
    ///
    /// # Errors
    ///
    /// See [`DatasetLoader::load_blocking`].
    pub async fn load(&self) -> Result<LoadOutcome, DatasetError> {
        let loader = self.clone();
        tokio::task::spawn_blocking(move || loader.load_blocking())
            .await
            .map_err(|e| DatasetError::Join(e.to_string()))?
    }

    /// Registry entries in declaration order, then unclaimed CSV files sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read, exceeds the size limit,
    /// or the dataset directory exists but cannot be listed. Invalid rows are not errors.
    pub fn load_blocking(&self) -> Result<LoadOutcome, DatasetError> {
        let mut outcome = LoadOutcome::default();
        let mut claimed = Vec::with_capacity(self.registry.len());

        for entry in self.registry.entries() {
            let path = self.dir.join(&entry.file);
            if !path.is_file() {
                debug!(dataset = %entry.name, path = %path.display(), "registered dataset not found, skipping");
                continue;
            }
            claimed.push(canonical(&path));
            info!(dataset = %entry.name, path = %path.display(), "loading dataset");
            self.load_file(&entry.name, entry.kind, &path, &mut outcome)?;
        }

        if self.generic_fallback {
            for path in self.unclaimed_csv_files(&claimed)? {
                let name = path
                    .file_stem()
                    .map_or_else(|| "generic".to_owned(), |s| s.to_string_lossy().into_owned());
                info!(dataset = %name, path = %path.display(), "loading generic CSV");
                self.load_file(&name, DatasetKind::Generic, &path, &mut outcome)?;
            }
        }

        info!(
            files = outcome.report.files_loaded(),
            records = outcome.records.len(),
            skipped = outcome.report.rows_skipped(),
            "dataset load complete"
        );
        Ok(outcome)
    }

    fn unclaimed_csv_files(&self, claimed: &[PathBuf]) -> Result<Vec<PathBuf>, DatasetError> {
        if !self.dir.is_dir() {
            debug!(dir = %self.dir.display(), "dataset directory missing, no generic files");
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|source| DatasetError::ReadDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DatasetError::ReadDir {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv && path.is_file() && !claimed.contains(&canonical(&path)) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    fn load_file(
        &self,
        dataset: &str,
        kind: DatasetKind,
        path: &Path,
        outcome: &mut LoadOutcome,
    ) -> Result<(), DatasetError> {
        let io_err = |source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > self.max_file_size {
            return Err(DatasetError::FileTooLarge {
                path: path.to_path_buf(),
                size,
            });
        }
        let bytes = std::fs::read(path).map_err(io_err)?;
        let text = decode_lossy(&bytes);

        let before_records = outcome.records.len();
        let before_skips = outcome.report.skipped.len();
        parse_rows(
            &text,
            kind.schema(),
            dataset,
            path,
            &mut outcome.records,
            &mut outcome.report.skipped,
        )?;

        let file = FileReport {
            dataset: dataset.to_owned(),
            path: path.to_path_buf(),
            loaded: outcome.records.len() - before_records,
            skipped: outcome.report.skipped.len() - before_skips,
        };
        debug!(dataset, loaded = file.loaded, skipped = file.skipped, "file loaded");
        outcome.report.files.push(file);
        Ok(())
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
#[must_use]
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

fn parse_rows(
    text: &str,
    schema: &dyn RowSchema,
    dataset: &str,
    path: &Path,
    records: &mut Vec<EmailRecord>,
    skipped: &mut Vec<RowSkip>,
) -> Result<(), DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let header = reader
        .headers()
        .map(|h| Header::new(h.iter()))
        .map_err(|e| DatasetError::Header {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut skip = |line: u64, reason: &RowError| {
        warn!(dataset, path = %path.display(), line, %reason, "skipping invalid row");
        skipped.push(RowSkip {
            dataset: dataset.to_owned(),
            path: path.to_path_buf(),
            line,
            reason: reason.to_string(),
        });
    };

    for result in reader.records() {
        match result {
            Ok(record) => {
                let line = record.position().map_or(0, csv::Position::line);
                let row = Row::new(&header, record.iter().collect());
                match schema.parse(&row, dataset) {
                    Ok(email) => records.push(email),
                    Err(e) => skip(line, &e),
                }
            }
            Err(e) => {
                let line = e.position().map_or(0, csv::Position::line);
                skip(line, &RowError::Malformed(e.to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistryEntry;
    use proptest::prelude::*;

    const GENERIC_HEADER: &str = "sender,receiver,subject,body,urls,label\n";

    fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn loads_registered_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "spam_assassin.csv",
            b"sender,receiver,date,subject,body,label,urls\n\
              a@x.example,b@y.example,today,Win,claim at http://win.example,1,1\n\
              c@x.example,d@y.example,today,Lunch,see you,0,0\n",
        );

        let loader = DatasetLoader::new(dir.path(), DatasetRegistry::builtin());
        let outcome = loader.load().await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].label.as_deref(), Some("spam"));
        assert_eq!(outcome.records[0].urls, ["http://win.example"]);
        assert_eq!(outcome.records[1].label.as_deref(), Some("legitimate"));
        assert_eq!(outcome.report.files_loaded(), 1);
        assert_eq!(outcome.report.files[0].dataset, "spam_assassin");
    }

    #[test]
    fn invalid_rows_are_skipped_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = GENERIC_HEADER.to_owned();
        content.push_str("a@x,b@y,hello,body one,,phishing\n");
        content.push_str("only-sender\n");
        content.push_str("c@x,d@y,hey,body two,,\n");
        write(dir.path(), "mixed.csv", content.as_bytes());

        let outcome = DatasetLoader::new(dir.path(), DatasetRegistry::default())
            .load_blocking()
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.report.skipped.len(), 1);
        let skip = &outcome.report.skipped[0];
        assert_eq!(skip.line, 3);
        assert_eq!(skip.dataset, "mixed");
        assert!(skip.reason.contains("receiver"));
        assert!(outcome.records.iter().all(|r| r.body != "only-sender"));
    }

    #[test]
    fn missing_registered_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DatasetRegistry::new(vec![RegistryEntry::new(
            "absent",
            DatasetKind::NigerianFraud,
            "absent.csv",
        )]);
        let outcome = DatasetLoader::new(dir.path(), registry)
            .load_blocking()
            .unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.report.files.is_empty());
        assert!(outcome.report.skipped.is_empty());
    }

    #[test]
    fn registered_file_not_reloaded_as_generic() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ling_spam.csv",
            b"subject,body,label\njob,apply today,1\n",
        );
        let outcome = DatasetLoader::new(dir.path(), DatasetRegistry::builtin())
            .load_blocking()
            .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].dataset, "ling_spam");
        assert!(outcome.report.skipped.is_empty());
    }

    #[test]
    fn generic_files_follow_registry_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let row = |subject: &str| format!("{GENERIC_HEADER}a,b,{subject},text,,\n");
        write(dir.path(), "zeta.csv", row("z").as_bytes());
        write(dir.path(), "alpha.CSV", row("a").as_bytes());
        write(dir.path(), "notes.txt", b"ignored");
        write(
            dir.path(),
            "nigerian_fraud.csv",
            b"sender,subject,body,label\nprince@x,Funds,send fee,1\n",
        );

        let outcome = DatasetLoader::new(dir.path(), DatasetRegistry::builtin())
            .load_blocking()
            .unwrap();
        let subjects: Vec<_> = outcome.records.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, ["Funds", "a", "z"]);
    }

    #[test]
    fn generic_fallback_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "extra.csv",
            format!("{GENERIC_HEADER}a,b,c,d,,\n").as_bytes(),
        );
        let outcome = DatasetLoader::new(dir.path(), DatasetRegistry::builtin())
            .with_generic_fallback(false)
            .load_blocking()
            .unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn missing_directory_yields_empty_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = DatasetLoader::new(dir.path().join("nope"), DatasetRegistry::builtin())
            .load_blocking()
            .unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn invalid_utf8_bytes_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = GENERIC_HEADER.as_bytes().to_vec();
        content.extend_from_slice(b"a,b,caf\xff\xfee,body,,\n");
        write(dir.path(), "bytes.csv", &content);

        let outcome = DatasetLoader::new(dir.path(), DatasetRegistry::default())
            .load_blocking()
            .unwrap();
        assert_eq!(outcome.records[0].subject, "cafe");
    }

    #[test]
    fn oversized_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "big.csv",
            format!("{GENERIC_HEADER}a,b,c,d,,\n").as_bytes(),
        );
        let err = DatasetLoader::new(dir.path(), DatasetRegistry::default())
            .with_max_file_size(4)
            .load_blocking()
            .unwrap_err();
        assert!(matches!(err, DatasetError::FileTooLarge { .. }));
    }

    #[test]
    fn header_only_file_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.csv", GENERIC_HEADER.as_bytes());
        let outcome = DatasetLoader::new(dir.path(), DatasetRegistry::default())
            .load_blocking()
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.report.files_loaded(), 1);
    }

    #[test]
    fn decode_lossy_keeps_valid_text() {
        assert_eq!(decode_lossy("héllo".as_bytes()), "héllo");
        assert_eq!(decode_lossy(b"\x80ok\xc3"), "ok");
    }

    proptest! {
        #[test]
        fn records_plus_skips_equal_rows(valid in prop::collection::vec(any::<bool>(), 0..30)) {
            let dir = tempfile::tempdir().unwrap();
            let mut content = GENERIC_HEADER.to_owned();
            for (i, ok) in valid.iter().enumerate() {
                if *ok {
                    content.push_str(&format!("s{i},r{i},subj{i},body,,\n"));
                } else {
                    content.push_str(&format!("s{i}\n"));
                }
            }
            write(dir.path(), "data.csv", content.as_bytes());

            let outcome = DatasetLoader::new(dir.path(), DatasetRegistry::default())
                .load_blocking()
                .unwrap();
            let expected = valid.iter().filter(|ok| **ok).count();
            prop_assert_eq!(outcome.records.len(), expected);
            prop_assert_eq!(outcome.report.skipped.len(), valid.len() - expected);
        }
    }
}
