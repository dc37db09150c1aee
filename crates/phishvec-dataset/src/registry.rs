use std::path::PathBuf;

use phishvec_schema::DatasetKind;
use serde::{Deserialize, Serialize};

/// A named dataset file and the schema its rows follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub kind: DatasetKind,
    /// Relative paths resolve against the dataset directory.
    pub file: PathBuf,
}

impl RegistryEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: DatasetKind, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            file: file.into(),
        }
    }
}

/// Ordered list of known datasets. Order is load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetRegistry {
    entries: Vec<RegistryEntry>,
}

impl DatasetRegistry {
    #[must_use]
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    /// The three public corpora the pipeline knows by name.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            RegistryEntry::new(
                "nigerian_fraud",
                DatasetKind::NigerianFraud,
                "nigerian_fraud.csv",
            ),
            RegistryEntry::new("spam_assassin", DatasetKind::SpamAssassin, "spam_assassin.csv"),
            RegistryEntry::new("ling_spam", DatasetKind::LingSpam, "ling_spam.csv"),
        ])
    }

    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
