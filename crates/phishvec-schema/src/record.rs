use serde::{Deserialize, Serialize};

/// One validated email, regardless of which dataset produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub sender: String,
    pub receiver: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Registry name (or file stem for generic files) the record was loaded from.
    pub dataset: String,
}

impl EmailRecord {
    /// Label as stored in vector metadata, where null values are not accepted.
    #[must_use]
    pub fn label_or_empty(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}
