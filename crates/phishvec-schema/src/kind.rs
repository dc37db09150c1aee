use serde::{Deserialize, Serialize};

use crate::urls::resolve_urls;
use crate::{EmailRecord, Row, RowError};

/// Column contract of a known public dataset, or the generic email schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Generic,
    NigerianFraud,
    SpamAssassin,
    LingSpam,
}

impl DatasetKind {
    #[must_use]
    pub fn schema(self) -> &'static dyn RowSchema {
        match self {
            Self::Generic => &GenericSchema,
            Self::NigerianFraud => &NigerianFraudSchema,
            Self::SpamAssassin => &SpamAssassinSchema,
            Self::LingSpam => &LingSpamSchema,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.schema().name()
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "nigerian_fraud" => Ok(Self::NigerianFraud),
            "spam_assassin" => Ok(Self::SpamAssassin),
            "ling_spam" => Ok(Self::LingSpam),
            other => Err(format!("unknown dataset kind: {other}")),
        }
    }
}

/// Turns one CSV row into an [`EmailRecord`].
pub trait RowSchema: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns [`RowError`] when a required column is missing or the label is unrecognized.
    fn parse(&self, row: &Row<'_>, dataset: &str) -> Result<EmailRecord, RowError>;
}

/// Free-form label: trimmed and lowercased, empty means unlabeled.
fn free_label(raw: &str) -> Option<String> {
    let label = raw.trim().to_lowercase();
    (!label.is_empty()).then_some(label)
}

/// Binary `0`/`1` label as used by the public corpora. Already-named labels pass through.
fn binary_label(raw: &str, positive: &str) -> Result<Option<String>, RowError> {
    let trimmed = raw.trim();
    match trimmed {
        "" => Ok(None),
        "1" | "1.0" => Ok(Some(positive.to_owned())),
        "0" | "0.0" => Ok(Some("legitimate".to_owned())),
        other => match other.to_lowercase().as_str() {
            "legitimate" | "ham" => Ok(Some("legitimate".to_owned())),
            lower if lower == positive => Ok(Some(positive.to_owned())),
            _ => Err(RowError::InvalidLabel(other.to_owned())),
        },
    }
}

pub struct GenericSchema;

impl RowSchema for GenericSchema {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn parse(&self, row: &Row<'_>, dataset: &str) -> Result<EmailRecord, RowError> {
        let sender = row.require("sender")?;
        let receiver = row.require("receiver")?;
        let subject = row.require("subject")?;
        let body = row.optional("body");
        Ok(EmailRecord {
            sender: sender.trim().to_owned(),
            receiver: receiver.trim().to_owned(),
            subject: subject.trim().to_owned(),
            body: body.to_owned(),
            urls: resolve_urls(row.optional("urls"), body),
            label: free_label(row.optional("label")),
            dataset: dataset.to_owned(),
        })
    }
}

/// Shared shape of the sender/subject/body corpora with a binary label.
fn parse_binary_corpus(
    row: &Row<'_>,
    dataset: &str,
    positive: &str,
) -> Result<EmailRecord, RowError> {
    let sender = row.require("sender")?;
    let subject = row.require("subject")?;
    let body = row.require("body")?;
    Ok(EmailRecord {
        sender: sender.trim().to_owned(),
        receiver: row.optional("receiver").trim().to_owned(),
        subject: subject.trim().to_owned(),
        body: body.to_owned(),
        urls: resolve_urls(row.optional("urls"), body),
        label: binary_label(row.optional("label"), positive)?,
        dataset: dataset.to_owned(),
    })
}

pub struct NigerianFraudSchema;

impl RowSchema for NigerianFraudSchema {
    fn name(&self) -> &'static str {
        "nigerian_fraud"
    }

    fn parse(&self, row: &Row<'_>, dataset: &str) -> Result<EmailRecord, RowError> {
        parse_binary_corpus(row, dataset, "fraud")
    }
}

pub struct SpamAssassinSchema;

impl RowSchema for SpamAssassinSchema {
    fn name(&self) -> &'static str {
        "spam_assassin"
    }

    fn parse(&self, row: &Row<'_>, dataset: &str) -> Result<EmailRecord, RowError> {
        parse_binary_corpus(row, dataset, "spam")
    }
}

pub struct LingSpamSchema;

impl RowSchema for LingSpamSchema {
    fn name(&self) -> &'static str {
        "ling_spam"
    }

    fn parse(&self, row: &Row<'_>, dataset: &str) -> Result<EmailRecord, RowError> {
        let subject = row.require("subject")?;
        let body = row.require("body")?;
        Ok(EmailRecord {
            sender: String::new(),
            receiver: String::new(),
            subject: subject.trim().to_owned(),
            body: body.to_owned(),
            urls: resolve_urls("", body),
            label: binary_label(row.optional("label"), "spam")?,
            dataset: dataset.to_owned(),
        })
    }
}
