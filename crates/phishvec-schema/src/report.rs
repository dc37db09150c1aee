//! Structured verdict an evaluator emits for a single email.
//!
//! Only the contract lives here. Nothing in the workspace produces reports yet;
//! [`EmailReport::schema`] is what a structured-output LLM call would be given.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const MAX_SCORE: u8 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid report JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} score {value} is outside 0-100")]
    ScoreOutOfRange { field: String, value: u8 },
}

/// Header fields as the evaluator read them from the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportMetadata {
    /// The sender of the email
    pub sender: String,
    /// The subject of the email
    pub subject: String,
    /// The date of the email
    pub date: String,
    /// The recipients of the email
    pub to: Vec<String>,
    /// The carbon copy recipients of the email
    pub cc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LinkEvaluation {
    /// The link found in the email
    pub link: String,
    /// Where the link points to, as judged by the evaluator
    pub origin: String,
    /// Credibility of the link, 0-100
    pub score: u8,
    /// The reason for the evaluation
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentEvaluation {
    /// File name of the attachment
    pub name: String,
    /// Credibility of the attachment, 0-100
    pub score: u8,
    /// The reason for the evaluation
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Allow,
    FlagForReview,
    Block,
    Quarantine,
}

/// Coarse reading of a 0-100 credibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredibilityBand {
    HighlySuspicious,
    Uncertain,
    LikelyLegitimate,
}

impl CredibilityBand {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=30 => Self::HighlySuspicious,
            31..=60 => Self::Uncertain,
            _ => Self::LikelyLegitimate,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighlySuspicious => "highly suspicious",
            Self::Uncertain => "uncertain",
            Self::LikelyLegitimate => "likely legitimate",
        }
    }
}

impl std::fmt::Display for CredibilityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EmailReport {
    /// Credibility of the email, 0-30 highly suspicious, 31-60 uncertain, 61-100 likely legitimate
    pub credibility_score: u8,
    /// The red flags of the email
    pub red_flags: Vec<String>,
    /// The green flags of the email
    pub green_flags: Vec<String>,
    /// The metadata of the email
    pub metadata: ReportMetadata,
    /// The links of the email
    pub links: Vec<LinkEvaluation>,
    /// The attachments of the email
    pub attachments: Vec<AttachmentEvaluation>,
    /// Intent classification labels, e.g. phishing, scam, spam, legitimate
    pub intent: Vec<String>,
    /// The recommended action: allow, `flag_for_review`, block, or quarantine
    pub recommended_action: RecommendedAction,
}

impl EmailReport {
    /// JSON schema handed to structured-output providers.
    #[must_use]
    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(EmailReport)
    }

    /// Parse an evaluator response and check every score is within 0-100.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Json`] on malformed input and
    /// [`ReportError::ScoreOutOfRange`] when any score exceeds 100.
    pub fn from_json(raw: &str) -> Result<Self, ReportError> {
        let report: Self = serde_json::from_str(raw)?;
        report.validate()?;
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns [`ReportError::ScoreOutOfRange`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ReportError> {
        check_score("credibility_score", self.credibility_score)?;
        for (i, link) in self.links.iter().enumerate() {
            check_score(&format!("links[{i}]"), link.score)?;
        }
        for (i, attachment) in self.attachments.iter().enumerate() {
            check_score(&format!("attachments[{i}]"), attachment.score)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn band(&self) -> CredibilityBand {
        CredibilityBand::from_score(self.credibility_score)
    }
}

fn check_score(field: &str, value: u8) -> Result<(), ReportError> {
    if value > MAX_SCORE {
        return Err(ReportError::ScoreOutOfRange {
            field: field.to_owned(),
            value,
        });
    }
    Ok(())
}
