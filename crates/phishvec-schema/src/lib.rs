//! Record shapes for labeled email datasets and the evaluation report contract.

mod error;
mod kind;
mod record;
pub mod report;
mod row;
pub mod urls;

pub use error::RowError;
pub use kind::{
    DatasetKind, GenericSchema, LingSpamSchema, NigerianFraudSchema, RowSchema, SpamAssassinSchema,
};
pub use record::EmailRecord;
pub use report::{CredibilityBand, EmailReport, RecommendedAction};
pub use row::{Header, Row};
