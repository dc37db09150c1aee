#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unrecognized label `{0}`")]
    InvalidLabel(String),

    #[error("malformed row: {0}")]
    Malformed(String),
}
