use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list dataset directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: file too large ({size} bytes)", path.display())]
    FileTooLarge { path: PathBuf, size: u64 },

    #[error("{}: unreadable CSV header: {reason}", path.display())]
    Header { path: PathBuf, reason: String },

    #[error("loader task failed: {0}")]
    Join(String),
}
