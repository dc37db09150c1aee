//! Dataset directory scanning and CSV row validation.

pub mod error;
pub mod loader;
pub mod registry;
pub mod report;

pub use error::DatasetError;
pub use loader::{DEFAULT_MAX_FILE_SIZE, DatasetLoader, decode_lossy};
pub use registry::{DatasetRegistry, RegistryEntry};
pub use report::{FileReport, LoadOutcome, LoadReport, RowSkip};
