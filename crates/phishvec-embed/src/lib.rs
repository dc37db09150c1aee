//! Embedding provider abstraction with a Pinecone inference backend.

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pinecone;
pub mod provider;
pub mod retry;

pub use error::EmbedError;
pub use pinecone::PineconeEmbedder;
pub use provider::EmbeddingProvider;
pub use retry::{RetryPolicy, send_with_retry};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;
