//! Vector-store backends behind a single object-safe trait.

pub mod in_memory;
pub mod pinecone;
pub mod qdrant;
pub mod vector_store;

pub use in_memory::InMemoryVectorStore;
pub use pinecone::PineconeStore;
pub use qdrant::QdrantStore;
pub use vector_store::{IndexSpec, UpsertAck, VectorPoint, VectorStore, VectorStoreError};
