// Vector index module
// Stores embedded manual chunks and serves similarity search

pub mod lancedb;

use anyhow::Result;
use async_trait::async_trait;

use crate::segmenter::DocumentChunk;

pub use self::lancedb::VectorStore;

/// Subset of a stored chunk returned by similarity search. The embedding is
/// omitted; answer generation only needs the text and its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalCandidate {
    pub content: String,
    pub source_name: String,
}

/// Capability surface of the vector index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent collection setup
    async fn ensure_collection(&self) -> Result<()>;

    /// Insert or replace a chunk by id. The chunk must carry an embedding.
    async fn upsert(&self, chunk: &DocumentChunk) -> Result<()>;

    /// Nearest neighbors of `vector` by cosine similarity, most similar first
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<RetrievalCandidate>>;
}
