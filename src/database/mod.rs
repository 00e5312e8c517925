mod pinecone;
mod qdrant;

pub use pinecone::{PineconeClient, PineconeConfig};
pub use qdrant::{QdrantClient, QdrantConfig};

use crate::embeddings::Embedding;
use anyhow::Result;
use async_trait::async_trait;

/// Metadata keys that may hold the chunk text, in lookup order
pub const TEXT_KEYS: [&str; 2] = ["text", "page_content"];

/// A retrieved document fragment with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    /// Similarity score reported by the index
    pub score: f32,
    /// Source document, when the index stored one
    pub source: Option<String>,
}

/// A hosted vector index holding pre-computed document embeddings
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` chunks nearest to `query_embedding`, best first
    async fn search(&self, query_embedding: Embedding, top_k: u64) -> Result<Vec<DocumentChunk>>;
}
