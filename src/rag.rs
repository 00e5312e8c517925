use crate::database::{DocumentChunk, VectorIndex};
use crate::embeddings::Embedder;
use crate::inference::InferenceClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

/// Number of chunks retrieved per question
pub const RETRIEVAL_K: u64 = 3;

/// Finds the document chunks most relevant to a query
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn get_relevant_documents(&self, query: &str) -> Result<Vec<DocumentChunk>>;
}

/// Retriever that embeds the query and searches a vector index
pub struct VectorStoreRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    k: u64,
}

impl VectorStoreRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        VectorStoreRetriever {
            embedder,
            index,
            k: RETRIEVAL_K,
        }
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    async fn get_relevant_documents(&self, query: &str) -> Result<Vec<DocumentChunk>> {
        let query_embedding = self
            .embedder
            .get_embedding(query)
            .await
            .context("Failed to embed question")?;

        self.index.search(query_embedding, self.k).await
    }
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine {
    retriever: Arc<dyn Retriever>,
    inference: InferenceClient,
}

impl RagEngine {
    /// Create a new RAG engine
    pub fn new(retriever: Arc<dyn Retriever>, inference: InferenceClient) -> Self {
        RagEngine {
            retriever,
            inference,
        }
    }

    /// Retrieve context for a question and generate an answer from it
    pub async fn answer(&self, question: &str) -> Result<String> {
        let chunks = self.retriever.get_relevant_documents(question).await?;
        info!("Retrieved {} relevant documents", chunks.len());
        for chunk in &chunks {
            debug!(
                "Chunk {} (score {:.3}, source {})",
                chunk.id,
                chunk.score,
                chunk.source.as_deref().unwrap_or("unknown")
            );
        }

        let answer = self.inference.ask_medical_question(question, &chunks).await?;
        debug!("Answer: {}", answer);

        Ok(answer)
    }
}
