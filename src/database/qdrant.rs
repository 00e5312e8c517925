use super::{DocumentChunk, VectorIndex, TEXT_KEYS};
use crate::embeddings::Embedding;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{PointId, Value};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::env;

const DEFAULT_COLLECTION: &str = "medical-chatbot";

/// Configuration for Qdrant
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL").context("QDRANT_URL not set")?;
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection =
            env::var("QDRANT_COLLECTION").unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());

        Ok(QdrantConfig {
            url,
            api_key,
            collection,
        })
    }
}

/// Read-only client for a Qdrant collection
pub struct QdrantClient {
    client: Qdrant,
    collection: String,
}

impl QdrantClient {
    /// Create a new Qdrant client
    pub async fn new(config: QdrantConfig) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = if let Some(api_key) = config.api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder.build()?;
        info!(
            "Qdrant client ready for collection {} at {}",
            config.collection, config.url
        );

        Ok(QdrantClient {
            client,
            collection: config.collection,
        })
    }

    /// Check if the configured collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => Ok(true),
            Err(qdrant_client::QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(false)
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to check collection existence: {}",
                e
            )),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantClient {
    async fn search(&self, query_embedding: Embedding, top_k: u64) -> Result<Vec<DocumentChunk>> {
        use qdrant_client::qdrant::{with_payload_selector, SearchPoints, WithPayloadSelector};

        let search_request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: query_embedding.values,
            limit: top_k,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", self.collection))?;

        let chunks = search_response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let text = payload_text(&scored_point.payload)?;
                Some(DocumentChunk {
                    id: point_id_string(scored_point.id.as_ref()),
                    text,
                    score: scored_point.score,
                    source: payload_source(&scored_point.payload),
                })
            })
            .collect();

        Ok(chunks)
    }
}

fn payload_text(payload: &HashMap<String, Value>) -> Option<String> {
    TEXT_KEYS
        .iter()
        .find_map(|key| payload.get(*key).and_then(|v| v.as_str()))
        .map(|text| text.to_string())
}

/// `source` may sit at the top level or inside a nested `metadata` object
fn payload_source(payload: &HashMap<String, Value>) -> Option<String> {
    payload
        .get("source")
        .and_then(|v| v.as_str())
        .or_else(|| {
            payload
                .get("metadata")
                .and_then(|v| v.as_struct())
                .and_then(|s| s.fields.get("source"))
                .and_then(|v| v.as_str())
        })
        .map(|s| s.to_string())
}

fn point_id_string(id: Option<&PointId>) -> String {
    match id.and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(num)) => num.to_string(),
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        None => String::new(),
    }
}
