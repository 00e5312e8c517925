use super::{DocumentChunk, VectorIndex, TEXT_KEYS};
use crate::embeddings::Embedding;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::time::Duration;

const DEFAULT_INDEX_NAME: &str = "medical-chatbot";
const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for Pinecone
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    /// Data plane host of the index; looked up by name when absent
    pub index_host: Option<String>,
    pub namespace: Option<String>,
    pub control_plane_url: String,
    pub timeout: Duration,
}

impl PineconeConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = non_empty_var("PINECONE_API_KEY")
            .context("PINECONE_API_KEY not found in environment. Please add it!")?;
        let index_name =
            non_empty_var("PINECONE_INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());
        let index_host = non_empty_var("PINECONE_INDEX_HOST");
        let namespace = non_empty_var("PINECONE_NAMESPACE");
        let control_plane_url = non_empty_var("PINECONE_CONTROL_PLANE_URL")
            .unwrap_or_else(|| CONTROL_PLANE_URL.to_string());
        let timeout_secs = match non_empty_var("PINECONE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("PINECONE_TIMEOUT_SECS must be a number, got {}", raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(PineconeConfig {
            api_key,
            index_name,
            index_host,
            namespace,
            control_plane_url: control_plane_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Blank values count as unset
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Query-only client for an existing Pinecone index
pub struct PineconeClient {
    config: PineconeConfig,
    host: String,
    client: reqwest::Client,
}

impl PineconeClient {
    /// Connect to an existing index, resolving its host when not configured
    pub async fn new(config: PineconeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let host = match &config.index_host {
            Some(host) => host.clone(),
            None => describe_index_host(&client, &config).await.with_context(|| {
                format!("Failed to resolve Pinecone index {}", config.index_name)
            })?,
        };
        let host = normalize_host(&host);
        info!("Pinecone index {} at {}", config.index_name, host);

        Ok(PineconeClient {
            config,
            host,
            client,
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeClient {
    async fn search(
        &self,
        query_embedding: Embedding,
        top_k: u64,
    ) -> Result<Vec<DocumentChunk>> {
        let request = QueryRequest {
            vector: &query_embedding.values,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.config.namespace.as_deref(),
        };

        let url = format!("{}/query", self.host);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to query Pinecone index {}", self.config.index_name))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Pinecone query failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: QueryResponse = response.json().await?;
        debug!("Pinecone returned {} matches", response_data.matches.len());

        Ok(matches_to_chunks(response_data.matches))
    }
}

async fn describe_index_host(client: &reqwest::Client, config: &PineconeConfig) -> Result<String> {
    #[derive(Deserialize)]
    struct IndexDescription {
        host: String,
    }

    let url = format!("{}/indexes/{}", config.control_plane_url, config.index_name);
    let response = client
        .get(&url)
        .header("Api-Key", &config.api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow::anyhow!(
            "API request failed: {} {}",
            status,
            error_text
        ));
    }

    let description: IndexDescription = response.json().await?;
    Ok(description.host)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Keep index order; drop matches that carry no text
fn matches_to_chunks(matches: Vec<QueryMatch>) -> Vec<DocumentChunk> {
    matches
        .into_iter()
        .filter_map(|m| {
            let metadata = m.metadata.unwrap_or_default();
            let text = TEXT_KEYS
                .iter()
                .find_map(|key| metadata.get(*key).and_then(Value::as_str))?
                .to_string();
            let source = metadata
                .get("source")
                .and_then(Value::as_str)
                .map(|s| s.to_string());

            Some(DocumentChunk {
                id: m.id,
                text,
                score: m.score,
                source,
            })
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: u64,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize, Debug)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}
