use crate::embeddings::{Embedder, Embedding};
use crate::inference::{GenerationParams, InferenceBackend, InferenceError};
use crate::prompt::ChatMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const DEFAULT_CHAT_URL: &str = "https://router.huggingface.co/v1/chat/completions";
const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";
const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for the HuggingFace inference API
#[derive(Clone)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    pub chat_url: String,
    /// Base URL for per-model tasks; the model id is appended
    pub inference_url: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

impl HuggingFaceConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("HUGGINGFACE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .context("HUGGINGFACE_API_KEY not found in .env file. Please add it!")?;
        let chat_url = env::var("HF_CHAT_URL").unwrap_or_else(|_| DEFAULT_CHAT_URL.to_string());
        let inference_url =
            env::var("HF_INFERENCE_URL").unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_string());
        let embedding_model =
            env::var("HF_EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        let timeout_secs = match env::var("HF_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("HF_TIMEOUT_SECS must be a number, got {}", raw))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(HuggingFaceConfig {
            api_key,
            chat_url,
            inference_url: inference_url.trim_end_matches('/').to_string(),
            embedding_model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.inference_url, model)
    }

    fn embedding_url(&self) -> String {
        format!(
            "{}/pipeline/feature-extraction",
            self.model_url(&self.embedding_model)
        )
    }
}

/// Client for the HuggingFace inference API.
///
/// One handle serves embeddings, chat completion and text generation.
#[derive(Clone)]
pub struct HuggingFaceClient {
    config: HuggingFaceConfig,
    client: reqwest::Client,
}

impl HuggingFaceClient {
    /// Create a new HuggingFace client
    pub fn new(config: HuggingFaceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HuggingFaceClient { config, client })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HuggingFaceConfig {
        &self.config
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        model: &str,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response, InferenceError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InferenceError::from_status(model, status, error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl Embedder for HuggingFaceClient {
    async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        #[derive(Serialize)]
        struct FeatureExtractionRequest<'a> {
            inputs: &'a str,
        }

        let request = FeatureExtractionRequest { inputs: text };
        let response = self
            .post(
                &self.config.embedding_model,
                &self.config.embedding_url(),
                &request,
            )
            .await
            .with_context(|| format!("Failed to embed with {}", self.config.embedding_model))?;

        let response_data: FeatureExtractionResponse = response.json().await?;
        response_data
            .into_embedding()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding returned"))
    }
}

#[async_trait]
impl InferenceBackend for HuggingFaceClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, InferenceError> {
        let request = ChatCompletionRequest {
            model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let response = self.post(model, &self.config.chat_url, &request).await?;
        let response_data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        response_data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| InferenceError::Decode(format!("{} returned no choices", model)))
    }

    async fn text_generation(
        &self,
        model: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, InferenceError> {
        let request = TextGenerationRequest {
            inputs: prompt,
            parameters: TextGenerationParameters {
                max_new_tokens: params.max_tokens,
                temperature: params.temperature,
                return_full_text: false,
            },
        };

        let url = self.config.model_url(model);
        let response = self.post(model, &url, &request).await?;
        let response_data: TextGenerationResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        response_data
            .into_text()
            .ok_or_else(|| InferenceError::Decode(format!("{} generated no text", model)))
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<f32>),
    PerToken(Vec<Vec<f32>>),
    Batched(Vec<Vec<Vec<f32>>>),
}

impl FeatureExtractionResponse {
    fn into_embedding(self) -> Option<Embedding> {
        match self {
            FeatureExtractionResponse::Pooled(values) if !values.is_empty() => {
                Some(Embedding { values })
            }
            FeatureExtractionResponse::Pooled(_) => None,
            FeatureExtractionResponse::PerToken(rows) => Embedding::mean_pooled(rows),
            FeatureExtractionResponse::Batched(batch) => {
                Embedding::mean_pooled(batch.into_iter().next()?)
            }
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct TextGenerationRequest<'a> {
    inputs: &'a str,
    parameters: TextGenerationParameters,
}

#[derive(Serialize)]
struct TextGenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TextGenerationResponse {
    List(Vec<GeneratedText>),
    Single(GeneratedText),
}

impl TextGenerationResponse {
    fn into_text(self) -> Option<String> {
        match self {
            TextGenerationResponse::List(items) => {
                items.into_iter().next().map(|g| g.generated_text)
            }
            TextGenerationResponse::Single(item) => Some(item.generated_text),
        }
    }
}

#[derive(Deserialize, Debug)]
struct GeneratedText {
    generated_text: String,
}
