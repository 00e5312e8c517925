use crate::database::DocumentChunk;
use crate::prompt::{create_medical_chat_messages, text_generation_prompt, ChatMessage};
use async_trait::async_trait;
use log::{info, warn};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Chat models tried in order of preference
pub const DEFAULT_MODELS: [&str; 5] = [
    "mistralai/Mistral-7B-Instruct-v0.2",
    "mistralai/Mistral-7B-Instruct-v0.3",
    "microsoft/Phi-3-mini-4k-instruct",
    "HuggingFaceH4/zephyr-7b-beta",
    "meta-llama/Llama-3.2-3B-Instruct",
];

const ALL_MODELS_FAILED: &str = "All models failed. Try one of these solutions:\n\
1. Check your HuggingFace API token is valid\n\
2. You may be rate limited (free tier has limits)\n\
3. Try again in a few minutes\n\
4. Consider using a Pro HuggingFace account for better access";

/// Sampling settings shared by both call strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            max_tokens: 512,
            temperature: 0.3,
        }
    }
}

/// Outcome of one candidate model inside the fallback loop
#[derive(Debug, Clone)]
pub struct ModelAttempt {
    pub model: String,
    pub chat_error: String,
    /// Set only when the text generation fallback was tried
    pub text_error: Option<String>,
}

impl fmt::Display for ModelAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: chat: {}", self.model, self.chat_error)?;
        if let Some(text_error) = &self.text_error {
            write!(f, "; text generation: {}", text_error)?;
        }
        Ok(())
    }
}

/// Errors from the hosted inference API, classified by kind
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model {model} does not support this task: {message}")]
    Unsupported { model: String, message: String },

    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("API request failed: {status} {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{}", ALL_MODELS_FAILED)]
    AllModelsFailed { attempts: Vec<ModelAttempt> },
}

impl InferenceError {
    /// Classify a non-success HTTP response from the inference API
    pub fn from_status(model: &str, status: u16, body: String) -> Self {
        if mentions_unsupported(&body) {
            return InferenceError::Unsupported {
                model: model.to_string(),
                message: body,
            };
        }

        match status {
            401 | 403 => InferenceError::Unauthorized(body),
            429 => InferenceError::RateLimited(body),
            502..=504 => InferenceError::Unavailable(body),
            _ => InferenceError::Api {
                status,
                message: body,
            },
        }
    }

    /// Whether the raw text generation call is worth trying after this chat failure.
    ///
    /// Besides the typed kind, the message text is checked for "not supported"
    /// and "nscale": providers report routing failures only in free text.
    pub fn should_try_text_generation(&self) -> bool {
        match self {
            InferenceError::Unsupported { .. } => true,
            InferenceError::AllModelsFailed { .. } => false,
            other => mentions_unsupported(&other.to_string()),
        }
    }
}

fn mentions_unsupported(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not supported") || lower.contains("nscale")
}

/// A hosted model endpoint offering chat and raw text generation
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, InferenceError>;

    async fn text_generation(
        &self,
        model: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, InferenceError>;
}

/// Join retrieved chunk texts into one context block, keeping retrieval order
pub fn build_context(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<&str>>()
        .join("\n\n")
}

/// Answers questions by walking an ordered list of candidate models
pub struct InferenceClient {
    backend: Arc<dyn InferenceBackend>,
    models: Vec<String>,
    params: GenerationParams,
}

impl InferenceClient {
    /// Create a client over the default candidate list
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self::with_models(backend, DEFAULT_MODELS.iter().map(|m| m.to_string()).collect())
    }

    pub fn with_models(backend: Arc<dyn InferenceBackend>, models: Vec<String>) -> Self {
        InferenceClient {
            backend,
            models,
            params: GenerationParams::default(),
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Ask a medical question using the retrieved chunks as context.
    ///
    /// The first model that answers wins. A failed chat call falls back to text
    /// generation only when the error says the model or method is unsupported;
    /// any other failure moves on to the next model.
    pub async fn ask_medical_question(
        &self,
        question: &str,
        chunks: &[DocumentChunk],
    ) -> Result<String, InferenceError> {
        let context = build_context(chunks);
        let messages = create_medical_chat_messages(&context, question);
        let mut attempts = Vec::with_capacity(self.models.len());

        for model in &self.models {
            let chat_error = match self
                .backend
                .chat_completion(model, &messages, self.params)
                .await
            {
                Ok(answer) => {
                    info!("Using model: {}", model);
                    return Ok(answer);
                }
                Err(e) => e,
            };
            warn!("Chat completion failed for {}: {}", model, chat_error);

            let mut attempt = ModelAttempt {
                model: model.clone(),
                chat_error: chat_error.to_string(),
                text_error: None,
            };

            if chat_error.should_try_text_generation() {
                let prompt = text_generation_prompt(&context, question);
                match self
                    .backend
                    .text_generation(model, &prompt, self.params)
                    .await
                {
                    Ok(answer) => {
                        info!("Using model (text_generation): {}", model);
                        return Ok(answer);
                    }
                    Err(e) => {
                        warn!("Text generation failed for {}: {}", model, e);
                        attempt.text_error = Some(e.to_string());
                    }
                }
            }

            attempts.push(attempt);
        }

        Err(InferenceError::AllModelsFailed { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chunk, Call, Outcome, ScriptedBackend};

    fn client(backend: &Arc<ScriptedBackend>) -> InferenceClient {
        InferenceClient::new(backend.clone())
    }

    #[tokio::test]
    async fn test_first_model_success_is_returned_verbatim() {
        let backend =
            Arc::new(ScriptedBackend::new().chat(DEFAULT_MODELS[0], Outcome::ok("  Rest.  ")));

        let answer = client(&backend)
            .ask_medical_question("How to treat a cold?", &[chunk("Colds pass.")])
            .await
            .unwrap();

        assert_eq!(answer, "  Rest.  ");
        assert_eq!(
            backend.calls(),
            vec![Call::Chat(DEFAULT_MODELS[0].to_string())]
        );
    }

    #[tokio::test]
    async fn test_unsupported_models_fall_through_to_text_generation() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .chat(DEFAULT_MODELS[0], Outcome::unsupported())
                .text(DEFAULT_MODELS[0], Outcome::unsupported())
                .chat(DEFAULT_MODELS[1], Outcome::unsupported())
                .text(DEFAULT_MODELS[1], Outcome::unsupported())
                .chat(DEFAULT_MODELS[2], Outcome::unsupported())
                .text(DEFAULT_MODELS[2], Outcome::ok("from text generation")),
        );

        let answer = client(&backend)
            .ask_medical_question("Q?", &[chunk("CTX")])
            .await
            .unwrap();

        assert_eq!(answer, "from text generation");
        assert_eq!(
            backend.models_tried(),
            DEFAULT_MODELS[..3]
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_other_errors_skip_text_generation() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .chat(
                    DEFAULT_MODELS[0],
                    Outcome::Err(|| InferenceError::RateLimited("slow down".into())),
                )
                .chat(DEFAULT_MODELS[1], Outcome::ok("second")),
        );

        let answer = client(&backend)
            .ask_medical_question("Q?", &[])
            .await
            .unwrap();

        assert_eq!(answer, "second");
        assert_eq!(
            backend.calls(),
            vec![
                Call::Chat(DEFAULT_MODELS[0].to_string()),
                Call::Chat(DEFAULT_MODELS[1].to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_all_models_failed() {
        let backend = Arc::new(ScriptedBackend::new());

        let err = client(&backend)
            .ask_medical_question("Q?", &[chunk("CTX")])
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("All models failed"));
        assert!(err.to_string().contains("HuggingFace API token"));
        match err {
            InferenceError::AllModelsFailed { attempts } => {
                assert_eq!(attempts.len(), DEFAULT_MODELS.len());
                assert!(attempts.iter().all(|a| a.text_error.is_none()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.calls().len(), DEFAULT_MODELS.len());
    }

    #[tokio::test]
    async fn test_prompts_carry_context_and_question() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .chat(DEFAULT_MODELS[0], Outcome::unsupported())
                .text(DEFAULT_MODELS[0], Outcome::ok("ok")),
        );

        client(&backend)
            .ask_medical_question("Q?", &[chunk("first"), chunk("second")])
            .await
            .unwrap();

        let messages = backend.last_messages().unwrap();
        assert!(messages[1].content.contains("first\n\nsecond"));
        assert!(messages[1].content.contains("Q?"));
        let prompt = backend.last_prompt().unwrap();
        assert!(prompt.contains("Context: first\n\nsecond"));
    }

    #[test]
    fn test_build_context_preserves_order() {
        assert_eq!(build_context(&[]), "");
        assert_eq!(build_context(&[chunk("a")]), "a");
        assert_eq!(
            build_context(&[chunk("a"), chunk("b"), chunk("c")]),
            "a\n\nb\n\nc"
        );
    }

    #[test]
    fn test_classification() {
        let m = "some/model";
        assert!(matches!(
            InferenceError::from_status(m, 400, "Model is NOT SUPPORTED by provider".into()),
            InferenceError::Unsupported { .. }
        ));
        assert!(matches!(
            InferenceError::from_status(m, 500, "routed to nscale and failed".into()),
            InferenceError::Unsupported { .. }
        ));
        assert!(matches!(
            InferenceError::from_status(m, 401, "bad token".into()),
            InferenceError::Unauthorized(_)
        ));
        assert!(matches!(
            InferenceError::from_status(m, 429, "".into()),
            InferenceError::RateLimited(_)
        ));
        assert!(matches!(
            InferenceError::from_status(m, 503, "loading".into()),
            InferenceError::Unavailable(_)
        ));
        assert!(matches!(
            InferenceError::from_status(m, 422, "bad input".into()),
            InferenceError::Api { status: 422, .. }
        ));
    }

    #[test]
    fn test_text_generation_fallback_decision() {
        assert!(InferenceError::Unsupported {
            model: "m".into(),
            message: "x".into()
        }
        .should_try_text_generation());
        assert!(InferenceError::Decode("task not supported".into()).should_try_text_generation());
        assert!(!InferenceError::Unauthorized("bad token".into()).should_try_text_generation());
        assert!(!InferenceError::AllModelsFailed { attempts: vec![] }.should_try_text_generation());
    }
}
