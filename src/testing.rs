//! In-process fakes for the external collaborators.

use crate::database::DocumentChunk;
use crate::inference::{GenerationParams, InferenceBackend, InferenceError};
use crate::prompt::ChatMessage;
use crate::rag::Retriever;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn chunk(text: &str) -> DocumentChunk {
    DocumentChunk {
        id: text.to_string(),
        text: text.to_string(),
        score: 1.0,
        source: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Chat(String),
    Text(String),
}

impl Call {
    fn model(&self) -> &str {
        match self {
            Call::Chat(model) | Call::Text(model) => model,
        }
    }
}

pub enum Outcome {
    Ok(String),
    Err(fn() -> InferenceError),
}

impl Outcome {
    pub fn ok(answer: &str) -> Self {
        Outcome::Ok(answer.to_string())
    }

    pub fn unsupported() -> Self {
        Outcome::Err(|| InferenceError::Unsupported {
            model: "scripted".into(),
            message: "Model not supported by provider".into(),
        })
    }

    fn run(&self) -> Result<String, InferenceError> {
        match self {
            Outcome::Ok(answer) => Ok(answer.clone()),
            Outcome::Err(make) => Err(make()),
        }
    }
}

fn unscripted() -> Result<String, InferenceError> {
    Err(InferenceError::Api {
        status: 500,
        message: "Internal Server Error".into(),
    })
}

/// Inference backend answering from a per-model script and recording every call
#[derive(Default)]
pub struct ScriptedBackend {
    chat: HashMap<String, Outcome>,
    text: HashMap<String, Outcome>,
    calls: Mutex<Vec<Call>>,
    last_messages: Mutex<Option<Vec<ChatMessage>>>,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat(mut self, model: &str, outcome: Outcome) -> Self {
        self.chat.insert(model.to_string(), outcome);
        self
    }

    pub fn text(mut self, model: &str, outcome: Outcome) -> Self {
        self.text.insert(model.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Distinct models in the order they were first called
    pub fn models_tried(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for call in self.calls() {
            if models.last().map(String::as_str) != Some(call.model()) {
                models.push(call.model().to_string());
            }
        }
        models
    }

    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.last_messages.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, InferenceError> {
        assert_eq!(params, GenerationParams::default());
        self.calls.lock().unwrap().push(Call::Chat(model.to_string()));
        *self.last_messages.lock().unwrap() = Some(messages.to_vec());
        self.chat.get(model).map_or_else(unscripted, Outcome::run)
    }

    async fn text_generation(
        &self,
        model: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, InferenceError> {
        assert_eq!(params, GenerationParams::default());
        self.calls.lock().unwrap().push(Call::Text(model.to_string()));
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        self.text.get(model).map_or_else(unscripted, Outcome::run)
    }
}

/// Retriever returning fixed chunks or a fixed error
pub struct FakeRetriever {
    result: std::result::Result<Vec<DocumentChunk>, String>,
    calls: AtomicUsize,
}

impl FakeRetriever {
    pub fn with_chunks(chunks: Vec<DocumentChunk>) -> Self {
        FakeRetriever {
            result: Ok(chunks),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        FakeRetriever {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn get_relevant_documents(&self, _query: &str) -> Result<Vec<DocumentChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(|message| anyhow::anyhow!(message))
    }
}

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn serve_stub(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
