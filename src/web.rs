//! HTTP surface: the chat page and the question endpoint.
//!
//! `POST /get` always answers with HTTP 200. Failures are reported in the
//! `answer` field prefixed with `"Error: "` so the chat page can render them
//! like any other reply.

use crate::rag::RagEngine;
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

const CHAT_PAGE: &str = include_str!("../templates/chat.html");

pub const EMPTY_QUESTION_ANSWER: &str = "Please provide a question.";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RagEngine>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Normally a string; any falsy JSON value counts as no question
    #[serde(default)]
    pub msg: Option<Value>,
}

impl ChatRequest {
    /// The question to answer, or `None` when `msg` is missing or falsy
    pub fn question(self) -> Result<Option<String>> {
        match self.msg {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
            Some(Value::String(msg)) if msg.is_empty() => Ok(None),
            Some(Value::String(msg)) => Ok(Some(msg)),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(None),
            Some(Value::Array(items)) if items.is_empty() => Ok(None),
            Some(Value::Object(fields)) if fields.is_empty() => Ok(None),
            Some(other) => Err(anyhow::anyhow!("msg must be a string, got {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
}

fn reply(answer: String) -> Json<ChatResponse> {
    Json(ChatResponse { answer })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/get", post(chat))
        .with_state(state)
}

/// Serve the router until Ctrl+C
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// Handler: POST /get
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/get \
///   -H 'content-type: application/json' \
///   -d '{"msg":"What are the symptoms of anemia?"}'
/// ```
async fn chat(State(state): State<AppState>, body: Bytes) -> Json<ChatResponse> {
    match answer_request(&state, &body).await {
        Ok(answer) => reply(answer),
        Err(e) => {
            let error_message = format!("Error: {:#}", e);
            error!("{}", error_message);
            reply(error_message)
        }
    }
}

async fn answer_request(state: &AppState, body: &[u8]) -> Result<String> {
    let request: ChatRequest = serde_json::from_slice(body).context("Invalid request body")?;

    let question = match request.question()? {
        Some(question) => question,
        None => return Ok(EMPTY_QUESTION_ANSWER.to_string()),
    };
    info!("User Question: {}", question);

    state.engine.answer(&question).await
}
