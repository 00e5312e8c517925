use serde::{Deserialize, Serialize};

/// System prompt for the medical assistant
pub const MEDICAL_SYSTEM_PROMPT: &str = "You are a helpful Medical AI assistant. Answer medical questions based ONLY on the provided context from medical textbooks.

Rules:
- Use only the information from the context provided
- If the answer is not in the context, say \"I don't have enough information in my medical database to answer this question.\"
- Keep answers concise (3-5 sentences maximum)
- Use simple, clear language
- Never make up medical information";

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single role-tagged message sent to a chat model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Build the user prompt from the retrieved context and the question
pub fn user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context from medical textbooks:\n{}\n\nQuestion: {}\n\nPlease provide a concise answer based on the context above.",
        context, question
    )
}

/// Create the system + user message pair for a chat model
pub fn create_medical_chat_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(MEDICAL_SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(context, question)),
    ]
}

/// Plain prompt used when a model only accepts raw text generation
pub fn text_generation_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful Medical AI assistant. Answer based ONLY on the context provided.\n\nContext: {}\n\nQuestion: {}\n\nAnswer (3-5 sentences):",
        context, question
    )
}
