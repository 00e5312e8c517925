pub mod database;
pub mod embeddings;
pub mod huggingface;
pub mod inference;
pub mod prompt;
pub mod rag;
pub mod web;

#[cfg(test)]
mod testing;
