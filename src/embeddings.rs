use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Average token-level vectors into a single sentence vector
    pub fn mean_pooled(rows: Vec<Vec<f32>>) -> Option<Self> {
        let width = rows.first()?.len();
        if width == 0 || rows.iter().any(|row| row.len() != width) {
            return None;
        }

        let mut values = vec![0.0f32; width];
        for row in &rows {
            for (acc, v) in values.iter_mut().zip(row) {
                *acc += v;
            }
        }
        let count = rows.len() as f32;
        values.iter_mut().for_each(|v| *v /= count);

        Some(Embedding { values })
    }
}

/// Turns free text into a fixed-dimension vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn get_embedding(&self, text: &str) -> Result<Embedding>;
}
