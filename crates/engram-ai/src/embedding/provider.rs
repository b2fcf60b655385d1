use async_trait::async_trait;

use crate::error::Result;

/// Fixed-dimension text embedding.
///
/// The engine treats the vector dimension as a build-time constant per
/// provider; mixing vectors from providers with different dimensions in one
/// project produces meaningless similarities, so callers should record
/// `model_name()` alongside every persisted vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension.
    fn dimension(&self) -> usize;

    /// Get model name.
    fn model_name(&self) -> &str;

    /// Normalize text before embedding (optional).
    fn normalize_text(&self, text: &str) -> String {
        text.trim()
            .chars()
            .filter(|c| !c.is_control())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
