mod remote;

pub use remote::RemoteEmbeddingClient;

use crate::error::EmbeddingError;

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for a batch of text, in input order
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}
