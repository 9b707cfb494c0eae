use crate::Result;
use async_trait::async_trait;

/// Embedding generator collaborator.
///
/// Given a batch of texts, returns one fixed-length vector per text in input order.
/// Implementations are loaded once and shared read-only afterwards.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, order-preserving
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension for this provider
    fn embedding_dimension(&self) -> usize;

    /// Get provider name for identification
    fn provider_name(&self) -> &str;
}
