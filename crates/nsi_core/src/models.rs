use async_trait::async_trait;

use crate::Result;

/// Converts text into a fixed-dimension vector, single or batched.
/// Assumed stable for a given text/model pair.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. Must return exactly one vector per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
