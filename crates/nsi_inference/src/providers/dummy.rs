use std::fmt;

use async_trait::async_trait;
use nsi_core::{EmbeddingProvider, Result};

const DEFAULT_DIMENSION: usize = 768;

/// Deterministic offline provider: a character-histogram embedding. Texts
/// sharing characters land close under cosine distance, which is enough for
/// pipeline and retrieval tests without a model server.
pub struct DummyProvider {
    dimension: usize,
}

impl DummyProvider {
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimension];
        let char_count = text.chars().count().max(1) as f32;

        embedding[0] = char_count / 1000.0;
        for c in text.chars() {
            let slot = (c as usize) % (self.dimension - 1) + 1;
            embedding[slot] += 1.0 / char_count;
        }
        embedding
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DummyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyProvider")
            .field("dimension", &self.dimension)
            .finish()
    }
}

#[async_trait]
impl EmbeddingProvider for DummyProvider {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
