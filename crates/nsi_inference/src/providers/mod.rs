use std::sync::Arc;

use nsi_core::{EmbeddingProvider, Error, Result};

pub mod dummy;
pub mod ollama;

pub use dummy::DummyProvider;
pub use ollama::OllamaProvider;

/// Build a provider from its CLI name.
pub fn create_provider(kind: &str) -> Result<Arc<dyn EmbeddingProvider>> {
    match kind {
        "ollama" => Ok(Arc::new(OllamaProvider::new(None, None))),
        "dummy" => Ok(Arc::new(DummyProvider::new())),
        other => Err(Error::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}
