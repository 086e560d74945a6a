use std::env;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nsi_core::{EmbeddingProvider, Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: EmbedInput<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbedInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider backed by a local Ollama server.
pub struct OllamaProvider {
    client: Arc<Client>,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>, model: Option<String>) -> Self {
        let base_url = base_url
            .or_else(|| env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let model = model
            .or_else(|| env::var("EMBEDDING_MODEL").ok())
            .unwrap_or_else(|| "qwen3-embedding".to_string());

        Self {
            client: Arc::new(Client::new()),
            base_url,
            model,
        }
    }

    async fn request(&self, input: EmbedInput<'_>, expected: usize) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: EmbedResponse = response.json().await?;
        if body.embeddings.len() != expected {
            return Err(Error::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                body.embeddings.len(),
                expected
            )));
        }
        Ok(body.embeddings)
    }
}

impl fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(EmbedInput::Single(text), 1).await?;
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(EmbedInput::Batch(texts), texts.len()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_ollama() {
        let provider = OllamaProvider::new(None, Some("qwen3-embedding".to_string()));
        assert_eq!(provider.name(), "Ollama");
        assert_eq!(provider.model, "qwen3-embedding");
        assert!(provider.base_url.starts_with("http"));
    }

    #[test]
    fn explicit_configuration_wins() {
        let provider = OllamaProvider::new(
            Some("http://embedder:11434".to_string()),
            Some("nomic-embed-text".to_string()),
        );
        assert_eq!(provider.base_url, "http://embedder:11434");
        assert_eq!(provider.model, "nomic-embed-text");
    }
}
