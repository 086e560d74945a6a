use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nsi_core::{DateIntFilter, DocMetadata, IndexedDocument, Result, ScoredDocument, VectorStore};
use tokio::sync::RwLock;

use crate::cosine_distance;

/// In-memory vector store. Backs tests and small corpora; the persistent
/// deployment uses [`crate::SqliteVectorStore`].
#[derive(Default)]
pub struct MemoryVectorStore {
    docs: Arc<RwLock<HashMap<String, (IndexedDocument, Vec<f32>)>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, batch: &[(IndexedDocument, Vec<f32>)]) -> Result<()> {
        let mut docs = self.docs.write().await;
        for (doc, embedding) in batch {
            docs.insert(doc.metadata.url.clone(), (doc.clone(), embedding.clone()));
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &DateIntFilter,
    ) -> Result<Vec<ScoredDocument>> {
        let docs = self.docs.read().await;

        let mut hits: Vec<ScoredDocument> = docs
            .values()
            .filter(|(doc, _)| filter.matches(doc.metadata.date_int))
            .map(|(doc, embedding)| ScoredDocument {
                document: doc.clone(),
                distance: cosine_distance(query, embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.document.metadata.url.cmp(&b.document.metadata.url))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn bulk_read_metadata(&self) -> Result<Vec<DocMetadata>> {
        let docs = self.docs.read().await;
        Ok(docs.values().map(|(doc, _)| doc.metadata.clone()).collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.docs.read().await.len() as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut docs = self.docs.write().await;
        let removed = docs.len() as u64;
        docs.clear();
        Ok(removed)
    }
}
