use async_trait::async_trait;

use crate::types::{Article, DateRange, DocMetadata, IndexedDocument};
use crate::Result;

/// Scalar metadata predicate on the encoded date, the only filter shape the
/// vector store supports: `date_int >= min AND date_int <= max`, either
/// bound optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateIntFilter {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl DateIntFilter {
    pub fn matches(&self, date_int: i32) -> bool {
        if let Some(min) = self.min {
            if date_int < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if date_int > max {
                return false;
            }
        }
        true
    }
}

/// A similarity search hit: the stored document and its cosine distance to
/// the query vector (smaller is closer).
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: IndexedDocument,
    pub distance: f32,
}

/// Relational source of truth for articles.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Fetch one page of articles within the range, ordered ascending by
    /// date (ties by url).
    async fn fetch_page(&self, range: &DateRange, limit: u32, offset: u32)
        -> Result<Vec<Article>>;

    /// Count articles within the range.
    async fn count(&self, range: &DateRange) -> Result<u64>;

    /// Structured listing: date range plus case-insensitive substring
    /// filters on title and/or content, ordered descending by date (ties by
    /// url), bounded by `limit`.
    async fn fetch_by_date_range_desc(
        &self,
        range: &DateRange,
        title_contains: Option<&str>,
        content_contains: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Article>>;
}

/// Persists one vector + metadata per indexed document, keyed by the
/// article url.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Write a batch of documents with their embeddings as one unit.
    /// An existing document under the same key is replaced.
    async fn upsert(&self, batch: &[(IndexedDocument, Vec<f32>)]) -> Result<()>;

    /// Return the `k` nearest documents passing the metadata filter,
    /// ordered by distance ascending (ties by url).
    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &DateIntFilter,
    ) -> Result<Vec<ScoredDocument>>;

    /// Read the metadata of every stored document in one call.
    async fn bulk_read_metadata(&self) -> Result<Vec<DocMetadata>>;

    /// Number of stored documents.
    async fn count(&self) -> Result<u64>;

    /// Delete everything; returns the number of removed documents.
    async fn delete_all(&self) -> Result<u64>;
}
