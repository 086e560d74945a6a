use std::sync::Arc;

use nsi_core::dates;
use nsi_core::types::{DateRange, IndexedDocument, RetrievalQuery, RetrievalRecord, RetrievalResult};
use nsi_core::{ArticleStore, DateIntFilter, EmbeddingProvider, Result, VectorStore};
use tracing::debug;

/// Display ceiling for a shaped result; the overflow notice is appended on
/// top of this when true matches exceed it.
pub const MAX_DISPLAY_COUNT: usize = 20;

pub const DEFAULT_SEMANTIC_K: usize = 5;
pub const DEFAULT_LISTING_LIMIT: usize = 100;

/// Vector-similarity rank does not correlate with keyword containment, so
/// when a substring filter rides along we fetch a larger candidate pool to
/// keep post-filtering from starving the final set.
const OVERFETCH_FACTOR: usize = 3;

/// Answers a query with a bounded, ordered result list. Stateless and
/// read-only against both stores; calls may run concurrently with each
/// other and with an in-flight reconcile.
pub struct RetrievalEngine {
    articles: Arc<dyn ArticleStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalEngine {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            articles,
            vectors,
            embedder,
        }
    }

    /// Dispatch on the query shape: free text selects the semantic
    /// strategy, its absence the structured listing. The two are never
    /// merged into one ranked list.
    pub async fn search(&self, query: &RetrievalQuery) -> Result<RetrievalResult> {
        query.validate()?;

        let records = match &query.free_text {
            Some(text) => self.semantic(text, query).await?,
            None => self.listing(query).await?,
        };
        Ok(shape(records))
    }

    /// Embed the query, search the vector store under the date predicate,
    /// then walk the candidates in similarity-rank order keeping only those
    /// that pass every substring filter, stopping at `k`. A short result is
    /// returned as-is; the candidate pool is never re-expanded.
    async fn semantic(&self, text: &str, query: &RetrievalQuery) -> Result<Vec<RetrievalRecord>> {
        let k = query.k.unwrap_or(DEFAULT_SEMANTIC_K);
        let fetch_k = if query.has_substring_filter() {
            k * OVERFETCH_FACTOR
        } else {
            k
        };
        let filter = DateIntFilter {
            min: query.start_date_int,
            max: query.end_date_int,
        };

        let query_vector = self.embedder.embed(text).await?;
        let candidates = self
            .vectors
            .similarity_search(&query_vector, fetch_k, &filter)
            .await?;
        debug!(
            "semantic search returned {} candidates for k={}",
            candidates.len(),
            k
        );

        let mut kept = Vec::new();
        for candidate in &candidates {
            if !matches_filters(&candidate.document, query) {
                continue;
            }
            kept.push(hit_from_document(&candidate.document));
            if kept.len() >= k {
                break;
            }
        }
        Ok(kept)
    }

    /// Bypass the vector store entirely: relational predicate over the
    /// article database, newest first.
    async fn listing(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalRecord>> {
        let limit = query.k.unwrap_or(DEFAULT_LISTING_LIMIT);
        let range = DateRange::new(
            query.start_date_int.map(dates::decode).transpose()?,
            query.end_date_int.map(dates::decode).transpose()?,
        );

        let articles = self
            .articles
            .fetch_by_date_range_desc(
                &range,
                query.title_contains.as_deref(),
                query.content_contains.as_deref(),
                limit as u32,
            )
            .await?;

        Ok(articles
            .iter()
            .map(|a| hit_from_document(&IndexedDocument::from(a)))
            .collect())
    }
}

fn matches_filters(document: &IndexedDocument, query: &RetrievalQuery) -> bool {
    if let Some(keyword) = &query.title_contains {
        if !document
            .metadata
            .title
            .to_lowercase()
            .contains(&keyword.to_lowercase())
        {
            return false;
        }
    }
    if let Some(keyword) = &query.content_contains {
        if !document
            .page_text
            .to_lowercase()
            .contains(&keyword.to_lowercase())
        {
            return false;
        }
    }
    true
}

fn hit_from_document(document: &IndexedDocument) -> RetrievalRecord {
    RetrievalRecord::Hit {
        title: document.metadata.title.clone(),
        date: document.metadata.date,
        url: document.metadata.url.clone(),
        content: document.page_text.clone(),
    }
}

/// Bound the payload regardless of corpus size: at most `MAX_DISPLAY_COUNT`
/// real records, plus one notice carrying the true total when matches
/// overflow the ceiling.
fn shape(records: Vec<RetrievalRecord>) -> RetrievalResult {
    let total = records.len();
    if total <= MAX_DISPLAY_COUNT {
        return RetrievalResult { records };
    }

    let mut records: Vec<RetrievalRecord> =
        records.into_iter().take(MAX_DISPLAY_COUNT).collect();
    records.push(RetrievalRecord::Notice {
        total,
        notice: format!(
            "Found {} matching articles; showing the first {}. \
             Narrow the date range or add more filters to see the rest.",
            total, MAX_DISPLAY_COUNT
        ),
    });
    RetrievalResult { records }
}
