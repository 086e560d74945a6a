use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use nsi_core::types::{Article, DateRange, IndexStats, IndexedDocument, ReconcileStats};
use nsi_core::{ArticleStore, EmbeddingProvider, Error, Result, VectorStore};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

/// Tuning knobs for one reconcile run.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub range: DateRange,
    pub fetch_page_size: u32,
    pub embed_batch_size: usize,
    pub worker_count: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            range: DateRange::default(),
            fetch_page_size: 100,
            embed_batch_size: 10,
            worker_count: 4,
        }
    }
}

/// Reconciles the article database against the vector index: every article
/// in range ends up with exactly one indexed document, without recomputing
/// what is already there. Safe to re-run after partial failure.
pub struct IndexPipeline {
    articles: Arc<dyn ArticleStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    shutdown: Arc<AtomicBool>,
}

/// Embed one chunk and write it as a single unit. Returns the keys written
/// so the caller can extend the in-run indexed set. Errors stay typed:
/// transport failures surface as `Http`/`Embedding`, store failures as
/// `Storage`, a vector-count mismatch as `Embedding`.
async fn embed_and_upsert(
    embedder: &Arc<dyn EmbeddingProvider>,
    vectors: &Arc<dyn VectorStore>,
    chunk: &[Article],
) -> Result<Vec<String>> {
    let docs: Vec<IndexedDocument> = chunk.iter().map(IndexedDocument::from).collect();
    let texts: Vec<String> = docs.iter().map(|d| d.page_text.clone()).collect();

    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != docs.len() {
        return Err(Error::Embedding(format!(
            "provider returned {} vectors for {} documents",
            embeddings.len(),
            docs.len()
        )));
    }

    let keys: Vec<String> = docs.iter().map(|d| d.metadata.url.clone()).collect();
    let batch: Vec<(IndexedDocument, Vec<f32>)> = docs.into_iter().zip(embeddings).collect();
    vectors.upsert(&batch).await?;
    Ok(keys)
}

impl IndexPipeline {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            articles,
            vectors,
            embedder,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked before each chunk is scheduled. Once set, in-flight
    /// chunks finish but nothing new starts.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Incrementally index every article in range that has no document yet.
    /// Chunk-level failures are logged and counted, never fatal; a failed
    /// chunk's keys stay absent and are picked up by the next run. Failures
    /// of the baseline read or the paging query abort the run.
    pub async fn reconcile(&self, options: &ReconcileOptions) -> Result<ReconcileStats> {
        options.range.validate()?;
        if options.fetch_page_size == 0 || options.embed_batch_size == 0 || options.worker_count == 0 {
            return Err(Error::Validation(
                "fetch page size, embed batch size and worker count must be positive".to_string(),
            ));
        }

        let total = self.articles.count(&options.range).await?;
        info!("{} articles in range", total);
        if total == 0 {
            warn!("no articles to process");
            return Ok(ReconcileStats::default());
        }

        info!("reading indexed keys from the vector store...");
        let baseline: HashSet<String> = self
            .vectors
            .bulk_read_metadata()
            .await?
            .into_iter()
            .map(|m| m.url)
            .collect();
        info!("{} documents already indexed", baseline.len());

        let indexed = Arc::new(Mutex::new(baseline));
        let stats = Arc::new(Mutex::new(ReconcileStats::default()));
        let semaphore = Arc::new(Semaphore::new(options.worker_count));
        let mut handles = Vec::new();

        let mut offset = 0u32;
        let mut processed = 0u64;

        'pages: loop {
            let page = self
                .articles
                .fetch_page(&options.range, options.fetch_page_size, offset)
                .await?;
            if page.is_empty() {
                break;
            }
            processed += page.len() as u64;

            let (fresh, already): (Vec<Article>, Vec<Article>) = {
                let indexed = indexed.lock().await;
                page.into_iter().partition(|a| !indexed.contains(&a.url))
            };
            if !already.is_empty() {
                stats.lock().await.skipped += already.len();
            }

            for chunk in fresh.chunks(options.embed_batch_size) {
                if self.shutdown.load(Ordering::SeqCst) {
                    warn!("shutdown requested, no further chunks will be scheduled");
                    break 'pages;
                }

                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Storage(format!("worker pool closed: {}", e)))?;
                let chunk: Vec<Article> = chunk.to_vec();
                let embedder = self.embedder.clone();
                let vectors = self.vectors.clone();
                let indexed = indexed.clone();
                let stats = stats.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    match embed_and_upsert(&embedder, &vectors, &chunk).await {
                        Ok(keys) => {
                            let mut indexed = indexed.lock().await;
                            for key in keys {
                                indexed.insert(key);
                            }
                            drop(indexed);
                            stats.lock().await.added += chunk.len();
                        }
                        Err(e) => {
                            error!("failed to index a chunk of {}: {}", chunk.len(), e);
                            stats.lock().await.failed += chunk.len();
                        }
                    }
                }));
            }

            {
                let s = *stats.lock().await;
                info!(
                    "progress: {}/{} | added: {} | skipped: {} | failed: {}",
                    processed, total, s.added, s.skipped, s.failed
                );
            }
            offset += options.fetch_page_size;
        }

        // In-flight chunks finish before the run reports.
        join_all(handles).await;

        let final_stats = *stats.lock().await;
        info!(
            "done - added: {} | skipped: {} | failed: {}",
            final_stats.added, final_stats.skipped, final_stats.failed
        );
        Ok(final_stats)
    }

    /// Delete the entire vector store content. Irreversible; the caller is
    /// responsible for confirming first. Returns the removed count.
    pub async fn clear(&self) -> Result<u64> {
        let count = self.vectors.count().await?;
        warn!("removing {} indexed documents", count);
        let removed = self.vectors.delete_all().await?;
        info!("vector store cleared");
        Ok(removed)
    }

    /// Read-only snapshot of database and index counts.
    pub async fn stats(&self) -> Result<IndexStats> {
        let db_count = self.articles.count(&DateRange::default()).await?;
        let indexed_doc_count = self.vectors.count().await?;
        let keys: HashSet<String> = self
            .vectors
            .bulk_read_metadata()
            .await?
            .into_iter()
            .map(|m| m.url)
            .collect();
        let indexed_key_count = keys.len() as u64;

        Ok(IndexStats {
            db_count,
            indexed_doc_count,
            indexed_key_count,
            unindexed_count: db_count.saturating_sub(indexed_key_count),
        })
    }
}
