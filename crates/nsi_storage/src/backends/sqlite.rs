use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use nsi_core::types::{Article, DateRange, DocMetadata, IndexedDocument};
use nsi_core::{ArticleStore, DateIntFilter, Error, Result, ScoredDocument, VectorStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;

use crate::cosine_distance;

const ARTICLE_MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news_articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_news_articles_date ON news_articles(date)",
    // Add future migrations here
];

const INDEX_MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS indexed_docs (
        url TEXT PRIMARY KEY,
        article_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        date TEXT NOT NULL,
        date_int INTEGER NOT NULL,
        page_text TEXT NOT NULL,
        embedding TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_indexed_docs_date_int ON indexed_docs(date_int)",
    // Add future migrations here
];

async fn open_pool(db_path: &Path, migrations: &[&str]) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options)
        .await
        .map_err(|e| Error::Database(format!("failed to connect to {}: {}", db_path.display(), e)))?;

    for (i, migration) in migrations.iter().enumerate() {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .map_err(|e| Error::Database(format!("failed to run migration {}: {}", i, e)))?;
    }

    Ok(pool)
}

/// Relational store of articles. This is the source of truth; the index
/// never writes here. `insert_article` belongs to the store's own surface
/// and is used by ingestion and test fixtures.
pub struct SqliteArticleStore {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl SqliteArticleStore {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        let pool = open_pool(db_path, ARTICLE_MIGRATIONS).await?;
        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn insert_article(
        &self,
        date: NaiveDate,
        title: &str,
        url: &str,
        content: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO news_articles (date, title, url, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(date)
        .bind(title)
        .bind(url)
        .bind(content)
        .bind(Utc::now())
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("failed to insert article: {}", e)))?;

        Ok(result.last_insert_rowid())
    }
}

fn row_to_article(row: &SqliteRow) -> Article {
    Article {
        id: row.get::<i64, _>("id"),
        date: row.get::<NaiveDate, _>("date"),
        title: row.get::<String, _>("title"),
        url: row.get::<String, _>("url"),
        content: row.get::<String, _>("content"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    }
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn fetch_page(
        &self,
        range: &DateRange,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Article>> {
        let mut sql = String::from(
            "SELECT id, date, title, url, content, created_at FROM news_articles WHERE 1=1",
        );
        if range.start.is_some() {
            sql.push_str(" AND date >= ?");
        }
        if range.end.is_some() {
            sql.push_str(" AND date <= ?");
        }
        sql.push_str(" ORDER BY date ASC, url ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(start) = range.start {
            query = query.bind(start);
        }
        if let Some(end) = range.end {
            query = query.bind(end);
        }

        let rows = query
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("failed to fetch article page: {}", e)))?;

        Ok(rows.iter().map(row_to_article).collect())
    }

    async fn count(&self, range: &DateRange) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM news_articles WHERE 1=1");
        if range.start.is_some() {
            sql.push_str(" AND date >= ?");
        }
        if range.end.is_some() {
            sql.push_str(" AND date <= ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(start) = range.start {
            query = query.bind(start);
        }
        if let Some(end) = range.end {
            query = query.bind(end);
        }

        let row = query
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("failed to count articles: {}", e)))?;

        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn fetch_by_date_range_desc(
        &self,
        range: &DateRange,
        title_contains: Option<&str>,
        content_contains: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Article>> {
        let mut sql = String::from(
            "SELECT id, date, title, url, content, created_at FROM news_articles WHERE 1=1",
        );
        if range.start.is_some() {
            sql.push_str(" AND date >= ?");
        }
        if range.end.is_some() {
            sql.push_str(" AND date <= ?");
        }
        // LOWER in sqlite folds ASCII only; CJK text has no case and is unaffected.
        if title_contains.is_some() {
            sql.push_str(" AND LOWER(title) LIKE ?");
        }
        if content_contains.is_some() {
            sql.push_str(" AND LOWER(content) LIKE ?");
        }
        sql.push_str(" ORDER BY date DESC, url ASC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(start) = range.start {
            query = query.bind(start);
        }
        if let Some(end) = range.end {
            query = query.bind(end);
        }
        if let Some(keyword) = title_contains {
            query = query.bind(format!("%{}%", keyword.to_lowercase()));
        }
        if let Some(keyword) = content_contains {
            query = query.bind(format!("%{}%", keyword.to_lowercase()));
        }

        let rows = query
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("failed to list articles: {}", e)))?;

        Ok(rows.iter().map(row_to_article).collect())
    }
}

/// SQLite-persisted vector store: one row per indexed document keyed by the
/// article url, embedding serialized as JSON text. Distances are computed
/// in process over the rows passing the date predicate.
pub struct SqliteVectorStore {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl SqliteVectorStore {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        let pool = open_pool(db_path, INDEX_MIGRATIONS).await?;
        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn row_to_metadata(row: &SqliteRow) -> DocMetadata {
    DocMetadata {
        article_id: row.get::<i64, _>("article_id"),
        title: row.get::<String, _>("title"),
        url: row.get::<String, _>("url"),
        date: row.get::<NaiveDate, _>("date"),
        date_int: row.get::<i32, _>("date_int"),
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, batch: &[(IndexedDocument, Vec<f32>)]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Storage(format!("failed to open upsert transaction: {}", e)))?;

        for (doc, embedding) in batch {
            let embedding_json = serde_json::to_string(embedding)?;
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO indexed_docs
                (url, article_id, title, date, date_int, page_text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&doc.metadata.url)
            .bind(doc.metadata.article_id)
            .bind(&doc.metadata.title)
            .bind(doc.metadata.date)
            .bind(doc.metadata.date_int)
            .bind(&doc.page_text)
            .bind(&embedding_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Storage(format!("failed to upsert document: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Storage(format!("failed to commit upsert batch: {}", e)))?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &DateIntFilter,
    ) -> Result<Vec<ScoredDocument>> {
        let mut sql = String::from(
            "SELECT article_id, title, url, date, date_int, page_text, embedding \
             FROM indexed_docs WHERE 1=1",
        );
        if filter.min.is_some() {
            sql.push_str(" AND date_int >= ?");
        }
        if filter.max.is_some() {
            sql.push_str(" AND date_int <= ?");
        }

        let mut sql_query = sqlx::query(&sql);
        if let Some(min) = filter.min {
            sql_query = sql_query.bind(min);
        }
        if let Some(max) = filter.max {
            sql_query = sql_query.bind(max);
        }

        let rows = sql_query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to search documents: {}", e)))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let embedding: Vec<f32> = serde_json::from_str(&row.get::<String, _>("embedding"))?;
            hits.push(ScoredDocument {
                document: IndexedDocument {
                    page_text: row.get::<String, _>("page_text"),
                    metadata: row_to_metadata(row),
                },
                distance: cosine_distance(query, &embedding),
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.document.metadata.url.cmp(&b.document.metadata.url))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn bulk_read_metadata(&self) -> Result<Vec<DocMetadata>> {
        let rows = sqlx::query("SELECT article_id, title, url, date, date_int FROM indexed_docs")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to read document metadata: {}", e)))?;

        Ok(rows.iter().map(row_to_metadata).collect())
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) FROM indexed_docs")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to count documents: {}", e)))?;

        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM indexed_docs")
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to clear documents: {}", e)))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn seeded_store(dir: &Path) -> SqliteArticleStore {
        let store = SqliteArticleStore::new_with_path(&dir.join("news.db"))
            .await
            .unwrap();

        let rows = [
            (2025, 1, 1, "元旦假期出行数据", "https://n.example.com/jan-01"),
            (2025, 1, 2, "Tesla 上海工厂扩产", "https://n.example.com/jan-02"),
            (2025, 1, 3, "低空经济政策出台", "https://n.example.com/jan-03"),
            (2025, 2, 1, "特斯拉发布新车型", "https://n.example.com/feb-01"),
            (2025, 2, 2, "芯片行业月度回顾", "https://n.example.com/feb-02"),
        ];
        for (y, m, d, title, url) in rows {
            store
                .insert_article(
                    NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                    title,
                    url,
                    &format!("{} 的正文内容。", title),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn pages_ascending_with_range_and_offset() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1),
            NaiveDate::from_ymd_opt(2025, 1, 31),
        );
        assert_eq!(store.count(&range).await.unwrap(), 3);

        let first = store.fetch_page(&range, 2, 0).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].url, "https://n.example.com/jan-01");
        assert_eq!(first[1].url, "https://n.example.com/jan-02");

        let second = store.fetch_page(&range, 2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].url, "https://n.example.com/jan-03");

        let empty = store.fetch_page(&range, 2, 4).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn listing_is_descending_and_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let all = store
            .fetch_by_date_range_desc(&DateRange::default(), None, None, 100)
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].url, "https://n.example.com/feb-02");
        assert_eq!(all[4].url, "https://n.example.com/jan-01");

        let tesla = store
            .fetch_by_date_range_desc(&DateRange::default(), Some("tesla"), None, 100)
            .await
            .unwrap();
        assert_eq!(tesla.len(), 1);
        assert_eq!(tesla[0].url, "https://n.example.com/jan-02");

        let cjk = store
            .fetch_by_date_range_desc(&DateRange::default(), Some("特斯拉"), None, 100)
            .await
            .unwrap();
        assert_eq!(cjk.len(), 1);
        assert_eq!(cjk[0].url, "https://n.example.com/feb-01");

        let by_content = store
            .fetch_by_date_range_desc(&DateRange::default(), None, Some("低空经济"), 100)
            .await
            .unwrap();
        assert_eq!(by_content.len(), 1);

        let limited = store
            .fetch_by_date_range_desc(&DateRange::default(), None, None, 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    fn test_doc(url: &str, date: NaiveDate, title: &str) -> IndexedDocument {
        let article = Article {
            id: 1,
            date,
            title: title.to_string(),
            url: url.to_string(),
            content: format!("{} 正文", title),
            created_at: Utc::now(),
        };
        IndexedDocument::from(&article)
    }

    #[tokio::test]
    async fn vector_store_round_trips_and_persists() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();

        {
            let store = SqliteVectorStore::new_with_path(&db_path).await.unwrap();
            store
                .upsert(&[
                    (test_doc("https://n.example.com/a", date, "close"), vec![1.0, 0.0]),
                    (test_doc("https://n.example.com/b", date, "far"), vec![0.0, 1.0]),
                ])
                .await
                .unwrap();

            let hits = store
                .similarity_search(&[1.0, 0.0], 2, &DateIntFilter::default())
                .await
                .unwrap();
            assert_eq!(hits[0].document.metadata.title, "close");
            assert!(hits[0].distance < hits[1].distance);
        }

        // Reopen: documents survive the process.
        let reopened = SqliteVectorStore::new_with_path(&db_path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);

        let meta = reopened.bulk_read_metadata().await.unwrap();
        assert_eq!(meta.len(), 2);
        assert!(meta.iter().all(|m| m.date_int == 20250115));
    }

    #[tokio::test]
    async fn vector_store_upsert_replaces_and_filters_by_date() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::new_with_path(&dir.path().join("index.db"))
            .await
            .unwrap();

        let jan = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let feb = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();

        store
            .upsert(&[(test_doc("https://n.example.com/a", jan, "v1"), vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&[
                (test_doc("https://n.example.com/a", jan, "v2"), vec![1.0, 0.0]),
                (test_doc("https://n.example.com/b", feb, "other"), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);

        let filter = DateIntFilter {
            min: Some(20250101),
            max: Some(20250131),
        };
        let hits = store.similarity_search(&[1.0, 0.0], 10, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.metadata.title, "v2");

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
