use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::{Error, Result};

/// A news article as stored in the relational database. Owned and mutated
/// by the article store; the index treats it as read-only. `url` is the
/// unique natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub url: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Scalar metadata stored next to each embedding vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub article_id: i64,
    pub title: String,
    pub url: String,
    pub date: NaiveDate,
    pub date_int: i32,
}

/// One indexed document per article: the embedded text plus its metadata.
/// Never updated in place; a reindex deletes and recreates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub page_text: String,
    pub metadata: DocMetadata,
}

impl From<&Article> for IndexedDocument {
    fn from(article: &Article) -> Self {
        Self {
            page_text: format!("{}\n\n{}", article.title, article.content),
            metadata: DocMetadata {
                article_id: article.id,
                title: article.title.clone(),
                url: article.url.clone(),
                date: article.date,
                date_int: dates::encode(article.date),
            },
        }
    }
}

/// Inclusive calendar date range; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(Error::Validation(format!(
                    "end date {} is before start date {}",
                    end, start
                )));
            }
        }
        Ok(())
    }
}

/// An ephemeral retrieval request. A present `free_text` selects the
/// semantic strategy; its absence selects the structured listing strategy.
/// The substring filters apply to either.
#[derive(Debug, Clone, Default)]
pub struct RetrievalQuery {
    pub free_text: Option<String>,
    pub k: Option<usize>,
    pub start_date_int: Option<i32>,
    pub end_date_int: Option<i32>,
    pub title_contains: Option<String>,
    pub content_contains: Option<String>,
}

impl RetrievalQuery {
    pub fn has_substring_filter(&self) -> bool {
        self.title_contains.is_some() || self.content_contains.is_some()
    }

    /// Reject malformed queries before any store access.
    pub fn validate(&self) -> Result<()> {
        let start = self.start_date_int.map(dates::decode).transpose()?;
        let end = self.end_date_int.map(dates::decode).transpose()?;
        DateRange::new(start, end).validate()
    }
}

/// One entry of a shaped retrieval result: either a real match or the
/// trailing overflow notice appended when true matches exceed the display
/// ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrievalRecord {
    Hit {
        title: String,
        date: NaiveDate,
        url: String,
        content: String,
    },
    Notice {
        total: usize,
        notice: String,
    },
}

/// Ordered, bounded sequence of retrieval records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub records: Vec<RetrievalRecord>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome counters of one reconcile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Read-only index statistics reported by the stats command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub db_count: u64,
    pub indexed_doc_count: u64,
    pub indexed_key_count: u64,
    pub unindexed_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article {
            id: 7,
            date: NaiveDate::from_ymd_opt(2025, 1, 18).unwrap(),
            title: "特斯拉中国1月销量数据公布".to_string(),
            url: "https://news.example.com/tesla-january".to_string(),
            content: "特斯拉公布了一月销量。".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn document_derives_page_text_and_metadata() {
        let a = article();
        let doc = IndexedDocument::from(&a);

        assert_eq!(
            doc.page_text,
            "特斯拉中国1月销量数据公布\n\n特斯拉公布了一月销量。"
        );
        assert_eq!(doc.metadata.article_id, 7);
        assert_eq!(doc.metadata.url, a.url);
        assert_eq!(doc.metadata.date_int, 20250118);
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 2, 1),
            NaiveDate::from_ymd_opt(2025, 1, 1),
        );
        assert!(range.validate().is_err());

        let open = DateRange::new(None, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(open.validate().is_ok());
    }

    #[test]
    fn query_rejects_inverted_and_impossible_date_ints() {
        let inverted = RetrievalQuery {
            start_date_int: Some(20250201),
            end_date_int: Some(20250101),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let impossible = RetrievalQuery {
            start_date_int: Some(20250231),
            ..Default::default()
        };
        assert!(impossible.validate().is_err());

        let ok = RetrievalQuery {
            start_date_int: Some(20250101),
            end_date_int: Some(20250131),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }
}
