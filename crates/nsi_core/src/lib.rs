pub mod dates;
pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use error::Error;
pub use models::EmbeddingProvider;
pub use storage::{ArticleStore, DateIntFilter, ScoredDocument, VectorStore};
pub use types::{
    Article, DateRange, DocMetadata, IndexStats, IndexedDocument, ReconcileStats,
    RetrievalQuery, RetrievalRecord, RetrievalResult,
};

pub type Result<T> = std::result::Result<T, Error>;
