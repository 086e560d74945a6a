pub mod pipeline;
pub mod retrieval;

pub use pipeline::{IndexPipeline, ReconcileOptions};
pub use retrieval::{RetrievalEngine, MAX_DISPLAY_COUNT};
