pub mod backends;

pub use backends::*;

pub mod prelude {
    pub use super::backends::*;
    pub use nsi_core::{ArticleStore, VectorStore};
}
