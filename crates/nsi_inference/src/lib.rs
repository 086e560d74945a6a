pub mod providers;

pub use providers::{create_provider, DummyProvider, OllamaProvider};

pub mod prelude {
    pub use super::providers::create_provider;
    pub use nsi_core::{EmbeddingProvider, Error, Result};
}
