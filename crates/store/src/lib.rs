//! Document store implementations for TAZMIC.
//!
//! A store chunks one document, embeds the chunks, and answers similarity
//! queries against them. Backends: SQLite (default, persistent) and
//! in-memory.

pub mod chunker;
pub mod embedder;
pub mod in_memory;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use tazmic_config::{AppConfig, EmbeddingProvider, StoreBackend};
use tazmic_core::document::{DocumentStore, Embedder};
use tazmic_core::error::StoreError;
use tazmic_core::provider::Provider;

pub use chunker::{Chunker, TextChunk};
pub use embedder::{HashingEmbedder, ProviderEmbedder};
pub use in_memory::InMemoryDocumentStore;
pub use vector::{cosine_similarity, rank_chunks};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDocumentStore;

/// Build the configured embedder. The provider is only needed when
/// embeddings come from the model endpoint.
pub fn build_embedder(
    config: &AppConfig,
    provider: Option<Arc<dyn Provider>>,
) -> Result<Arc<dyn Embedder>, StoreError> {
    match config.embedding.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.embedding.dimensions))),
        EmbeddingProvider::Openai => {
            let provider = provider.ok_or_else(|| {
                StoreError::InvalidConfig(
                    "embedding.provider = \"openai\" needs a configured model provider".into(),
                )
            })?;
            Ok(Arc::new(
                ProviderEmbedder::new(provider, &config.embedding.model, config.embedding.dimensions)
                    .with_batch_size(config.embedding.batch_size),
            ))
        }
    }
}

/// Build the configured document store.
pub async fn build_from_config(
    config: &AppConfig,
    provider: Option<Arc<dyn Provider>>,
) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let embedder = build_embedder(config, provider)?;
    let chunker = Chunker::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;
    let min_score = config.retrieval.min_score;

    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(
            InMemoryDocumentStore::new(embedder, chunker).with_min_score(min_score),
        )),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            let path = config.store.resolved_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            let store = SqliteDocumentStore::new(&url, embedder, chunker).await?;
            Ok(Arc::new(store.with_min_score(min_score)))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(StoreError::InvalidConfig(
            "built without the \"sqlite\" feature; set store.backend = \"memory\"".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_memory_store_with_hashing() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.embedding.provider = EmbeddingProvider::Hashing;
        config.embedding.dimensions = 64;

        let store = build_from_config(&config, None).await.unwrap();
        assert_eq!(store.name(), "in_memory");
        store.index("doc", "the sky is blue").await.unwrap();
        assert_eq!(store.count("doc").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn provider_embeddings_need_a_provider() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Memory;
        let err = build_from_config(&config, None).await.err().unwrap();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn builds_sqlite_store_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.embedding.provider = EmbeddingProvider::Hashing;
        config.store.path = Some(dir.path().join("nested").join("docs.db"));

        let store = build_from_config(&config, None).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(dir.path().join("nested").exists());
    }
}
