//! In-memory document store — useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tazmic_core::document::{DocumentChunk, DocumentStore, Embedder};
use tazmic_core::error::StoreError;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::chunker::Chunker;
use crate::embedder::embed_chunks;
use crate::vector::rank_chunks;

/// A document store that keeps every collection's chunks in a HashMap.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<DocumentChunk>>>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    min_score: f32,
}

impl InMemoryDocumentStore {
    pub fn new(embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            embedder,
            chunker,
            min_score: 0.0,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn index(&self, collection: &str, text: &str) -> Result<usize, StoreError> {
        if self.collections.read().await.contains_key(collection) {
            return Err(StoreError::CollectionExists(collection.to_string()));
        }

        let pieces = self.chunker.split(text);
        if pieces.is_empty() {
            debug!(collection, "Nothing to index");
            return Ok(0);
        }
        let chunks = embed_chunks(self.embedder.as_ref(), collection, pieces).await?;
        let count = chunks.len();

        // Re-check under the write lock; another indexer may have won the race.
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Err(StoreError::CollectionExists(collection.to_string()));
        }
        collections.insert(collection.to_string(), chunks);

        info!(collection, chunks = count, "Indexed document");
        Ok(count)
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        k: usize,
    ) -> Result<Vec<DocumentChunk>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = match self.collections.read().await.get(collection) {
            Some(chunks) if !chunks.is_empty() => chunks.clone(),
            _ => {
                debug!(collection, "Query against empty or unknown collection");
                return Ok(Vec::new());
            }
        };

        let query_embedding = self.embedder.embed_one(text).await?;
        Ok(rank_chunks(candidates, &query_embedding, k, self.min_score))
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, |chunks| chunks.len()))
    }

    async fn collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool, StoreError> {
        Ok(self.collections.write().await.remove(collection).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;

    fn store() -> InMemoryDocumentStore {
        InMemoryDocumentStore::new(Arc::new(HashingEmbedder::default()), Chunker::default())
    }

    #[tokio::test]
    async fn index_and_query() {
        let store = store();
        let n = store.index("doc", "the sky is blue").await.unwrap();
        assert_eq!(n, 1);

        let results = store.query("doc", "what color is the sky", 20).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "the sky is blue");
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn unknown_collection_is_empty() {
        let store = store();
        let results = store.query("missing", "anything", 5).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(store.count("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_k_is_empty() {
        let store = store();
        store.index("doc", "the sky is blue").await.unwrap();
        assert!(store.query("doc", "sky", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn never_returns_more_than_k() {
        let store = InMemoryDocumentStore::new(
            Arc::new(HashingEmbedder::default()),
            Chunker::new(30, 5).unwrap(),
        );
        let text = "cells divide often. ".repeat(20);
        let n = store.index("doc", &text).await.unwrap();
        assert!(n > 3);

        let results = store.query("doc", "cells divide", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn reindex_is_rejected() {
        let store = store();
        store.index("doc", "first").await.unwrap();
        let err = store.index("doc", "second").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionExists(name) if name == "doc"));
        assert_eq!(store.count("doc").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn drop_and_reindex() {
        let store = store();
        store.index("doc", "first").await.unwrap();
        store.index("other", "second").await.unwrap();
        assert_eq!(store.collections().await.unwrap(), vec!["doc", "other"]);

        assert!(store.drop_collection("doc").await.unwrap());
        assert!(!store.drop_collection("doc").await.unwrap());
        assert_eq!(store.index("doc", "third").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn min_score_filters_everything() {
        let store = store().with_min_score(0.99);
        store.index("doc", "the sky is blue").await.unwrap();
        let results = store.query("doc", "mitochondria", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
