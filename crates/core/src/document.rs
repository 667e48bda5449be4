//! Document store and embedder traits.
//!
//! A store holds one or more collections; each collection is the chunked,
//! embedded text of a single document. Indexing happens once, before any
//! query, and chunks are immutable afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A contiguous span of an indexed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Collection this chunk belongs to
    pub collection: String,

    /// Position of the chunk within its document (0-based)
    pub chunk_index: usize,

    /// The chunk text
    pub content: String,

    /// Character offset of the chunk start in the source document
    pub start_offset: usize,

    /// Embedding vector (not serialized in API responses)
    #[serde(skip)]
    pub embedding: Vec<f32>,

    /// Cosine similarity to the query (set by query operations)
    #[serde(default)]
    pub score: f32,
}

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, StoreError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, StoreError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| StoreError::Embedding("embedder returned no vectors".into()))
    }
}

/// Chunked, embedded document storage with similarity lookup.
///
/// Implementations: SQLite (persistent) and in-memory.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Chunk, embed and persist `text` under `collection`.
    ///
    /// Returns the number of chunks stored. Indexing a collection that
    /// already holds chunks fails with [`StoreError::CollectionExists`].
    async fn index(&self, collection: &str, text: &str) -> std::result::Result<usize, StoreError>;

    /// Up to `k` chunks of `collection` most similar to `text`, best first.
    ///
    /// An unknown or empty collection yields an empty vector, not an error.
    async fn query(
        &self,
        collection: &str,
        text: &str,
        k: usize,
    ) -> std::result::Result<Vec<DocumentChunk>, StoreError>;

    /// Number of chunks stored for `collection`.
    async fn count(&self, collection: &str) -> std::result::Result<usize, StoreError>;

    /// Names of all indexed collections, sorted.
    async fn collections(&self) -> std::result::Result<Vec<String>, StoreError>;

    /// Remove a collection. Returns whether anything was deleted.
    async fn drop_collection(&self, collection: &str) -> std::result::Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        fn name(&self) -> &str {
            "constant"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn embed_one_uses_batch_path() {
        let v = ConstantEmbedder.embed_one("hello").await.unwrap();
        assert_eq!(v, vec![1.0, 0.0]);
    }

    #[test]
    fn chunk_skips_embedding_in_json() {
        let chunk = DocumentChunk {
            collection: "doc".into(),
            chunk_index: 0,
            content: "the sky is blue".into(),
            start_offset: 0,
            embedding: vec![0.5; 4],
            score: 0.9,
        };
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("embedding"));
        assert!(json.contains("the sky is blue"));
    }
}
