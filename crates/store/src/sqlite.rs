//! SQLite document store.
//!
//! One table, `chunks`, keyed by (collection, chunk_index). Embeddings are
//! stored as little-endian f32 BLOBs and ranked in Rust at query time; a
//! single document is small enough that a full scan per query is fine.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tazmic_core::document::{DocumentChunk, DocumentStore, Embedder};
use tazmic_core::error::StoreError;
use tracing::{debug, info};

use crate::chunker::Chunker;
use crate::embedder::embed_chunks;
use crate::vector::{decode_embedding, encode_embedding, rank_chunks};

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    min_score: f32,
}

impl SqliteDocumentStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(
        path: &str,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::InvalidConfig(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            embedder,
            chunker,
            min_score: 0.0,
        };
        store.run_migrations().await?;
        info!(path, embedder = store.embedder.name(), "SQLite document store initialized");
        Ok(store)
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                collection   TEXT NOT NULL,
                chunk_index  INTEGER NOT NULL,
                content      TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                embedding    BLOB NOT NULL,
                created_at   TEXT NOT NULL,
                PRIMARY KEY (collection, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("chunks table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentChunk, StoreError> {
        let collection: String = row
            .try_get("collection")
            .map_err(|e| StoreError::QueryFailed(format!("collection column: {e}")))?;
        let chunk_index: i64 = row
            .try_get("chunk_index")
            .map_err(|e| StoreError::QueryFailed(format!("chunk_index column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let start_offset: i64 = row
            .try_get("start_offset")
            .map_err(|e| StoreError::QueryFailed(format!("start_offset column: {e}")))?;
        let blob: Vec<u8> = row
            .try_get("embedding")
            .map_err(|e| StoreError::QueryFailed(format!("embedding column: {e}")))?;

        Ok(DocumentChunk {
            collection,
            chunk_index: chunk_index as usize,
            content,
            start_offset: start_offset as usize,
            embedding: decode_embedding(&blob),
            score: 0.0,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn index(&self, collection: &str, text: &str) -> Result<usize, StoreError> {
        if self.count(collection).await? > 0 {
            return Err(StoreError::CollectionExists(collection.to_string()));
        }

        let pieces = self.chunker.split(text);
        if pieces.is_empty() {
            debug!(collection, "Nothing to index");
            return Ok(0);
        }
        let chunks = embed_chunks(self.embedder.as_ref(), collection, pieces).await?;
        let created_at = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        for chunk in &chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (collection, chunk_index, content, start_offset, embedding, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&chunk.collection)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(chunk.start_offset as i64)
            .bind(encode_embedding(&chunk.embedding))
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent indexer inserting the same keys surfaces here
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    StoreError::CollectionExists(collection.to_string())
                } else {
                    StoreError::Storage(format!("INSERT failed: {e}"))
                }
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        info!(collection, chunks = chunks.len(), "Indexed document");
        Ok(chunks.len())
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

        let rows = sqlx::query("SELECT * FROM chunks WHERE collection = ?1 ORDER BY chunk_index")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("chunk scan: {e}")))?;

        if rows.is_empty() {
            debug!(collection, "Query against empty or unknown collection");
            return Ok(Vec::new());
        }

        let chunks = rows
            .iter()
            .map(Self::row_to_chunk)
            .collect::<Result<Vec<_>, _>>()?;

        let query_embedding = self.embedder.embed_one(text).await?;
        Ok(rank_chunks(chunks, &query_embedding, k, self.min_score))
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM chunks WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT failed: {e}")))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("count column: {e}")))?;
        Ok(count as usize)
    }

    async fn collections(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT collection FROM chunks ORDER BY collection")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("collections: {e}")))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("collection")
                    .map_err(|e| StoreError::QueryFailed(format!("collection column: {e}")))
            })
            .collect()
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chunks WHERE collection = ?1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteDocumentStore {
        let path = dir.path().join("documents.db");
        SqliteDocumentStore::new(
            &format!("sqlite://{}", path.display()),
            Arc::new(HashingEmbedder::default()),
            Chunker::new(60, 10).unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn index_and_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let n = store.index("doc", "the sky is blue").await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.count("doc").await.unwrap(), 1);

        let results = store.query("doc", "what color is the sky", 20).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "the sky is blue");
        assert_eq!(results[0].embedding.len(), 256);
    }

    #[tokio::test]
    async fn ranks_relevant_chunk_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let text = "Mitochondria produce energy for the cell.\n\n\
                    The sky appears blue because of Rayleigh scattering.\n\n\
                    Rust guarantees memory safety without garbage collection.";
        let n = store.index("doc", text).await.unwrap();
        assert_eq!(n, 3);

        let results = store.query("doc", "why is the sky blue", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("sky"));
    }

    #[tokio::test]
    async fn empty_cases() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        assert!(store.query("missing", "x", 5).await.unwrap().is_empty());
        assert_eq!(store.index("blank", "   \n ").await.unwrap(), 0);
        store.index("doc", "the sky is blue").await.unwrap();
        assert!(store.query("doc", "sky", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reindex_rejected_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store.index("doc", "first version").await.unwrap();
        let err = store.index("doc", "second version").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionExists(_)));

        assert_eq!(store.collections().await.unwrap(), vec!["doc".to_string()]);
        assert!(store.drop_collection("doc").await.unwrap());
        assert!(store.collections().await.unwrap().is_empty());
        store.index("doc", "second version").await.unwrap();

        let results = store.query("doc", "version", 5).await.unwrap();
        assert_eq!(results[0].content, "second version");
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = test_store(&dir).await;
            store.index("doc", "the sky is blue").await.unwrap();
        }
        let store = test_store(&dir).await;
        assert_eq!(store.count("doc").await.unwrap(), 1);
    }
}
