//! Embedder implementations.
//!
//! - [`ProviderEmbedder`] calls the configured provider's embeddings endpoint.
//! - [`HashingEmbedder`] is an offline, deterministic bag-of-words embedder.

use std::sync::Arc;

use async_trait::async_trait;
use tazmic_core::document::{DocumentChunk, Embedder};
use tazmic_core::error::StoreError;
use tazmic_core::provider::{EmbeddingRequest, Provider};
use tracing::debug;

use crate::chunker::TextChunk;
use crate::vector::normalize;

/// Embeds text through a [`Provider`], in batches.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimensions,
            batch_size: 64,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = batch.len(), "Embedding batch");
            let response = self
                .provider
                .embed(EmbeddingRequest {
                    model: self.model.clone(),
                    inputs: batch.to_vec(),
                })
                .await
                .map_err(|e| StoreError::Embedding(e.to_string()))?;

            if response.embeddings.len() != batch.len() {
                return Err(StoreError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }
            vectors.extend(response.embeddings);
        }

        Ok(vectors)
    }
}

/// Feature-hashing embedder: lowercase alphanumeric tokens are hashed into
/// a fixed number of signed buckets and the result is L2-normalized.
///
/// Texts sharing words get positive cosine similarity, which is enough for
/// offline use and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ *b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Embed chunker output into storable [`DocumentChunk`]s for `collection`.
pub async fn embed_chunks(
    embedder: &dyn Embedder,
    collection: &str,
    pieces: Vec<TextChunk>,
) -> Result<Vec<DocumentChunk>, StoreError> {
    let texts: Vec<String> = pieces.iter().map(|p| p.content.clone()).collect();
    let embeddings = embedder.embed(&texts).await?;

    if embeddings.len() != pieces.len() {
        return Err(StoreError::Embedding(format!(
            "embedder '{}' returned {} vectors for {} chunks",
            embedder.name(),
            embeddings.len(),
            pieces.len()
        )));
    }

    Ok(pieces
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(chunk_index, (piece, embedding))| DocumentChunk {
            collection: collection.to_string(),
            chunk_index,
            content: piece.content,
            start_offset: piece.start_offset,
            embedding,
            score: 0.0,
        })
        .collect())
}
