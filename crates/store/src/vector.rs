//! Vector similarity and ranking utilities.

use tazmic_core::document::DocumentChunk;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank chunks by cosine similarity to a query embedding.
///
/// Returns at most `k` chunks, best first, with `score` set. Chunks below
/// `min_score` are dropped. Ties keep document order.
pub fn rank_chunks(
    chunks: impl IntoIterator<Item = DocumentChunk>,
    query_embedding: &[f32],
    k: usize,
    min_score: f32,
) -> Vec<DocumentChunk> {
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<DocumentChunk> = chunks
        .into_iter()
        .filter_map(|mut chunk| {
            let sim = cosine_similarity(&chunk.embedding, query_embedding);
            (sim >= min_score).then(|| {
                chunk.score = sim;
                chunk
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
    });
    scored.truncate(k);
    scored
}

/// Scale a vector to unit length in place. Zero vectors are left alone.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Little-endian f32 encoding used for embedding BLOB columns.
pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            collection: "doc".into(),
            chunk_index: index,
            content: format!("Content for {index}"),
            start_offset: index * 10,
            embedding,
            score: 0.0,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_or_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn rank_orders_best_first_and_truncates() {
        let chunks = vec![
            chunk(0, vec![0.0, 1.0]),
            chunk(1, vec![1.0, 0.0]),
            chunk(2, vec![0.7, 0.7]),
        ];
        let ranked = rank_chunks(chunks, &[1.0, 0.0], 2, -1.0);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk_index, 1);
        assert_eq!(ranked[1].chunk_index, 2);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn rank_with_zero_k_is_empty() {
        let ranked = rank_chunks(vec![chunk(0, vec![1.0])], &[1.0], 0, 0.0);
        assert!(ranked.is_empty());
    }

    #[test]
    fn rank_applies_min_score() {
        let chunks = vec![chunk(0, vec![1.0, 0.0]), chunk(1, vec![-1.0, 0.0])];
        let ranked = rank_chunks(chunks, &[1.0, 0.0], 10, 0.5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk_index, 0);
    }

    #[test]
    fn normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn embedding_blob_roundtrip() {
        let v = vec![0.25, -1.5, 3.0];
        let blob = encode_embedding(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(decode_embedding(&blob), v);
    }
}
