
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::store::{StoredChunk, VectorStore};
use crate::{RagError, Result};

/// One ranked retrieval result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchHit {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Exact full-scan retriever over the vector store.
///
/// Correct at small-to-moderate corpus sizes; an approximate index can be
/// substituted behind the same contract as long as exact-search ranking and
/// score semantics stay observably identical.
pub struct Retriever {
    store: Arc<VectorStore>,
}

impl Retriever {
    #[inline]
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Rank every stored chunk against `query_vector` by cosine similarity
    /// and return the `top_k` best.
    ///
    /// Ordering is descending by score with ties broken ascending by
    /// `(document_id, sequence_index)`. `top_k == 0` yields an empty result;
    /// `top_k` beyond the corpus size yields the whole corpus ranked.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if let Some(dimension) = self.store.dimension().await {
            if query_vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: query_vector.len(),
                });
            }
        }

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let chunks = self.store.all_chunks().await?;
        let corpus_size = chunks.len();

        let hits: Vec<SearchHit> = chunks
            .into_iter()
            .map(|chunk| {
                let score = cosine_similarity(query_vector, &chunk.vector);
                SearchHit { chunk, score }
            })
            .sorted_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
                    .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
            })
            .take(top_k)
            .collect();

        debug!(
            "Ranked {} chunks, returning top {}",
            corpus_size,
            hits.len()
        );
        Ok(hits)
    }
}

/// Cosine similarity between two equal-length vectors.
///
/// A zero-norm vector scores 0.0 against anything instead of dividing by
/// zero.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
