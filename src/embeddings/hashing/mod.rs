
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::embeddings::Embedder;

/// Deterministic local embedding backend.
///
/// Hashes word unigrams and adjacent bigrams into a fixed number of buckets
/// and L2-normalizes the result. Not a semantic model, but stable across
/// processes and platforms, which makes it suitable for development, tests,
/// and deployments without a remote backend.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        for token in &tokens {
            vector[self.bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[self.bucket(&bigram)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }

    fn bucket(&self, feature: &str) -> usize {
        // DefaultHasher::new() uses fixed keys, so buckets are stable
        // across runs.
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        (hasher.finish() % self.dimension as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    #[inline]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!(
            "Hashing {} texts into {}-dimension vectors",
            texts.len(),
            self.dimension
        );
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
