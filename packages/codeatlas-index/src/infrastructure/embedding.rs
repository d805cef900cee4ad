//! Embedding providers
//!
//! The default provider is a deterministic feature-hashing embedder: no
//! network, stable across runs, good enough for relevance ordering in
//! tests and offline runs. Production deployments implement
//! `EmbeddingPort` against a real provider and inject it at boot.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use codeatlas_ir::Result;

use crate::domain::ports::EmbeddingPort;

/// Feature-hashing embedder: tokens hash into a fixed-size vector.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingPort for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dimension;
            // Sign bit decorrelates colliding tokens
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        // L2 normalize so cosine similarity is a dot product of units
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("parse yaml config").await.unwrap();
        let b = embedder.embed("parse yaml config").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_similar_texts_closer_than_dissimilar() {
        let embedder = HashingEmbedder::new(128);
        let query = embedder.embed("parse yaml config file").await.unwrap();
        let close = embedder.embed("def parse_config: yaml config").await.unwrap();
        let far = embedder.embed("websocket ping heartbeat").await.unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[tokio::test]
    async fn test_normalized() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("some text here").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
