use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::MemoryError;

/// Turns text into a vector for the vector store adapter
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of the vectors this embedder produces
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}

/// Deterministic stand-in embedder: a sinusoid seeded by a hash of the text.
///
/// It carries no semantic meaning. Use it for tests and local wiring only;
/// production setups should provide a real [`Embedder`].
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = (hasher.finish() % 10_000) as f64;

        let mut vector: Vec<f32> = (0..self.dimension)
            .map(|i| ((seed + i as f64) * 0.1).sin() as f32)
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}
