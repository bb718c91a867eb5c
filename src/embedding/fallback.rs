//! Hash-based fallback embedder.
//!
//! Generates deterministic pseudo-embeddings from content hashing when no
//! real embedding provider is configured. Hash-based embeddings do NOT
//! capture semantic similarity; they are useful for offline runs and tests.

use super::{DEFAULT_DIMENSIONS, Embedder, ImageEmbedder};
use crate::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic hash-based embedder for text and image bytes.
pub struct HashEmbedder {
    /// Embedding dimensions.
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates a new hash embedder with default dimensions.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Creates a new embedder with custom dimensions.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Distributes a hash value across embedding dimensions.
    fn distribute_hash(embedding: &mut [f32], hash: u64, chunk_idx: usize, dimensions: usize) {
        for j in 0..8 {
            let idx = ((hash >> (j * 8)) as usize + chunk_idx) % dimensions;
            let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
            embedding[idx] += value;
        }
    }

    /// Normalizes an embedding vector in-place.
    fn normalize_embedding(embedding: &mut [f32]) {
        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq <= 0.0 {
            return;
        }
        let inv_norm = norm_sq.sqrt().recip();
        for v in embedding.iter_mut() {
            *v *= inv_norm;
        }
    }

    fn pseudo_embed_chunks<T: Hash>(
        &self,
        chunks: impl Iterator<Item = T>,
    ) -> Vec<f32> {
        // Bound computation time on very long inputs.
        const MAX_CHUNKS: usize = 1000;
        let mut embedding = vec![0.0f32; self.dimensions];

        for (i, chunk) in chunks.take(MAX_CHUNKS).enumerate() {
            let mut hasher = DefaultHasher::new();
            chunk.hash(&mut hasher);
            Self::distribute_hash(&mut embedding, hasher.finish(), i, self.dimensions);
        }

        Self::normalize_embedding(&mut embedding);
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".to_string()));
        }
        Ok(self.pseudo_embed_chunks(text.split_whitespace()))
    }
}

impl ImageEmbedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput(
                "cannot embed empty image bytes".to_string(),
            ));
        }
        Ok(self.pseudo_embed_chunks(bytes.chunks(64)))
    }
}
