//! Embedding generation and vector caches.
//!
//! Provides embedding traits, OpenAI-backed text embeddings with a
//! deterministic hash-based fallback, and the persisted lookup-or-compute
//! vector stores.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

mod fallback;
mod openai;
mod store;

pub use fallback::HashEmbedder;
pub use openai::OpenAiEmbedder;
pub use store::{FactEmbedding, FactVectorStore, VectorStore};

use crate::Result;

/// Default embedding dimensions for the fallback embedder.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for text embedding generators.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Trait for image embedding generators.
pub trait ImageEmbedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given encoded image bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>>;
}

/// Computes the raw cosine similarity between two vectors (−1.0 to 1.0).
///
/// Returns 0.0 for mismatched dimensions or zero-magnitude vectors. Burst
/// grouping and retrieval ranking both compare raw values, so no
/// renormalization is applied.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
