//! # Recollect
//!
//! A personal-memory graph engine for captured media.
//!
//! Recollect enriches each captured item (photos, screenshots) with timestamp,
//! location, visual content, and inferred higher-level facts, consolidates
//! recurring facts into deduplicated events and semantic knowledge, and answers
//! natural-language queries through a ranked multi-stage retrieval funnel.
//!
//! ## Architecture
//!
//! - Embedding stores: insertion-ordered key→vector caches with
//!   lookup-or-compute semantics, flushed wholesale to disk
//! - Memory nodes: one enriched record per captured item, with near-duplicate
//!   same-day captures collapsed into burst groups under a parent node
//! - Knowledge consolidation: incremental, checkpointed event and fact
//!   pipelines driven by a reasoning provider
//! - Retrieval: a strictly ordered funnel combining caption similarity, fact
//!   similarity, event filtering, and provider reranking
//!
//! ## Example
//!
//! ```rust,ignore
//! use recollect::{MemoryBuilder, RecollectConfig, RetrievalPipeline};
//!
//! let config = RecollectConfig::load()?;
//! let report = builder.build()?;
//! let outcome = pipeline.query("find me a photo of a cat", &graph, &knowledge)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::RecollectConfig;
pub use embedding::{Embedder, FactVectorStore, ImageEmbedder, VectorStore, cosine_similarity};
pub use llm::{Costed, ReasoningProvider};
pub use models::{
    CaptureMethod, Event, KnowledgeGraph, MemoryGraph, MemoryNode, NodeContent, NodeKey, QueryKind,
};
pub use services::{BuildReport, MemoryBuilder, QueryOutcome, RetrievalPipeline};

/// Error type for recollect operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Fatal |
/// |---------|-------------|-------|
/// | `InvalidInput` | Missing required parameters, empty queries | yes |
/// | `Ingestion` | Unreadable or unsupported media files | no (skipped) |
/// | `Metadata` | Missing timestamp/GPS in a capture | no (degraded) |
/// | `Service` | Embedding/reasoning call or file I/O fails | aborts the phase |
/// | `Parse` | Reasoning response is malformed structured output | aborts the phase |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A media file could not be ingested.
    ///
    /// Non-fatal: the ingestion layer skips the file and logs a warning.
    #[error("cannot ingest '{filename}': {reason}")]
    Ingestion {
        /// The file that was skipped.
        filename: String,
        /// Why the file was skipped.
        reason: String,
    },

    /// Capture metadata could not be extracted.
    ///
    /// Non-fatal: the builder degrades to the file modification time and an
    /// empty location.
    #[error("metadata unavailable for '{filename}': {cause}")]
    Metadata {
        /// The file whose metadata was unavailable.
        filename: String,
        /// The underlying cause.
        cause: String,
    },

    /// An external service call or storage operation failed.
    ///
    /// Propagates and aborts the current phase. No automatic retries.
    #[error("operation '{operation}' failed: {cause}")]
    Service {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A reasoning response was malformed structured output.
    ///
    /// Propagates with no repair attempted.
    #[error("malformed response in '{operation}': {cause}")]
    Parse {
        /// The operation whose response could not be parsed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a `Service` error from an operation name and any displayable cause.
    pub fn service(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Service {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Builds a `Parse` error from an operation name and any displayable cause.
    pub fn parse(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Parse {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for recollect operations.
pub type Result<T> = std::result::Result<T, Error>;
