//! Build and retrieval services.
//!
//! [`MemoryBuilder`] turns raw captures into the persisted graphs;
//! [`RetrievalPipeline`] answers queries against them. The smaller services
//! ([`BurstGrouper`], [`Enricher`], [`KnowledgeConsolidator`]) are the
//! builder's phases, separated for testing.

mod builder;
mod consolidation;
mod dedup;
mod enrichment;
mod retrieval;
#[cfg(test)]
pub(crate) mod stubs;

pub use builder::{BuildPhase, BuildReport, MemoryBuilder, PhaseFailure};
pub use consolidation::KnowledgeConsolidator;
pub use dedup::BurstGrouper;
pub use enrichment::Enricher;
pub use retrieval::{QueryOutcome, RetrievalPipeline};
