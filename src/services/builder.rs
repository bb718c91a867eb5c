//! Build orchestration.
//!
//! Runs the full ingest-to-graphs pipeline: scan, node construction from the
//! prior graph, metadata, date sort, image embeddings, burst grouping,
//! enrichment, knowledge consolidation, save. The two expensive phases
//! (enrichment and consolidation) surface their failure in the returned
//! [`BuildReport`] rather than aborting the build, so everything accumulated
//! up to the failure still reaches disk.

use crate::embedding::{ImageEmbedder, VectorStore};
use crate::ingest::{MediaSource, MetadataExtractor, MtimeExtractor, RawMedia};
use crate::llm::ReasoningProvider;
use crate::models::{KnowledgeGraph, MemoryGraph, MemoryNode};
use crate::services::{BurstGrouper, Enricher, KnowledgeConsolidator};
use crate::storage::GraphStore;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// The build phase a captured failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Content enrichment of root nodes.
    Enrichment,
    /// Knowledge consolidation.
    Consolidation,
}

impl BuildPhase {
    /// Returns the phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enrichment => "enrichment",
            Self::Consolidation => "consolidation",
        }
    }
}

/// A failure captured from one of the major build phases.
#[derive(Debug)]
pub struct PhaseFailure {
    /// Phase that failed.
    pub phase: BuildPhase,
    /// The underlying error.
    pub error: Error,
}

/// Outcome of a build run.
#[derive(Debug)]
pub struct BuildReport {
    /// The memory graph as persisted.
    pub memory_graph: MemoryGraph,
    /// The knowledge graph as persisted.
    pub knowledge_graph: KnowledgeGraph,
    /// Items found by the scan.
    pub scanned: usize,
    /// Nodes newly folded into burst groups this run.
    pub grouped: usize,
    /// Root nodes enriched this run.
    pub enriched: usize,
    /// Total provider cost in dollars.
    pub cost: f64,
    /// Failure captured from a major phase, if any. The graphs above still
    /// reflect everything completed before the failure.
    pub phase_failure: Option<PhaseFailure>,
}

/// Orchestrates the full build pipeline.
pub struct MemoryBuilder {
    source: Arc<dyn MediaSource>,
    metadata_extractor: Arc<dyn MetadataExtractor>,
    image_embedder: Arc<dyn ImageEmbedder>,
    provider: Arc<dyn ReasoningProvider>,
    store: GraphStore,
    grouper: BurstGrouper,
    fact_merge_threshold: u8,
}

impl MemoryBuilder {
    /// Creates a builder over the given collaborators.
    #[must_use]
    pub fn new(
        source: Arc<dyn MediaSource>,
        metadata_extractor: Arc<dyn MetadataExtractor>,
        image_embedder: Arc<dyn ImageEmbedder>,
        provider: Arc<dyn ReasoningProvider>,
        store: GraphStore,
        grouper: BurstGrouper,
        fact_merge_threshold: u8,
    ) -> Self {
        Self {
            source,
            metadata_extractor,
            image_embedder,
            provider,
            store,
            grouper,
            fact_merge_threshold,
        }
    }

    /// Runs the build pipeline end to end.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning, the embedding cache, or persistence
    /// fails. Enrichment and consolidation failures are captured in the
    /// report instead.
    pub fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let prior_memory = self.store.load_memory_graph()?;
        let prior_knowledge = self.store.load_knowledge_graph()?;

        let raw = self.source.scan()?;
        let scanned = raw.len();

        let mut nodes = self.construct_nodes(&raw, &prior_memory);
        self.extract_metadata(&mut nodes);

        // Capture order drives burst grouping and day partitioning. Nodes
        // without a timestamp sort last and stay out of day grouping.
        nodes.sort_by(|a, b| {
            match (a.captured_at(), b.captured_at()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.key.cmp(&b.key))
        });

        self.embed_images(&mut nodes, &raw)?;
        let grouped = self.group_bursts(&mut nodes);

        let mut cost = 0.0;
        let mut phase_failure = None;
        let enricher = Enricher::new(self.provider.clone());
        let enriched = match enricher.enrich(&mut nodes, &mut cost) {
            Ok(enriched) => enriched,
            Err(error) => {
                tracing::warn!(error = %error, "enrichment failed; saving partial state");
                phase_failure = Some(PhaseFailure {
                    phase: BuildPhase::Enrichment,
                    error,
                });
                0
            }
        };

        let mut memory_graph = MemoryGraph::new();
        for node in nodes {
            memory_graph.insert(node);
        }
        let mut knowledge_graph = prior_knowledge;

        // Consolidation only runs on a fully enriched graph; feeding it
        // half-enriched nodes would checkpoint days with missing context.
        if phase_failure.is_none() {
            let consolidator =
                KnowledgeConsolidator::new(self.provider.clone(), self.fact_merge_threshold);
            if let Err(error) =
                consolidator.consolidate(&mut memory_graph, &mut knowledge_graph, &mut cost)
            {
                tracing::warn!(error = %error, "consolidation failed; saving partial state");
                phase_failure = Some(PhaseFailure {
                    phase: BuildPhase::Consolidation,
                    error,
                });
            }
        }

        knowledge_graph.assign_sequential_ids();
        self.store.save_memory_graph(&memory_graph)?;
        self.store.save_knowledge_graph(&knowledge_graph)?;

        let elapsed = started.elapsed();
        metrics::counter!("recollect_builds_total").increment(1);
        metrics::histogram!("recollect_build_duration_seconds").record(elapsed.as_secs_f64());
        tracing::info!(
            scanned,
            grouped,
            enriched,
            cost,
            elapsed_ms = elapsed.as_millis() as u64,
            failed_phase = phase_failure.as_ref().map(|f| f.phase.as_str()),
            "build finished"
        );

        Ok(BuildReport {
            memory_graph,
            knowledge_graph,
            scanned,
            grouped,
            enriched,
            cost,
            phase_failure,
        })
    }

    /// Reuses prior node records where they exist, creating bare nodes for
    /// new captures.
    fn construct_nodes(&self, raw: &[RawMedia], prior: &MemoryGraph) -> Vec<MemoryNode> {
        raw.iter()
            .map(|item| {
                prior.get(&item.filename).cloned().unwrap_or_else(|| {
                    MemoryNode::new(&item.filename, &item.filepath, item.media_type)
                })
            })
            .collect()
    }

    /// Fills in missing metadata, degrading to modification time when the
    /// configured extractor cannot resolve a capture.
    fn extract_metadata(&self, nodes: &mut [MemoryNode]) {
        for node in nodes.iter_mut() {
            if node.metadata.is_some() {
                continue;
            }
            let raw = RawMedia {
                filename: node.key.as_str().to_string(),
                filepath: node.filepath.clone(),
                media_type: node.media_type,
            };
            match self.metadata_extractor.extract(&raw) {
                Ok(metadata) => node.metadata = Some(metadata),
                Err(error) => {
                    tracing::warn!(node = %node.key, error = %error, "metadata extraction failed; degrading to mtime");
                    match MtimeExtractor::new().extract(&raw) {
                        Ok(metadata) => node.metadata = Some(metadata),
                        Err(error) => {
                            tracing::warn!(node = %node.key, error = %error, "no metadata available");
                        }
                    }
                }
            }
        }
    }

    /// Looks up or computes image embeddings, flushing the cache afterwards.
    fn embed_images(&self, nodes: &mut [MemoryNode], raw: &[RawMedia]) -> Result<()> {
        let mut store = VectorStore::load(self.store.image_embeddings_path())?;
        let by_name: BTreeMap<&str, &RawMedia> =
            raw.iter().map(|item| (item.filename.as_str(), item)).collect();

        for node in nodes.iter_mut() {
            let Some(item) = by_name.get(node.key.as_str()) else {
                continue;
            };
            let result = store.get_or_compute(node.key.as_str(), || {
                let bytes = item.read()?;
                self.image_embedder.embed_image(&bytes)
            });
            match result {
                Ok(embedding) => node.image_embedding = Some(embedding),
                Err(Error::Ingestion { filename, reason }) => {
                    tracing::warn!(filename, reason, "skipping unreadable media for embedding");
                }
                Err(other) => return Err(other),
            }
        }

        store.flush()
    }

    /// Runs burst grouping per calendar day.
    fn group_bursts(&self, nodes: &mut [MemoryNode]) -> usize {
        let mut by_day: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if let Some(day) = node.capture_day() {
                by_day.entry(day).or_default().push(i);
            }
        }

        let mut grouped = 0;
        for indices in by_day.values() {
            // Nodes arrive date-sorted, so each day's indices are contiguous
            // and in capture order.
            let mut day_nodes: Vec<MemoryNode> =
                indices.iter().map(|&i| nodes[i].clone()).collect();
            grouped += self.grouper.group_day(&mut day_nodes);
            for (&i, node) in indices.iter().zip(day_nodes) {
                nodes[i] = node;
            }
        }
        grouped
    }
}
