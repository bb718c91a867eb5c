//! Content enrichment for root nodes.

use crate::llm::ReasoningProvider;
use crate::models::{MemoryNode, NodeContent};
use crate::Result;
use std::fs;
use std::sync::Arc;

/// Fills in caption, objects, people, and OCR text for burst-group roots.
///
/// Children inherit their parent's moment and are skipped. Nodes that already
/// carry content are left alone, so reruns cost nothing.
pub struct Enricher {
    /// Captioning and OCR collaborator.
    provider: Arc<dyn ReasoningProvider>,
}

impl Enricher {
    /// Creates an enricher over the given provider.
    #[must_use]
    pub fn new(provider: Arc<dyn ReasoningProvider>) -> Self {
        Self { provider }
    }

    /// Enriches every root node that has no content yet.
    ///
    /// Unreadable media files are skipped with a warning; provider failures
    /// abort the pass. Accumulates provider cost into `cost` as it goes so a
    /// mid-pass failure still accounts for the calls already made.
    ///
    /// # Errors
    ///
    /// Returns the first provider error encountered.
    pub fn enrich(&self, nodes: &mut [MemoryNode], cost: &mut f64) -> Result<usize> {
        let mut enriched = 0;
        for node in nodes.iter_mut() {
            if !node.is_root() || node.content.is_some() {
                continue;
            }

            let bytes = match fs::read(&node.filepath) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(node = %node.key, error = %e, "skipping unreadable media");
                    continue;
                }
            };

            let visual = self.provider.generate_visual_content(&bytes)?;
            *cost += visual.cost;
            let ocr = self.provider.transcribe_text(&bytes)?;
            *cost += ocr.cost;

            node.content = Some(NodeContent {
                caption: visual.value.caption,
                objects: visual.value.objects,
                people: visual.value.people,
                text: ocr.value,
            });
            enriched += 1;
            tracing::debug!(node = %node.key, "enriched node content");
        }

        if enriched > 0 {
            metrics::counter!("recollect_nodes_enriched_total").increment(enriched as u64);
        }
        Ok(enriched)
    }
}
