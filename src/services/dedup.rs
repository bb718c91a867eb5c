//! Burst deduplication.
//!
//! Rapid bursts of near-identical captures get folded into one representative
//! node. Grouping runs per calendar day over nodes in capture order: each
//! node is compared against its earlier same-day root predecessors and
//! becomes a child of the first one whose image embedding is similar enough.
//! The greedy first-match rule is order-dependent on purpose; it matches how
//! bursts arrive (consecutive shots of the same scene).

use crate::embedding::cosine_similarity;
use crate::models::{CaptureMethod, MemoryNode};

/// Groups same-day near-duplicate captures under a parent node.
#[derive(Debug, Clone, Copy)]
pub struct BurstGrouper {
    /// Similarity threshold for camera photos.
    photo_threshold: f32,
    /// Similarity threshold for screenshots and unknown captures.
    screenshot_threshold: f32,
}

impl BurstGrouper {
    /// Creates a grouper with the given thresholds.
    #[must_use]
    pub const fn new(photo_threshold: f32, screenshot_threshold: f32) -> Self {
        Self {
            photo_threshold,
            screenshot_threshold,
        }
    }

    /// The similarity threshold that applies to a capture method.
    ///
    /// Screenshots and unknowns need tighter confidence: near-identical UI
    /// frames are common without being true duplicates of one moment.
    #[must_use]
    pub const fn threshold_for(&self, method: CaptureMethod) -> f32 {
        match method {
            CaptureMethod::Photo => self.photo_threshold,
            CaptureMethod::Screenshot | CaptureMethod::Unknown => self.screenshot_threshold,
        }
    }

    /// Groups one calendar day's nodes, given in capture order.
    ///
    /// Comparison is strictly greater than the threshold. Nodes already
    /// grouped in an earlier build keep their assignment; nodes without an
    /// image embedding stay roots. Returns the number of nodes newly folded
    /// into a group.
    pub fn group_day(&self, nodes: &mut [MemoryNode]) -> usize {
        let mut grouped = 0;
        for i in 0..nodes.len() {
            if nodes[i].grouping_done || nodes[i].has_parent {
                continue;
            }

            let threshold = self.threshold_for(nodes[i].capture_method());
            let parent = match &nodes[i].image_embedding {
                Some(embedding) => nodes[..i]
                    .iter()
                    .find(|prev| {
                        prev.is_root()
                            && prev.image_embedding.as_ref().is_some_and(|prev_embedding| {
                                cosine_similarity(embedding, prev_embedding) > threshold
                            })
                    })
                    .map(|prev| prev.key.clone()),
                None => None,
            };

            if let Some(parent) = parent {
                tracing::debug!(child = %nodes[i].key, parent = %parent, "grouped burst duplicate");
                nodes[i].mark_child(parent);
                grouped += 1;
            }
            nodes[i].grouping_done = true;
        }
        grouped
    }
}
