//! Core data models.

mod knowledge;
mod node;
mod query;

pub use knowledge::{
    ActivityRecord, DayEvent, Event, EventIndex, FactRecord, KnowledgeGraph, month_key,
    parse_event_date,
};
pub use node::{
    CaptureMethod, Location, MediaMetadata, MediaType, MemoryNode, NodeContent, NodeKey,
    TemporalInfo, TimeOfDay, EXIF_DATE_FORMAT,
};
pub use query::QueryKind;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted memory graph: one enriched record per captured item, keyed by
/// filename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryGraph {
    /// Node records keyed by filename.
    #[serde(default)]
    pub memories: BTreeMap<String, MemoryNode>,
}

impl MemoryGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a node by filename.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MemoryNode> {
        self.memories.get(key)
    }

    /// Inserts a node, replacing any existing record with the same filename.
    pub fn insert(&mut self, node: MemoryNode) {
        self.memories.insert(node.key.as_str().to_string(), node);
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Returns true if the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Iterates over root nodes (nodes without a burst-group parent).
    pub fn roots(&self) -> impl Iterator<Item = &MemoryNode> {
        self.memories.values().filter(|n| n.is_root())
    }
}
