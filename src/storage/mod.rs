//! Graph persistence.
//!
//! Both graphs persist as whole JSON files under the data directory and are
//! rewritten wholesale at phase boundaries. A missing file loads as an empty
//! graph. Writes are not atomic against concurrent writers; a single builder
//! or retriever owns the directory at a time.

use crate::models::{KnowledgeGraph, MemoryGraph};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Memory graph file name.
pub const MEMORY_GRAPH_FILE: &str = "memory.json";

/// Knowledge graph file name.
pub const KNOWLEDGE_GRAPH_FILE: &str = "knowledge.json";

/// Image embedding cache file name.
pub const IMAGE_EMBEDDINGS_FILE: &str = "image_embeddings.json";

/// Caption embedding cache file name.
pub const CAPTION_EMBEDDINGS_FILE: &str = "caption_embeddings.json";

/// Fact embedding cache file name.
pub const FACT_EMBEDDINGS_FILE: &str = "knowledge_embeddings.json";

/// File-backed store for the two persisted graphs.
#[derive(Debug, Clone)]
pub struct GraphStore {
    /// Directory holding every persisted artifact.
    data_dir: PathBuf,
}

impl GraphStore {
    /// Creates a store rooted at the given data directory.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the memory graph file.
    #[must_use]
    pub fn memory_graph_path(&self) -> PathBuf {
        self.data_dir.join(MEMORY_GRAPH_FILE)
    }

    /// Path of the knowledge graph file.
    #[must_use]
    pub fn knowledge_graph_path(&self) -> PathBuf {
        self.data_dir.join(KNOWLEDGE_GRAPH_FILE)
    }

    /// Path of the image embedding cache.
    #[must_use]
    pub fn image_embeddings_path(&self) -> PathBuf {
        self.data_dir.join(IMAGE_EMBEDDINGS_FILE)
    }

    /// Path of the caption embedding cache.
    #[must_use]
    pub fn caption_embeddings_path(&self) -> PathBuf {
        self.data_dir.join(CAPTION_EMBEDDINGS_FILE)
    }

    /// Path of the fact embedding cache.
    #[must_use]
    pub fn fact_embeddings_path(&self) -> PathBuf {
        self.data_dir.join(FACT_EMBEDDINGS_FILE)
    }

    /// Loads the memory graph, or an empty one if none is persisted yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_memory_graph(&self) -> Result<MemoryGraph> {
        load_or_default(&self.memory_graph_path(), "load_memory_graph")
    }

    /// Loads the knowledge graph, or an empty one if none is persisted yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_knowledge_graph(&self) -> Result<KnowledgeGraph> {
        load_or_default(&self.knowledge_graph_path(), "load_knowledge_graph")
    }

    /// Persists the memory graph, overwriting any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_memory_graph(&self, graph: &MemoryGraph) -> Result<()> {
        save(&self.memory_graph_path(), graph, "save_memory_graph")?;
        tracing::debug!(nodes = graph.len(), "saved memory graph");
        Ok(())
    }

    /// Persists the knowledge graph, overwriting any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_knowledge_graph(&self, graph: &KnowledgeGraph) -> Result<()> {
        save(&self.knowledge_graph_path(), graph, "save_knowledge_graph")?;
        tracing::debug!(
            events = graph.events.event_count(),
            facts = graph.knowledge.len(),
            "saved knowledge graph"
        );
        Ok(())
    }
}

/// Reads and parses a JSON file, defaulting when it does not exist.
fn load_or_default<T: serde::de::DeserializeOwned + Default>(
    path: &Path,
    operation: &str,
) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path).map_err(|e| Error::service(operation, e))?;
    serde_json::from_str(&contents).map_err(|e| {
        Error::parse(operation, format!("corrupt file {}: {e}", path.display()))
    })
}

/// Serializes and writes a JSON file, creating the parent directory.
fn save<T: serde::Serialize>(path: &Path, value: &T, operation: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::service(operation, e))?;
    }
    let contents =
        serde_json::to_string_pretty(value).map_err(|e| Error::service(operation, e))?;
    fs::write(path, contents).map_err(|e| Error::service(operation, e))
}
