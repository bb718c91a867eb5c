//! Persisted lookup-or-compute vector caches.
//!
//! Two stores back the similarity funnel: a plain key→vector store (image and
//! caption embeddings) and a fact store whose entries also carry the fact text
//! and source node. Both preserve insertion order — top-K ranking breaks score
//! ties by insertion order — and persist as a single JSON object per store.
//! Writes are whole-file overwrites, not atomic against concurrent writers: a
//! crash mid-batch loses only the unflushed portion.

use crate::embedding::cosine_similarity;
use crate::{Error, Result};
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A JSON object deserialized into entries in file order.
struct OrderedEntries<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedEntries<V> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = OrderedEntries<V>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object of store entries")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// Serializes entries as a JSON object in insertion order.
struct OrderedEntriesRef<'a, V>(&'a [(String, V)]);

impl<V: Serialize> Serialize for OrderedEntriesRef<'_, V> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn read_entries<V: DeserializeOwned>(path: &Path) -> Result<Vec<(String, V)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::service("read_vector_store", format!("{}: {e}", path.display())))?;
    let entries: OrderedEntries<V> = serde_json::from_str(&contents)
        .map_err(|e| Error::service("parse_vector_store", format!("{}: {e}", path.display())))?;
    Ok(entries.0)
}

fn write_entries<V: Serialize>(path: &Path, entries: &[(String, V)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::service("create_store_dir", format!("{}: {e}", parent.display())))?;
    }
    let json = serde_json::to_string(&OrderedEntriesRef(entries))
        .map_err(|e| Error::service("serialize_vector_store", e))?;
    fs::write(path, json)
        .map_err(|e| Error::service("write_vector_store", format!("{}: {e}", path.display())))
}

fn rank_by_similarity<'a>(
    entries: impl Iterator<Item = (&'a str, &'a [f32])>,
    query: &[f32],
    k: usize,
) -> Vec<(String, f32)> {
    let mut ranked: Vec<(String, f32)> = entries
        .map(|(key, vector)| (key.to_string(), cosine_similarity(query, vector)))
        .collect();
    // Stable sort keeps insertion order for equal scores.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

/// Insertion-ordered key→vector cache with lookup-or-compute semantics.
///
/// Append-only within a run; `flush` overwrites the backing file wholesale.
#[derive(Debug)]
pub struct VectorStore {
    /// Backing file.
    path: PathBuf,
    /// Entries in insertion order.
    entries: Vec<(String, Vec<f32>)>,
    /// Key → position in `entries`.
    index: HashMap<String, usize>,
}

impl VectorStore {
    /// Loads a store from disk, or creates an empty one if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries: Vec<(String, Vec<f32>)> = read_entries(&path)?;
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.clone(), i))
            .collect();
        Ok(Self {
            path,
            entries,
            index,
        })
    }

    /// Returns true if the key is cached.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Looks up a cached vector.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.index
            .get(key)
            .map(|&i| self.entries[i].1.as_slice())
    }

    /// Inserts a vector, replacing any existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, vector: Vec<f32>) {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].1 = vector;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, vector));
        }
    }

    /// Returns the cached vector for `key`, computing and caching it on miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the compute closure fails.
    pub fn get_or_compute(
        &mut self,
        key: &str,
        compute: impl FnOnce() -> Result<Vec<f32>>,
    ) -> Result<Vec<f32>> {
        if let Some(vector) = self.get(key) {
            return Ok(vector.to_vec());
        }
        let vector = compute()?;
        self.insert(key, vector.clone());
        Ok(vector)
    }

    /// Persists the full store, overwriting the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn flush(&self) -> Result<()> {
        write_entries(&self.path, &self.entries)
    }

    /// Ranks all cached vectors by descending cosine similarity to `query`
    /// and returns the top `k`, ties broken by insertion order.
    #[must_use]
    pub fn rank(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        rank_by_similarity(
            self.entries
                .iter()
                .map(|(key, vector)| (key.as_str(), vector.as_slice())),
            query,
            k,
        )
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

/// A fact-store entry: the fact text, its source node, and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactEmbedding {
    /// Key of the node the fact came from.
    pub memory_name: String,
    /// The fact text.
    pub knowledge: String,
    /// Embedding of the fact text.
    pub embeddings: Vec<f32>,
}

/// Insertion-ordered fact-id→embedding cache, persisted like [`VectorStore`].
#[derive(Debug)]
pub struct FactVectorStore {
    /// Backing file.
    path: PathBuf,
    /// Entries in insertion order.
    entries: Vec<(String, FactEmbedding)>,
    /// Fact id → position in `entries`.
    index: HashMap<String, usize>,
}

impl FactVectorStore {
    /// Loads a store from disk, or creates an empty one if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries: Vec<(String, FactEmbedding)> = read_entries(&path)?;
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.clone(), i))
            .collect();
        Ok(Self {
            path,
            entries,
            index,
        })
    }

    /// Returns true if the fact id is cached.
    #[must_use]
    pub fn contains(&self, fact_id: &str) -> bool {
        self.index.contains_key(fact_id)
    }

    /// Looks up a cached fact entry.
    #[must_use]
    pub fn get(&self, fact_id: &str) -> Option<&FactEmbedding> {
        self.index.get(fact_id).map(|&i| &self.entries[i].1)
    }

    /// Inserts a fact entry, replacing any existing entry in place.
    pub fn insert(&mut self, fact_id: impl Into<String>, entry: FactEmbedding) {
        let fact_id = fact_id.into();
        if let Some(&i) = self.index.get(&fact_id) {
            self.entries[i].1 = entry;
        } else {
            self.index.insert(fact_id.clone(), self.entries.len());
            self.entries.push((fact_id, entry));
        }
    }

    /// Persists the full store, overwriting the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn flush(&self) -> Result<()> {
        write_entries(&self.path, &self.entries)
    }

    /// Ranks all cached facts by descending cosine similarity to `query` and
    /// returns the top `k` fact ids, ties broken by insertion order.
    #[must_use]
    pub fn rank(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        rank_by_similarity(
            self.entries
                .iter()
                .map(|(key, entry)| (key.as_str(), entry.embeddings.as_slice())),
            query,
            k,
        )
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
