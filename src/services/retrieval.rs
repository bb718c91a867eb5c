//! Query-time retrieval.
//!
//! A query runs through a fixed funnel: classification, embedding, caption
//! and fact similarity top-K, provider-rated relatedness filters for facts,
//! events, and candidate nodes, then a union of the survivors. Question
//! queries additionally synthesize an answer over the retrieved material.
//! Collaborator failures abort the query; there are no retries.

use crate::embedding::{Embedder, FactEmbedding, FactVectorStore, VectorStore};
use crate::llm::{FactCandidate, ReasoningProvider};
use crate::models::{Event, KnowledgeGraph, MemoryGraph, NodeKey, QueryKind};
use crate::storage::GraphStore;
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Relatedness (1-3) at or above which a rated item survives its filter.
const RELATEDNESS_CUTOFF: u8 = 2;

/// Result of one query.
#[derive(Debug)]
pub struct QueryOutcome {
    /// Retrieved node keys, deduplicated, relevance-filtered first.
    pub nodes: Vec<NodeKey>,
    /// Synthesized answer; present only for question queries.
    pub answer: Option<String>,
    /// How the query was classified.
    pub kind: QueryKind,
    /// Events rated relevant to the query.
    pub events: Vec<Event>,
    /// Fact texts rated relevant to the query.
    pub facts: Vec<String>,
    /// Total provider cost in dollars.
    pub cost: f64,
}

/// The retrieval funnel over the persisted graphs and embedding caches.
pub struct RetrievalPipeline {
    provider: Arc<dyn ReasoningProvider>,
    embedder: Arc<dyn Embedder>,
    caption_store: VectorStore,
    fact_store: FactVectorStore,
    top_k: usize,
}

impl RetrievalPipeline {
    /// Creates a pipeline over already-loaded stores.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        embedder: Arc<dyn Embedder>,
        caption_store: VectorStore,
        fact_store: FactVectorStore,
        top_k: usize,
    ) -> Self {
        Self {
            provider,
            embedder,
            caption_store,
            fact_store,
            top_k,
        }
    }

    /// Loads the caption and fact caches from the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if either cache file exists but cannot be read.
    pub fn load(
        provider: Arc<dyn ReasoningProvider>,
        embedder: Arc<dyn Embedder>,
        store: &GraphStore,
        top_k: usize,
    ) -> Result<Self> {
        Ok(Self::new(
            provider,
            embedder,
            VectorStore::load(store.caption_embeddings_path())?,
            FactVectorStore::load(store.fact_embeddings_path())?,
            top_k,
        ))
    }

    /// Extends the caption and fact caches to cover the current graphs and
    /// flushes them.
    ///
    /// Only missing entries are embedded, so a prepared pipeline costs
    /// nothing to prepare again.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or flushing fails.
    pub fn prepare(&mut self, memory: &MemoryGraph, knowledge: &KnowledgeGraph) -> Result<()> {
        let embedder = &self.embedder;
        for node in memory.roots() {
            let Some(content) = &node.content else {
                continue;
            };
            if content.caption.is_empty() {
                continue;
            }
            let caption = content.caption.clone();
            self.caption_store
                .get_or_compute(node.key.as_str(), || embedder.embed(&caption))?;
        }

        for fact in &knowledge.knowledge {
            let id = fact.id.to_string();
            if !self.fact_store.contains(&id) {
                let embeddings = self.embedder.embed(&fact.knowledge)?;
                self.fact_store.insert(
                    id,
                    FactEmbedding {
                        memory_name: fact.memory_name.clone(),
                        knowledge: fact.knowledge.clone(),
                        embeddings,
                    },
                );
            }
        }

        self.caption_store.flush()?;
        self.fact_store.flush()
    }

    /// Runs the full funnel for one query.
    ///
    /// # Errors
    ///
    /// Returns an error if any collaborator call fails.
    pub fn query(
        &self,
        query: &str,
        memory: &MemoryGraph,
        knowledge: &KnowledgeGraph,
    ) -> Result<QueryOutcome> {
        let started = Instant::now();
        let mut cost = 0.0;

        let classified = self.provider.classify_query(query)?;
        cost += classified.cost;
        let kind = classified.value;

        let query_embedding = self.embedder.embed(query)?;
        let caption_keys: Vec<String> = self
            .caption_store
            .rank(&query_embedding, self.top_k)
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        let (facts, fact_nodes) =
            self.related_facts(query, &query_embedding, knowledge, &mut cost)?;
        let (events, event_nodes) = self.related_events(query, memory, knowledge, &mut cost)?;

        // Event relevance narrows the caption candidates; with no relevant
        // events there is nothing to narrow by and the caption top-K stands.
        let candidates: Vec<String> = if event_nodes.is_empty() {
            caption_keys
        } else {
            caption_keys
                .into_iter()
                .filter(|key| event_nodes.contains(key))
                .collect()
        };

        let kept = self.related_nodes(query, &candidates, memory, &mut cost)?;

        // Union with the fact-mention nodes, first occurrence wins.
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for key in kept.into_iter().chain(fact_nodes) {
            if seen.insert(key.clone()) {
                nodes.push(NodeKey::new(key));
            }
        }

        let answer = if kind == QueryKind::Question {
            let texts: Vec<String> = nodes
                .iter()
                .filter_map(|key| memory.get(key.as_str()))
                .map(crate::models::MemoryNode::textualize)
                .collect();
            let synthesized = self.provider.synthesize_answer(query, &texts, &events, &facts)?;
            cost += synthesized.cost;
            Some(synthesized.value)
        } else {
            None
        };

        metrics::counter!("recollect_queries_total", "kind" => kind.as_str()).increment(1);
        metrics::histogram!("recollect_query_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            kind = kind.as_str(),
            nodes = nodes.len(),
            events = events.len(),
            facts = facts.len(),
            cost,
            "query finished"
        );

        Ok(QueryOutcome {
            nodes,
            answer,
            kind,
            events,
            facts,
            cost,
        })
    }

    /// Fact similarity top-K plus provider-rated relevance. Returns the kept
    /// fact texts and the keys of every node that mentioned a kept fact.
    fn related_facts(
        &self,
        query: &str,
        query_embedding: &[f32],
        knowledge: &KnowledgeGraph,
        cost: &mut f64,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let ranked = self.fact_store.rank(query_embedding, self.top_k);
        if ranked.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let candidates: Vec<FactCandidate> = ranked
            .iter()
            .filter_map(|(id, _)| {
                self.fact_store.get(id).map(|entry| FactCandidate {
                    knowledge_id: id.clone(),
                    knowledge: entry.knowledge.clone(),
                })
            })
            .collect();

        let rated = self.provider.rate_fact_relatedness(query, &candidates)?;
        *cost += rated.cost;

        let mut facts = Vec::new();
        let mut fact_nodes = Vec::new();
        for rating in rated.value {
            if rating.relatedness < RELATEDNESS_CUTOFF {
                continue;
            }
            let Some(entry) = self.fact_store.get(&rating.knowledge_id) else {
                continue;
            };
            facts.push(entry.knowledge.clone());
            if let Ok(id) = rating.knowledge_id.parse::<usize>() {
                if let Some(record) = knowledge.knowledge.iter().find(|f| f.id == id) {
                    fact_nodes.extend(record.members.iter().cloned());
                }
            }
        }
        Ok((facts, fact_nodes))
    }

    /// Provider-rated event relevance with date-range expansion. Returns the
    /// kept events and the keys of every root captured inside one of them.
    fn related_events(
        &self,
        query: &str,
        memory: &MemoryGraph,
        knowledge: &KnowledgeGraph,
        cost: &mut f64,
    ) -> Result<(Vec<Event>, HashSet<String>)> {
        if knowledge.events.by_event.values().all(Vec::is_empty) {
            return Ok((Vec::new(), HashSet::new()));
        }

        let rated = self.provider.rate_event_relatedness(query, &knowledge.events)?;
        *cost += rated.cost;

        let mut events = Vec::new();
        let mut event_nodes = HashSet::new();
        for rating in rated.value {
            if rating.relatedness < RELATEDNESS_CUTOFF {
                continue;
            }
            let Some(event) = knowledge.events.get(&rating.month, rating.event_id) else {
                continue;
            };
            let (start, end) = match event.date_range() {
                Ok(range) => range,
                Err(e) => {
                    tracing::warn!(event = %event.event_name, error = %e, "skipping event with unparseable dates");
                    continue;
                }
            };
            for node in memory.roots() {
                if let Some(day) = node.capture_day() {
                    if day >= start && day <= end {
                        event_nodes.insert(node.key.as_str().to_string());
                    }
                }
            }
            events.push(event.clone());
        }
        Ok((events, event_nodes))
    }

    /// Provider-rated relevance over the candidate nodes.
    fn related_nodes(
        &self,
        query: &str,
        candidates: &[String],
        memory: &MemoryGraph,
        cost: &mut f64,
    ) -> Result<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates
            .iter()
            .map(|key| {
                memory
                    .get(key)
                    .map(crate::models::MemoryNode::textualize)
                    .unwrap_or_default()
            })
            .collect();

        let rated = self.provider.rate_node_relatedness(query, &texts)?;
        *cost += rated.cost;

        Ok(rated
            .value
            .into_iter()
            .filter(|rating| rating.relatedness >= RELATEDNESS_CUTOFF)
            .filter_map(|rating| candidates.get(rating.node_id).cloned())
            .collect())
    }
}
