//! Knowledge consolidation.
//!
//! Distills the enriched memory graph into the knowledge graph: day-level
//! event extraction, month-level event merging, and per-node activity and
//! fact extraction with fact deduplication. Each unit of work checkpoints in
//! the graphs themselves (date keys, month keys, per-node processed flags),
//! so an interrupted run resumes where it stopped and a completed run costs
//! nothing to repeat.

use crate::llm::ReasoningProvider;
use crate::models::{
    ActivityRecord, FactRecord, KnowledgeGraph, MemoryGraph, month_key,
};
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds events, activities, and semantic facts from the memory graph.
pub struct KnowledgeConsolidator {
    /// Extraction and scoring collaborator.
    provider: Arc<dyn ReasoningProvider>,
    /// Similarity score (0-10) at or above which a fact mention merges.
    fact_merge_threshold: u8,
}

impl KnowledgeConsolidator {
    /// Creates a consolidator.
    #[must_use]
    pub fn new(provider: Arc<dyn ReasoningProvider>, fact_merge_threshold: u8) -> Self {
        Self {
            provider,
            fact_merge_threshold,
        }
    }

    /// Runs both consolidation pipelines and reassigns sequential ids.
    ///
    /// Accumulates provider cost into `cost` incrementally so a mid-run
    /// failure still accounts for the calls already made.
    ///
    /// # Errors
    ///
    /// Returns the first provider error encountered.
    pub fn consolidate(
        &self,
        memory: &mut MemoryGraph,
        knowledge: &mut KnowledgeGraph,
        cost: &mut f64,
    ) -> Result<()> {
        self.consolidate_events(memory, knowledge, cost)?;
        self.consolidate_facts(memory, knowledge, cost)?;
        knowledge.assign_sequential_ids();
        Ok(())
    }

    /// Day-level extraction followed by month-level merging.
    fn consolidate_events(
        &self,
        memory: &mut MemoryGraph,
        knowledge: &mut KnowledgeGraph,
        cost: &mut f64,
    ) -> Result<()> {
        // Partition root nodes by capture day. Nodes without a usable
        // timestamp cannot take part in the event timeline.
        let mut by_day: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for node in memory.roots() {
            if let Some(day) = node.capture_day() {
                by_day
                    .entry(day.format("%Y-%m-%d").to_string())
                    .or_default()
                    .push(node.key.as_str().to_string());
            }
        }

        for (date, keys) in &by_day {
            if !knowledge.events.by_date.contains_key(date) {
                let texts: Vec<String> = keys
                    .iter()
                    .filter_map(|key| memory.get(key))
                    .map(crate::models::MemoryNode::textualize)
                    .collect();
                let extracted = self.provider.extract_day_events(date, &texts)?;
                *cost += extracted.cost;
                tracing::debug!(date, events = extracted.value.len(), "extracted day events");
                knowledge
                    .events
                    .by_date
                    .insert(date.clone(), extracted.value);
            }

            for key in keys {
                if let Some(node) = memory.memories.get_mut(key) {
                    node.is_processed_event = true;
                }
            }
        }

        // Month-level merge over every day that has been extracted, not just
        // the days seen in this run.
        let mut by_month: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for date in knowledge.events.by_date.keys() {
            by_month
                .entry(month_key(date))
                .or_default()
                .push(date.clone());
        }

        for (month, dates) in by_month {
            if knowledge.events.by_event.contains_key(&month) {
                continue;
            }
            let day_lists: Vec<_> = dates
                .iter()
                .filter_map(|date| knowledge.events.by_date.get(date).cloned())
                .collect();
            let merged = self.provider.merge_month_events(&month, &day_lists)?;
            *cost += merged.cost;

            let mut events = merged.value;
            for (i, event) in events.iter_mut().enumerate() {
                event.id = i;
            }
            tracing::info!(month, events = events.len(), "consolidated month events");
            knowledge.events.by_event.insert(month, events);
        }

        Ok(())
    }

    /// Per-node activity and fact extraction with fact deduplication.
    fn consolidate_facts(
        &self,
        memory: &mut MemoryGraph,
        knowledge: &mut KnowledgeGraph,
        cost: &mut f64,
    ) -> Result<()> {
        let keys: Vec<String> = memory
            .roots()
            .filter(|node| !node.is_processed_activity || !node.is_processed_general_knowledge)
            .map(|node| node.key.as_str().to_string())
            .collect();

        for key in keys {
            let Some(node) = memory.get(&key) else {
                continue;
            };
            let text = node.textualize();
            let needs_activity = !node.is_processed_activity;
            let needs_facts = !node.is_processed_general_knowledge;

            let extracted = self
                .provider
                .extract_activity_and_facts(&text, &knowledge.events)?;
            *cost += extracted.cost;

            let mut activity_record = None;
            if needs_activity && !extracted.value.activity.is_empty() {
                activity_record = Some(ActivityRecord {
                    id: 0,
                    activity: extracted.value.activity.clone(),
                    memory_name: key.clone(),
                });
            }

            let mut fact_ids = Vec::new();
            if needs_facts {
                for fact in &extracted.value.knowledge {
                    let id = self.merge_or_insert_fact(knowledge, fact, &key, cost)?;
                    fact_ids.push(id);
                }
            }

            if let Some(record) = activity_record {
                knowledge.activity.push(record);
            }
            if let Some(node) = memory.memories.get_mut(&key) {
                if needs_activity {
                    if !extracted.value.activity.is_empty() {
                        node.activity = Some(extracted.value.activity.clone());
                    }
                    node.is_processed_activity = true;
                }
                if needs_facts {
                    node.knowledge.extend(extracted.value.knowledge.clone());
                    node.knowledge_ids.extend(fact_ids);
                    node.is_processed_general_knowledge = true;
                }
            }
        }

        Ok(())
    }

    /// Merges a fact mention into the first sufficiently similar existing
    /// fact, or appends it as a new one. Returns the fact's list index, which
    /// becomes its id at save time.
    fn merge_or_insert_fact(
        &self,
        knowledge: &mut KnowledgeGraph,
        fact: &str,
        node_key: &str,
        cost: &mut f64,
    ) -> Result<usize> {
        for (i, existing) in knowledge.knowledge.iter_mut().enumerate() {
            let scored = self
                .provider
                .score_text_similarity(&existing.knowledge, fact)?;
            *cost += scored.cost;
            if scored.value >= self.fact_merge_threshold {
                if !existing.members.iter().any(|m| m == node_key) {
                    existing.members.push(node_key.to_string());
                }
                tracing::debug!(fact, merged_into = i, score = scored.value, "merged fact mention");
                return Ok(i);
            }
        }

        knowledge.knowledge.push(FactRecord {
            id: 0,
            knowledge: fact.to_string(),
            memory_name: node_key.to_string(),
            members: vec![node_key.to_string()],
        });
        Ok(knowledge.knowledge.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ActivityAndFacts;
    use crate::models::{
        CaptureMethod, DayEvent, Location, MediaMetadata, MediaType, MemoryNode, TemporalInfo,
        TimeOfDay,
    };
    use crate::services::stubs::ScriptedProvider;

    fn node_on(name: &str, date_string: &str) -> MemoryNode {
        let mut node = MemoryNode::new(name, format!("/media/{name}"), MediaType::Image);
        node.metadata = Some(MediaMetadata {
            temporal_info: TemporalInfo {
                date_string: date_string.to_string(),
                day_of_week: "Friday".to_string(),
                time_of_the_day: TimeOfDay::Afternoon,
            },
            location: Location::default(),
            capture_method: CaptureMethod::Photo,
        });
        node
    }

    fn day_event(name: &str, date: &str) -> DayEvent {
        DayEvent {
            event_name: name.to_string(),
            date: date.to_string(),
            location: String::new(),
            is_multi_days: false,
            importance: 2,
        }
    }

    #[test]
    fn test_event_pipeline_checkpoints_by_date_and_month() {
        let provider = Arc::new(ScriptedProvider::new());
        provider
            .day_events
            .lock()
            .expect("lock")
            .insert("2024-06-14".to_string(), vec![day_event("Beach day", "2024-06-14")]);

        let consolidator = KnowledgeConsolidator::new(provider.clone(), 7);
        let mut memory = MemoryGraph::new();
        memory.insert(node_on("a.jpg", "2024:06:14 15:30:00"));
        let mut knowledge = KnowledgeGraph::new();
        let mut cost = 0.0;

        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("consolidate");

        assert_eq!(knowledge.events.by_date["2024-06-14"].len(), 1);
        let month = &knowledge.events.by_event["2024-06"];
        assert_eq!(month.len(), 1);
        assert_eq!(month[0].event_name, "Beach day");
        assert_eq!(month[0].id, 0);
        assert!(memory.get("a.jpg").expect("node").is_processed_event);
        assert!(cost > 0.0);

        // A second run finds every checkpoint in place and extracts nothing.
        let day_calls = provider.call_count("extract_day_events");
        let month_calls = provider.call_count("merge_month_events");
        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("reconsolidate");
        assert_eq!(provider.call_count("extract_day_events"), day_calls);
        assert_eq!(provider.call_count("merge_month_events"), month_calls);
    }

    #[test]
    fn test_month_events_get_sequential_ids() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.day_events.lock().expect("lock").insert(
            "2024-06-14".to_string(),
            vec![
                day_event("Beach day", "2024-06-14"),
                day_event("Dinner out", "2024-06-14"),
            ],
        );

        let consolidator = KnowledgeConsolidator::new(provider, 7);
        let mut memory = MemoryGraph::new();
        memory.insert(node_on("a.jpg", "2024:06:14 15:30:00"));
        let mut knowledge = KnowledgeGraph::new();
        let mut cost = 0.0;
        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("consolidate");

        let ids: Vec<usize> = knowledge.events.by_event["2024-06"]
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_fact_extraction_records_activity_and_facts() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.activity_facts.lock().expect("lock").push_back(ActivityAndFacts {
            activity: "Having coffee with Jerry".to_string(),
            knowledge: vec!["Jerry's birthday is on March 2nd".to_string()],
        });

        let consolidator = KnowledgeConsolidator::new(provider, 7);
        let mut memory = MemoryGraph::new();
        memory.insert(node_on("a.jpg", "2024:06:14 15:30:00"));
        let mut knowledge = KnowledgeGraph::new();
        let mut cost = 0.0;
        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("consolidate");

        let node = memory.get("a.jpg").expect("node");
        assert_eq!(node.activity.as_deref(), Some("Having coffee with Jerry"));
        assert_eq!(node.knowledge_ids, vec![0]);
        assert!(node.is_processed_activity);
        assert!(node.is_processed_general_knowledge);

        assert_eq!(knowledge.activity.len(), 1);
        assert_eq!(knowledge.knowledge.len(), 1);
        assert_eq!(knowledge.knowledge[0].members, vec!["a.jpg"]);
        assert_eq!(knowledge.knowledge[0].id, 0);
    }

    #[test]
    fn test_similar_fact_merges_into_members() {
        let provider = Arc::new(ScriptedProvider::new());
        // The scripted scorer rates identical texts 10, so a repeat of the
        // same fact from a second node merges instead of duplicating.
        {
            let mut queue = provider.activity_facts.lock().expect("lock");
            queue.push_back(ActivityAndFacts {
                activity: String::new(),
                knowledge: vec!["The owner's cat is named Miso".to_string()],
            });
            queue.push_back(ActivityAndFacts {
                activity: String::new(),
                knowledge: vec!["The owner's cat is named Miso".to_string()],
            });
        }

        let consolidator = KnowledgeConsolidator::new(provider, 7);
        let mut memory = MemoryGraph::new();
        memory.insert(node_on("a.jpg", "2024:06:14 15:30:00"));
        memory.insert(node_on("b.jpg", "2024:06:15 10:00:00"));
        let mut knowledge = KnowledgeGraph::new();
        let mut cost = 0.0;
        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("consolidate");

        assert_eq!(knowledge.knowledge.len(), 1);
        assert_eq!(knowledge.knowledge[0].members, vec!["a.jpg", "b.jpg"]);
        // Both nodes point at the same fact id.
        assert_eq!(memory.get("a.jpg").expect("a").knowledge_ids, vec![0]);
        assert_eq!(memory.get("b.jpg").expect("b").knowledge_ids, vec![0]);
    }

    #[test]
    fn test_dissimilar_facts_stay_separate() {
        let provider = Arc::new(ScriptedProvider::new());
        {
            let mut queue = provider.activity_facts.lock().expect("lock");
            queue.push_back(ActivityAndFacts {
                activity: String::new(),
                knowledge: vec!["The owner's cat is named Miso".to_string()],
            });
            queue.push_back(ActivityAndFacts {
                activity: String::new(),
                knowledge: vec!["Jerry's birthday is on March 2nd".to_string()],
            });
        }

        let consolidator = KnowledgeConsolidator::new(provider, 7);
        let mut memory = MemoryGraph::new();
        memory.insert(node_on("a.jpg", "2024:06:14 15:30:00"));
        memory.insert(node_on("b.jpg", "2024:06:15 10:00:00"));
        let mut knowledge = KnowledgeGraph::new();
        let mut cost = 0.0;
        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("consolidate");

        assert_eq!(knowledge.knowledge.len(), 2);
        assert_eq!(knowledge.knowledge[0].id, 0);
        assert_eq!(knowledge.knowledge[1].id, 1);
    }

    #[test]
    fn test_processed_nodes_make_no_calls() {
        let provider = Arc::new(ScriptedProvider::new());
        let consolidator = KnowledgeConsolidator::new(provider.clone(), 7);

        let mut node = node_on("a.jpg", "2024:06:14 15:30:00");
        node.is_processed_activity = true;
        node.is_processed_general_knowledge = true;
        let mut memory = MemoryGraph::new();
        memory.insert(node);

        let mut knowledge = KnowledgeGraph::new();
        knowledge.events.by_date.insert("2024-06-14".to_string(), Vec::new());
        knowledge.events.by_event.insert("2024-06".to_string(), Vec::new());

        let mut cost = 0.0;
        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("consolidate");
        assert_eq!(provider.total_calls(), 0);
        assert!(cost.abs() < f64::EPSILON);
    }

    #[test]
    fn test_children_excluded_from_consolidation() {
        let provider = Arc::new(ScriptedProvider::new());
        let consolidator = KnowledgeConsolidator::new(provider.clone(), 7);

        let mut child = node_on("b.jpg", "2024:06:14 15:31:00");
        child.mark_child("a.jpg".into());
        let mut memory = MemoryGraph::new();
        memory.insert(child);

        let mut knowledge = KnowledgeGraph::new();
        let mut cost = 0.0;
        consolidator
            .consolidate(&mut memory, &mut knowledge, &mut cost)
            .expect("consolidate");
        assert_eq!(provider.total_calls(), 0);
        assert!(knowledge.events.by_date.is_empty());
    }
}
