//! Scripted collaborator stubs shared by the service unit tests.

use crate::llm::{
    ActivityAndFacts, Costed, FactCandidate, RatedEvent, RatedFact, RatedNode, ReasoningProvider,
    VisualContent,
};
use crate::models::{DayEvent, Event, EventIndex, QueryKind};
use crate::Result;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// A reasoning provider driven by pre-loaded responses.
///
/// Every call is recorded by operation name so tests can assert on call
/// counts (in particular, that reruns make zero calls). Unscripted lookups
/// fall back to permissive defaults: empty extractions, relatedness 3,
/// similarity 10 for identical texts and 0 otherwise.
pub struct ScriptedProvider {
    /// Day events returned per date key.
    pub day_events: Mutex<BTreeMap<String, Vec<DayEvent>>>,
    /// Merged events returned per month key; unscripted months get one event
    /// per day-level candidate.
    pub month_events: Mutex<BTreeMap<String, Vec<Event>>>,
    /// Activity/fact responses, popped once per call.
    pub activity_facts: Mutex<VecDeque<ActivityAndFacts>>,
    /// Relatedness per fact id; missing ids rate 3.
    pub fact_ratings: Mutex<BTreeMap<String, u8>>,
    /// Relatedness per (month, event id); missing events rate 3.
    pub event_ratings: Mutex<BTreeMap<(String, usize), u8>>,
    /// Relatedness per candidate index; empty means all 3.
    pub node_ratings: Mutex<Vec<u8>>,
    /// Query classification result.
    pub query_kind: Mutex<QueryKind>,
    /// Synthesized answer text.
    pub answer: String,
    /// Call counts per operation.
    pub calls: Mutex<BTreeMap<&'static str, usize>>,
    /// Cost attributed to each call.
    pub call_cost: f64,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            day_events: Mutex::new(BTreeMap::new()),
            month_events: Mutex::new(BTreeMap::new()),
            activity_facts: Mutex::new(VecDeque::new()),
            fact_ratings: Mutex::new(BTreeMap::new()),
            event_ratings: Mutex::new(BTreeMap::new()),
            node_ratings: Mutex::new(Vec::new()),
            query_kind: Mutex::new(QueryKind::Retrieval),
            answer: "stub answer".to_string(),
            calls: Mutex::new(BTreeMap::new()),
            call_cost: 0.001,
        }
    }
}

impl ScriptedProvider {
    /// Creates a provider with permissive defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls recorded for an operation.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Total calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").values().sum()
    }

    fn record(&self, operation: &'static str) {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(operation)
            .or_insert(0) += 1;
    }
}

impl ReasoningProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn generate_visual_content(&self, _image_bytes: &[u8]) -> Result<Costed<VisualContent>> {
        self.record("generate_visual_content");
        Ok(Costed::new(
            VisualContent {
                caption: "a cat on a sofa".to_string(),
                objects: vec!["cat".to_string(), "sofa".to_string()],
                people: Vec::new(),
            },
            self.call_cost,
        ))
    }

    fn transcribe_text(&self, _image_bytes: &[u8]) -> Result<Costed<String>> {
        self.record("transcribe_text");
        Ok(Costed::new(String::new(), self.call_cost))
    }

    fn extract_day_events(
        &self,
        date: &str,
        _node_texts: &[String],
    ) -> Result<Costed<Vec<DayEvent>>> {
        self.record("extract_day_events");
        let events = self
            .day_events
            .lock()
            .expect("day_events lock")
            .get(date)
            .cloned()
            .unwrap_or_default();
        Ok(Costed::new(events, self.call_cost))
    }

    fn merge_month_events(
        &self,
        month: &str,
        day_events: &[Vec<DayEvent>],
    ) -> Result<Costed<Vec<Event>>> {
        self.record("merge_month_events");
        let scripted = self
            .month_events
            .lock()
            .expect("month_events lock")
            .get(month)
            .cloned();
        let events = scripted.unwrap_or_else(|| {
            day_events
                .iter()
                .flatten()
                .map(|day| Event {
                    id: 0,
                    event_name: day.event_name.clone(),
                    start_date: day.date.clone(),
                    end_date: day.date.clone(),
                    importance: day.importance,
                    child_events: Vec::new(),
                })
                .collect()
        });
        Ok(Costed::new(events, self.call_cost))
    }

    fn extract_activity_and_facts(
        &self,
        _node_text: &str,
        _events: &EventIndex,
    ) -> Result<Costed<ActivityAndFacts>> {
        self.record("extract_activity_and_facts");
        let response = self
            .activity_facts
            .lock()
            .expect("activity_facts lock")
            .pop_front()
            .unwrap_or_default();
        Ok(Costed::new(response, self.call_cost))
    }

    fn score_text_similarity(&self, text1: &str, text2: &str) -> Result<Costed<u8>> {
        self.record("score_text_similarity");
        let score = if text1 == text2 { 10 } else { 0 };
        Ok(Costed::new(score, self.call_cost))
    }

    fn classify_query(&self, _query: &str) -> Result<Costed<QueryKind>> {
        self.record("classify_query");
        Ok(Costed::new(
            *self.query_kind.lock().expect("query_kind lock"),
            self.call_cost,
        ))
    }

    fn rate_fact_relatedness(
        &self,
        _query: &str,
        facts: &[FactCandidate],
    ) -> Result<Costed<Vec<RatedFact>>> {
        self.record("rate_fact_relatedness");
        let ratings = self.fact_ratings.lock().expect("fact_ratings lock");
        let rated = facts
            .iter()
            .map(|fact| RatedFact {
                knowledge_id: fact.knowledge_id.clone(),
                relatedness: ratings.get(&fact.knowledge_id).copied().unwrap_or(3),
            })
            .collect();
        Ok(Costed::new(rated, self.call_cost))
    }

    fn rate_event_relatedness(
        &self,
        _query: &str,
        events: &EventIndex,
    ) -> Result<Costed<Vec<RatedEvent>>> {
        self.record("rate_event_relatedness");
        let ratings = self.event_ratings.lock().expect("event_ratings lock");
        let ratings = &*ratings;
        let rated = events
            .by_event
            .iter()
            .flat_map(|(month, month_events)| {
                month_events.iter().map(move |event| RatedEvent {
                    month: month.clone(),
                    event_id: event.id,
                    event_name: event.event_name.clone(),
                    relatedness: ratings
                        .get(&(month.clone(), event.id))
                        .copied()
                        .unwrap_or(3),
                })
            })
            .collect();
        Ok(Costed::new(rated, self.call_cost))
    }

    fn rate_node_relatedness(
        &self,
        _query: &str,
        node_texts: &[String],
    ) -> Result<Costed<Vec<RatedNode>>> {
        self.record("rate_node_relatedness");
        let ratings = self.node_ratings.lock().expect("node_ratings lock");
        let rated = (0..node_texts.len())
            .map(|i| RatedNode {
                node_id: i,
                relatedness: ratings.get(i).copied().unwrap_or(3),
            })
            .collect();
        Ok(Costed::new(rated, self.call_cost))
    }

    fn synthesize_answer(
        &self,
        _query: &str,
        _node_texts: &[String],
        _events: &[Event],
        _facts: &[String],
    ) -> Result<Costed<String>> {
        self.record("synthesize_answer");
        Ok(Costed::new(self.answer.clone(), self.call_cost))
    }
}
