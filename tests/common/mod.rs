//! Shared stub collaborators for the integration tests.
#![allow(dead_code)]

use recollect::embedding::ImageEmbedder;
use recollect::ingest::{MetadataExtractor, RawMedia};
use recollect::llm::{
    ActivityAndFacts, Costed, FactCandidate, RatedEvent, RatedFact, RatedNode, ReasoningProvider,
    VisualContent,
};
use recollect::models::{
    CaptureMethod, DayEvent, Event, EventIndex, Location, MediaMetadata, QueryKind, TemporalInfo,
    TimeOfDay,
};
use recollect::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Image embedder that maps exact media bytes to preset vectors.
///
/// Lets a test dial in a precise cosine similarity between two captures.
#[derive(Default)]
pub struct PresetImageEmbedder {
    by_content: Vec<(Vec<u8>, Vec<f32>)>,
}

impl PresetImageEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, bytes: &[u8], vector: Vec<f32>) -> Self {
        self.by_content.push((bytes.to_vec(), vector));
        self
    }
}

impl ImageEmbedder for PresetImageEmbedder {
    fn dimensions(&self) -> usize {
        2
    }

    fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        self.by_content
            .iter()
            .find(|(content, _)| content == bytes)
            .map(|(_, vector)| vector.clone())
            .ok_or_else(|| Error::InvalidInput("no preset embedding for these bytes".to_string()))
    }
}

/// Metadata extractor scripted per filename.
#[derive(Default)]
pub struct PresetMetadata {
    by_name: BTreeMap<String, (String, CaptureMethod)>,
}

impl PresetMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filename: &str, date_string: &str, method: CaptureMethod) -> Self {
        self.by_name
            .insert(filename.to_string(), (date_string.to_string(), method));
        self
    }
}

impl MetadataExtractor for PresetMetadata {
    fn extract(&self, media: &RawMedia) -> Result<MediaMetadata> {
        let (date_string, method) =
            self.by_name
                .get(&media.filename)
                .cloned()
                .ok_or_else(|| Error::Metadata {
                    filename: media.filename.clone(),
                    cause: "no preset metadata".to_string(),
                })?;
        Ok(MediaMetadata {
            temporal_info: TemporalInfo {
                date_string,
                day_of_week: "Friday".to_string(),
                time_of_the_day: TimeOfDay::Afternoon,
            },
            location: Location::default(),
            capture_method: method,
        })
    }
}

/// Reasoning provider with scripted responses and call counting.
pub struct StubProvider {
    /// Day events per date key.
    pub day_events: Mutex<BTreeMap<String, Vec<DayEvent>>>,
    /// Activity/fact responses per node caption substring, matched in order.
    pub activity_facts: Mutex<Vec<(String, ActivityAndFacts)>>,
    /// Query classification result.
    pub query_kind: Mutex<QueryKind>,
    /// Relatedness assigned to every fact candidate.
    pub fact_rating: Mutex<u8>,
    /// Call counts per operation.
    pub calls: Mutex<BTreeMap<&'static str, usize>>,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self {
            day_events: Mutex::new(BTreeMap::new()),
            activity_facts: Mutex::new(Vec::new()),
            query_kind: Mutex::new(QueryKind::Retrieval),
            fact_rating: Mutex::new(3),
            calls: Mutex::new(BTreeMap::new()),
        }
    }
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

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

impl ReasoningProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn generate_visual_content(&self, image_bytes: &[u8]) -> Result<Costed<VisualContent>> {
        self.record("generate_visual_content");
        // Caption derived from the bytes keeps captions distinct per capture.
        let caption = format!("capture of {}", String::from_utf8_lossy(image_bytes));
        Ok(Costed::new(
            VisualContent {
                caption,
                objects: Vec::new(),
                people: Vec::new(),
            },
            0.001,
        ))
    }

    fn transcribe_text(&self, _image_bytes: &[u8]) -> Result<Costed<String>> {
        self.record("transcribe_text");
        Ok(Costed::new(String::new(), 0.001))
    }

    fn extract_day_events(&self, date: &str, _texts: &[String]) -> Result<Costed<Vec<DayEvent>>> {
        self.record("extract_day_events");
        let events = self
            .day_events
            .lock()
            .expect("day_events lock")
            .get(date)
            .cloned()
            .unwrap_or_default();
        Ok(Costed::new(events, 0.001))
    }

    fn merge_month_events(
        &self,
        _month: &str,
        day_events: &[Vec<DayEvent>],
    ) -> Result<Costed<Vec<Event>>> {
        self.record("merge_month_events");
        let events = day_events
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
            .collect();
        Ok(Costed::new(events, 0.001))
    }

    fn extract_activity_and_facts(
        &self,
        node_text: &str,
        _events: &EventIndex,
    ) -> Result<Costed<ActivityAndFacts>> {
        self.record("extract_activity_and_facts");
        let response = self
            .activity_facts
            .lock()
            .expect("activity_facts lock")
            .iter()
            .find(|(needle, _)| node_text.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_default();
        Ok(Costed::new(response, 0.001))
    }

    fn score_text_similarity(&self, text1: &str, text2: &str) -> Result<Costed<u8>> {
        self.record("score_text_similarity");
        let score = if text1 == text2 { 10 } else { 0 };
        Ok(Costed::new(score, 0.001))
    }

    fn classify_query(&self, _query: &str) -> Result<Costed<QueryKind>> {
        self.record("classify_query");
        Ok(Costed::new(
            *self.query_kind.lock().expect("query_kind lock"),
            0.001,
        ))
    }

    fn rate_fact_relatedness(
        &self,
        _query: &str,
        facts: &[FactCandidate],
    ) -> Result<Costed<Vec<RatedFact>>> {
        self.record("rate_fact_relatedness");
        let relatedness = *self.fact_rating.lock().expect("fact_rating lock");
        let rated = facts
            .iter()
            .map(|fact| RatedFact {
                knowledge_id: fact.knowledge_id.clone(),
                relatedness,
            })
            .collect();
        Ok(Costed::new(rated, 0.001))
    }

    fn rate_event_relatedness(
        &self,
        query: &str,
        events: &EventIndex,
    ) -> Result<Costed<Vec<RatedEvent>>> {
        self.record("rate_event_relatedness");
        // An event is relevant when the query names it.
        let rated = events
            .by_event
            .iter()
            .flat_map(|(month, month_events)| {
                month_events.iter().map(move |event| RatedEvent {
                    month: month.clone(),
                    event_id: event.id,
                    event_name: event.event_name.clone(),
                    relatedness: if query
                        .to_lowercase()
                        .contains(&event.event_name.to_lowercase())
                    {
                        3
                    } else {
                        1
                    },
                })
            })
            .collect();
        Ok(Costed::new(rated, 0.001))
    }

    fn rate_node_relatedness(
        &self,
        _query: &str,
        node_texts: &[String],
    ) -> Result<Costed<Vec<RatedNode>>> {
        self.record("rate_node_relatedness");
        let rated = (0..node_texts.len())
            .map(|i| RatedNode {
                node_id: i,
                relatedness: 3,
            })
            .collect();
        Ok(Costed::new(rated, 0.001))
    }

    fn synthesize_answer(
        &self,
        _query: &str,
        node_texts: &[String],
        _events: &[Event],
        facts: &[String],
    ) -> Result<Costed<String>> {
        self.record("synthesize_answer");
        Ok(Costed::new(
            format!("answer from {} memories and {} facts", node_texts.len(), facts.len()),
            0.001,
        ))
    }
}

/// Writes a media fixture file.
pub fn write_media(dir: &Path, name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(name), bytes).expect("write media fixture");
}
