//! Reasoning provider abstraction.
//!
//! Provides a unified interface to the language-model-backed collaborator that
//! performs captioning, OCR, event extraction, fact extraction, scoring, and
//! answer synthesis. Every call is priced: results come back as [`Costed`]
//! values and callers accumulate a running dollar cost.

mod openai;
pub mod prompts;

pub use openai::OpenAiClient;

use crate::models::{DayEvent, Event, EventIndex, QueryKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A provider result together with the dollar cost of producing it.
#[derive(Debug, Clone)]
pub struct Costed<T> {
    /// The parsed result.
    pub value: T,
    /// Dollar cost of the call.
    pub cost: f64,
}

impl<T> Costed<T> {
    /// Pairs a value with its cost.
    pub const fn new(value: T, cost: f64) -> Self {
        Self { value, cost }
    }

    /// Wraps a value that cost nothing to produce.
    pub const fn free(value: T) -> Self {
        Self { value, cost: 0.0 }
    }
}

/// Visual content extracted from one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualContent {
    /// One-sentence caption.
    #[serde(default)]
    pub caption: String,
    /// Visible objects.
    #[serde(default)]
    pub objects: Vec<String>,
    /// Visible people.
    #[serde(default)]
    pub people: Vec<String>,
}

/// Activity and fact strings inferred from one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityAndFacts {
    /// Activity description; empty when nothing notable.
    #[serde(default)]
    pub activity: String,
    /// Zero or more high-level fact strings.
    #[serde(default)]
    pub knowledge: Vec<String>,
}

/// A fact offered for relatedness rating.
#[derive(Debug, Clone, Serialize)]
pub struct FactCandidate {
    /// The fact's id in the fact store.
    pub knowledge_id: String,
    /// The fact text.
    pub knowledge: String,
}

/// A fact's rated relatedness to a query.
#[derive(Debug, Clone, Deserialize)]
pub struct RatedFact {
    /// The fact's id, echoed back by the provider.
    #[serde(deserialize_with = "de_string_or_number")]
    pub knowledge_id: String,
    /// Relatedness 1–3 (3 = strongly related).
    pub relatedness: u8,
}

/// An event's rated relatedness to a query.
#[derive(Debug, Clone, Deserialize)]
pub struct RatedEvent {
    /// Month key (`YYYY-MM`) the event lives under.
    pub month: String,
    /// The event's id within its month list.
    pub event_id: usize,
    /// Event name, echoed back by the provider.
    #[serde(default)]
    pub event_name: String,
    /// Relatedness 1–3 (3 = strongly related).
    pub relatedness: u8,
}

/// A candidate node's rated relatedness to a query.
#[derive(Debug, Clone, Deserialize)]
pub struct RatedNode {
    /// Index of the node in the candidate list that was rated.
    pub node_id: usize,
    /// Relatedness 1–3 (3 = strongly related).
    pub relatedness: u8,
}

/// Trait for reasoning providers.
///
/// No retries: a failed call propagates and aborts the calling phase.
pub trait ReasoningProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Describes an image: caption, visible objects, visible people.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn generate_visual_content(&self, image_bytes: &[u8]) -> Result<Costed<VisualContent>>;

    /// Transcribes text visible in an image (OCR).
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn transcribe_text(&self, image_bytes: &[u8]) -> Result<Costed<String>>;

    /// Extracts candidate events from one day's worth of capture context.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn extract_day_events(&self, date: &str, node_texts: &[String])
    -> Result<Costed<Vec<DayEvent>>>;

    /// Merges one month's day-level candidates into coarser multi-day events,
    /// rated 1–3 by importance with unimportant ones dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn merge_month_events(
        &self,
        month: &str,
        day_events: &[Vec<DayEvent>],
    ) -> Result<Costed<Vec<Event>>>;

    /// Infers an activity and high-level facts from one node, given the
    /// current event set as context.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn extract_activity_and_facts(
        &self,
        node_text: &str,
        events: &EventIndex,
    ) -> Result<Costed<ActivityAndFacts>>;

    /// Scores the similarity of two texts on a 0–10 scale (10 = identical).
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn score_text_similarity(&self, text1: &str, text2: &str) -> Result<Costed<u8>>;

    /// Classifies a query as retrieval or question.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    fn classify_query(&self, query: &str) -> Result<Costed<QueryKind>>;

    /// Rates each candidate fact's relatedness to the query (1–3).
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn rate_fact_relatedness(
        &self,
        query: &str,
        facts: &[FactCandidate],
    ) -> Result<Costed<Vec<RatedFact>>>;

    /// Rates every known event's relatedness to the query (1–3).
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn rate_event_relatedness(
        &self,
        query: &str,
        events: &EventIndex,
    ) -> Result<Costed<Vec<RatedEvent>>>;

    /// Rates each candidate node's relatedness to the query (1–3), by index
    /// into the given list.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    fn rate_node_relatedness(
        &self,
        query: &str,
        node_texts: &[String],
    ) -> Result<Costed<Vec<RatedNode>>>;

    /// Synthesizes an answer from the retrieved nodes, events, and facts.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    fn synthesize_answer(
        &self,
        query: &str,
        node_texts: &[String],
        events: &[Event],
        facts: &[String],
    ) -> Result<Costed<String>>;
}

/// HTTP client configuration for reasoning providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Builds a blocking HTTP client for provider requests with configured
/// timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Parses a structured provider response, mapping failures to `Error::Parse`.
///
/// # Errors
///
/// Returns `Error::Parse` if the response is not the expected JSON shape.
/// Responses are trusted as well-formed; no repair is attempted.
pub fn parse_structured<T: serde::de::DeserializeOwned>(
    operation: &str,
    response: &str,
) -> Result<T> {
    let json_str = extract_json_from_response(response);
    serde_json::from_str(json_str)
        .map_err(|e| Error::parse(operation, format!("invalid JSON: {e}. Response: {response}")))
}

/// Extracts JSON from a provider response, handling markdown code blocks.
fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks (without json marker)
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle raw JSON (find first { to last })
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            return &trimmed[start..=end];
        }
    }

    // Handle JSON array responses
    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed.rfind(']') {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// Accepts an id field serialized as either a JSON string or a number.
fn de_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}
