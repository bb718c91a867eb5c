//! `OpenAI` chat-completions reasoning provider.

use super::{
    ActivityAndFacts, Costed, FactCandidate, LlmHttpConfig, RatedEvent, RatedFact, RatedNode,
    ReasoningProvider, VisualContent, build_http_client, parse_structured, prompts,
};
use crate::models::{DayEvent, Event, EventIndex, QueryKind};
use crate::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// `OpenAI` chat completions client.
///
/// Uses the main model for every operation except pairwise similarity
/// scoring, which runs on the cheaper similarity model because it is called
/// once per existing fact for every new fact mention.
pub struct OpenAiClient {
    /// API key.
    api_key: Option<String>,
    /// API endpoint.
    endpoint: String,
    /// Main model.
    model: String,
    /// Model for pairwise similarity scoring.
    similarity_model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default main model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    /// Default similarity-scoring model.
    pub const DEFAULT_SIMILARITY_MODEL: &'static str = "gpt-3.5-turbo-0125";

    /// Completion cap for every request.
    const MAX_TOKENS: u32 = 1000;

    /// Creates a new client, reading `OPENAI_API_KEY` from the environment.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            similarity_model: Self::DEFAULT_SIMILARITY_MODEL.to_string(),
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the main model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the similarity-scoring model.
    #[must_use]
    pub fn with_similarity_model(mut self, model: impl Into<String>) -> Self {
        self.similarity_model = model.into();
        self
    }

    /// Sets the HTTP timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Per-token dollar rate for prompt tokens; completion tokens cost 3x.
    fn token_rate(model: &str) -> f64 {
        if model.starts_with("gpt-3.5") {
            5e-7
        } else {
            5e-6
        }
    }

    /// Sends a chat completion and returns the response text with its cost.
    fn request(
        &self,
        operation: &str,
        model: &str,
        messages: Vec<ChatMessage>,
        json_mode: bool,
    ) -> Result<(String, f64)> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::service(operation, "OPENAI_API_KEY not set"))?;

        let request = ChatRequest {
            model: model.to_string(),
            messages,
            temperature: 0.0,
            max_tokens: Self::MAX_TOKENS,
            response_format: json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| Error::service(operation, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::service(
                operation,
                format!("API returned status: {status} - {body}"),
            ));
        }

        let response: ChatResponse = response.json().map_err(|e| Error::service(operation, e))?;

        let rate = Self::token_rate(model);
        let cost = response.usage.as_ref().map_or(0.0, |usage| {
            #[allow(clippy::cast_precision_loss)]
            {
                usage.prompt_tokens as f64 * rate + usage.completion_tokens as f64 * rate * 3.0
            }
        });

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::service(operation, "no content in response"))?;

        tracing::debug!(operation, cost, "completed provider call");
        metrics::counter!("recollect_provider_calls_total", "operation" => operation.to_string())
            .increment(1);

        Ok((content, cost))
    }

    /// Sends a text-only prompt pair.
    fn request_text(
        &self,
        operation: &str,
        model: &str,
        system: &str,
        user: String,
        json_mode: bool,
    ) -> Result<(String, f64)> {
        self.request(
            operation,
            model,
            vec![
                ChatMessage::system(system),
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(user),
                },
            ],
            json_mode,
        )
    }

    /// Sends a system prompt plus one image attachment.
    fn request_image(
        &self,
        operation: &str,
        system: &str,
        image_bytes: &[u8],
    ) -> Result<(String, f64)> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let messages = vec![
            ChatMessage::system(system),
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{encoded}"),
                        detail: "low".to_string(),
                    },
                }]),
            },
        ];
        self.request(operation, &self.model, messages, true)
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn generate_visual_content(&self, image_bytes: &[u8]) -> Result<Costed<VisualContent>> {
        let (response, cost) =
            self.request_image("generate_visual_content", prompts::VISUAL_CONTENT, image_bytes)?;
        let content = parse_structured("generate_visual_content", &response)?;
        Ok(Costed::new(content, cost))
    }

    fn transcribe_text(&self, image_bytes: &[u8]) -> Result<Costed<String>> {
        let (response, cost) =
            self.request_image("transcribe_text", prompts::TRANSCRIBE_TEXT, image_bytes)?;
        let parsed: TextResponse = parse_structured("transcribe_text", &response)?;
        Ok(Costed::new(parsed.text, cost))
    }

    fn extract_day_events(
        &self,
        date: &str,
        node_texts: &[String],
    ) -> Result<Costed<Vec<DayEvent>>> {
        let user = format!("Date: {date}\n\nCaptures:\n{}", node_texts.join("\n\n"));
        let (response, cost) = self.request_text(
            "extract_day_events",
            &self.model,
            prompts::DAY_EVENTS,
            user,
            true,
        )?;
        let parsed: EventListResponse<DayEvent> = parse_structured("extract_day_events", &response)?;
        Ok(Costed::new(parsed.events, cost))
    }

    fn merge_month_events(
        &self,
        month: &str,
        day_events: &[Vec<DayEvent>],
    ) -> Result<Costed<Vec<Event>>> {
        let candidates = serde_json::to_string(day_events)
            .map_err(|e| Error::service("merge_month_events", e))?;
        let user = format!("Month: {month}\n\nDay-level candidates:\n{candidates}");
        let (response, cost) = self.request_text(
            "merge_month_events",
            &self.model,
            prompts::MERGE_MONTH_EVENTS,
            user,
            true,
        )?;
        let parsed: EventListResponse<Event> = parse_structured("merge_month_events", &response)?;
        Ok(Costed::new(parsed.events, cost))
    }

    fn extract_activity_and_facts(
        &self,
        node_text: &str,
        events: &EventIndex,
    ) -> Result<Costed<ActivityAndFacts>> {
        let known_events = serde_json::to_string(&events.by_event)
            .map_err(|e| Error::service("extract_activity_and_facts", e))?;
        let user = format!("Memory:\n{node_text}\n\nKnown events:\n{known_events}");
        let (response, cost) = self.request_text(
            "extract_activity_and_facts",
            &self.model,
            prompts::ACTIVITY_AND_FACTS,
            user,
            true,
        )?;
        let parsed = parse_structured("extract_activity_and_facts", &response)?;
        Ok(Costed::new(parsed, cost))
    }

    fn score_text_similarity(&self, text1: &str, text2: &str) -> Result<Costed<u8>> {
        let user = format!("Statement 1: {text1}\nStatement 2: {text2}");
        let (response, cost) = self.request_text(
            "score_text_similarity",
            &self.similarity_model,
            prompts::TEXT_SIMILARITY,
            user,
            false,
        )?;
        let score = response.trim().parse::<f64>().map_err(|_| {
            Error::parse(
                "score_text_similarity",
                format!("expected a number, got: {response}"),
            )
        })?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let score = score.round().clamp(0.0, 10.0) as u8;
        Ok(Costed::new(score, cost))
    }

    fn classify_query(&self, query: &str) -> Result<Costed<QueryKind>> {
        let (response, cost) = self.request_text(
            "classify_query",
            &self.model,
            prompts::CLASSIFY_QUERY,
            query.to_string(),
            false,
        )?;
        Ok(Costed::new(QueryKind::parse(response.trim()), cost))
    }

    fn rate_fact_relatedness(
        &self,
        query: &str,
        facts: &[FactCandidate],
    ) -> Result<Costed<Vec<RatedFact>>> {
        let candidates =
            serde_json::to_string(facts).map_err(|e| Error::service("rate_fact_relatedness", e))?;
        let user = format!("Query: {query}\n\nFacts:\n{candidates}");
        let (response, cost) = self.request_text(
            "rate_fact_relatedness",
            &self.model,
            prompts::RATE_FACTS,
            user,
            true,
        )?;
        let parsed: RatedFactsResponse = parse_structured("rate_fact_relatedness", &response)?;
        Ok(Costed::new(parsed.knowledge, cost))
    }

    fn rate_event_relatedness(
        &self,
        query: &str,
        events: &EventIndex,
    ) -> Result<Costed<Vec<RatedEvent>>> {
        let known_events = serde_json::to_string(&events.by_event)
            .map_err(|e| Error::service("rate_event_relatedness", e))?;
        let user = format!("Query: {query}\n\nEvents by month:\n{known_events}");
        let (response, cost) = self.request_text(
            "rate_event_relatedness",
            &self.model,
            prompts::RATE_EVENTS,
            user,
            true,
        )?;
        let parsed: EventListResponse<RatedEvent> =
            parse_structured("rate_event_relatedness", &response)?;
        Ok(Costed::new(parsed.events, cost))
    }

    fn rate_node_relatedness(
        &self,
        query: &str,
        node_texts: &[String],
    ) -> Result<Costed<Vec<RatedNode>>> {
        let numbered: Vec<String> = node_texts
            .iter()
            .enumerate()
            .map(|(i, text)| format!("{i}. {text}"))
            .collect();
        let user = format!("Query: {query}\n\nMemories:\n{}", numbered.join("\n\n"));
        let (response, cost) = self.request_text(
            "rate_node_relatedness",
            &self.model,
            prompts::RATE_NODES,
            user,
            true,
        )?;
        let parsed: RatedNodesResponse = parse_structured("rate_node_relatedness", &response)?;
        Ok(Costed::new(parsed.nodes, cost))
    }

    fn synthesize_answer(
        &self,
        query: &str,
        node_texts: &[String],
        events: &[Event],
        facts: &[String],
    ) -> Result<Costed<String>> {
        let events_json =
            serde_json::to_string(events).map_err(|e| Error::service("synthesize_answer", e))?;
        let user = format!(
            "Question: {query}\n\nRetrieved memories:\n{}\n\nRelevant events:\n{events_json}\n\nRelevant facts:\n{}",
            node_texts.join("\n\n"),
            facts.join("\n"),
        );
        let (response, cost) = self.request_text(
            "synthesize_answer",
            &self.model,
            prompts::SYNTHESIZE_ANSWER,
            user,
            false,
        )?;
        Ok(Costed::new(response.trim().to_string(), cost))
    }
}

/// Request to the chat completions API.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

/// Structured-output request flag.
#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// One request message.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

impl ChatMessage {
    fn system(text: &str) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.to_string()),
        }
    }
}

/// Plain-text or multimodal message content.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multimodal message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
}

/// Image attachment reference.
#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

/// Response from the chat completions API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// Message within a completion choice.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Token usage reported by the API.
#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// `{"events": [...]}` wrapper shared by the event-shaped responses.
#[derive(Debug, Deserialize)]
struct EventListResponse<T> {
    #[serde(default = "Vec::new")]
    events: Vec<T>,
}

/// `{"text": "..."}` wrapper for OCR responses.
#[derive(Debug, Deserialize)]
struct TextResponse {
    #[serde(default)]
    text: String,
}

/// `{"knowledge": [...]}` wrapper for fact-rating responses.
#[derive(Debug, Deserialize)]
struct RatedFactsResponse {
    #[serde(default = "Vec::new")]
    knowledge: Vec<RatedFact>,
}

/// `{"nodes": [...]}` wrapper for node-rating responses.
#[derive(Debug, Deserialize)]
struct RatedNodesResponse {
    #[serde(default = "Vec::new")]
    nodes: Vec<RatedNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_configuration() {
        let client = OpenAiClient::new()
            .with_api_key("test-key")
            .with_endpoint("https://custom.endpoint")
            .with_model("gpt-4o-mini")
            .with_similarity_model("gpt-3.5-turbo");

        assert_eq!(client.api_key, Some("test-key".to_string()));
        assert_eq!(client.endpoint, "https://custom.endpoint");
        assert_eq!(client.model, "gpt-4o-mini");
        assert_eq!(client.similarity_model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_token_rates() {
        assert!((OpenAiClient::token_rate("gpt-4o") - 5e-6).abs() < f64::EPSILON);
        assert!((OpenAiClient::token_rate("gpt-3.5-turbo-0125") - 5e-7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_day_events_response_shape() {
        let response = r#"{"events": [{"event_name": "Beach day", "date": "2024-06-14",
            "location": "Santa Cruz", "is_multi_days": false, "importance": 2}]}"#;
        let parsed: EventListResponse<DayEvent> =
            parse_structured("extract_day_events", response).expect("parse");
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].event_name, "Beach day");
        assert_eq!(parsed.events[0].importance, 2);
    }

    #[test]
    fn test_merged_events_response_shape() {
        let response = r#"{"events": [{"event_name": "Japan trip",
            "start_date": "2024-06-10", "end_date": "2024-06-17", "importance": 3,
            "child_events": [{"event_name": "Arrival in Tokyo",
            "start_date": "2024-06-10", "end_date": "2024-06-10", "importance": 2}]}]}"#;
        let parsed: EventListResponse<Event> =
            parse_structured("merge_month_events", response).expect("parse");
        assert_eq!(parsed.events[0].child_events.len(), 1);
        // Ids are assigned by the caller, not the provider.
        assert_eq!(parsed.events[0].id, 0);
    }

    #[test]
    fn test_rated_responses_default_to_empty() {
        let parsed: RatedFactsResponse = parse_structured("rate_fact_relatedness", "{}")
            .expect("parse");
        assert!(parsed.knowledge.is_empty());
        let parsed: RatedNodesResponse = parse_structured("rate_node_relatedness", "{}")
            .expect("parse");
        assert!(parsed.nodes.is_empty());
    }

    #[test]
    fn test_message_content_serialization() {
        let text = MessageContent::Text("hello".to_string());
        assert_eq!(serde_json::to_string(&text).expect("json"), r#""hello""#);

        let parts = MessageContent::Parts(vec![ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "data:image/jpeg;base64,AAAA".to_string(),
                detail: "low".to_string(),
            },
        }]);
        let json = serde_json::to_string(&parts).expect("json");
        assert!(json.contains(r#""type":"image_url""#));
        assert!(json.contains(r#""detail":"low""#));
    }
}
