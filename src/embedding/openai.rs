//! `OpenAI` embeddings client.

use super::Embedder;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// `OpenAI` text embedding client.
pub struct OpenAiEmbedder {
    /// API key.
    api_key: Option<String>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// Embedding dimensions reported by the model.
    dimensions: usize,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiEmbedder {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

    /// Dimensions of the default model.
    pub const DEFAULT_DIMENSIONS: usize = 1536;

    /// Creates a new embeddings client, reading `OPENAI_API_KEY` from the
    /// environment.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            dimensions: Self::DEFAULT_DIMENSIONS,
            client: reqwest::blocking::Client::new(),
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

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Validates that the client is configured.
    fn validate(&self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(Error::service(
                "openai_embeddings",
                "OPENAI_API_KEY not set",
            ));
        }
        Ok(())
    }
}

impl Default for OpenAiEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".to_string()));
        }
        self.validate()?;

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::service("openai_embeddings", "API key not configured"))?;

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| Error::service("openai_embeddings", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::service(
                "openai_embeddings",
                format!("API returned status: {status} - {body}"),
            ));
        }

        let response: EmbeddingResponse = response
            .json()
            .map_err(|e| Error::service("openai_embeddings_response", e))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::service("openai_embeddings_response", "no embedding in response"))
    }
}

/// Request to the embeddings API.
#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

/// Response from the embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// One embedding in the response.
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
