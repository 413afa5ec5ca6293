//! Cloud embeddings through the Gemini `batchEmbedContents` API.

use core::result::Result as CoreResult;
use std::time::Duration;

use async_trait::async_trait;
use policy_core::{Embedding, EmbeddingProvider, Error, RagConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header carrying the Gemini API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Embedding client that sends every call as one batched request.
#[derive(Clone)]
pub struct GeminiEmbeddingClient {
    /// HTTP client for API requests.
    client: Client,
    /// API base URL without trailing slash.
    base_url: String,
    /// Gemini API key.
    api_key: String,
    /// Model identifier without the `models/` prefix.
    model: String,
}

impl GeminiEmbeddingClient {
    /// Creates a client for `model`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the API key or model is empty, or the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let model = model.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("missing Gemini API key".to_owned()));
        }
        if model.trim().is_empty() {
            return Err(Error::Config("missing embedding model name".to_owned()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.trim().to_owned(),
            model: model.trim().trim_start_matches("models/").to_owned(),
        })
    }

    /// Creates a client from the pipeline configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the API key is not configured.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(
            config.api_key()?,
            config.gemini.embedding_model.clone(),
            config.gemini.base_url.clone(),
            Duration::from_secs(config.gemini.timeout_seconds.max(1)),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:batchEmbedContents", self.base_url, self.model)
    }

    fn batch_error(&self, count: usize, message: impl Into<String>) -> Error {
        Error::Embedding {
            context: format!("batch of {count} texts via gemini/{}", self.model),
            message: message.into(),
        }
    }
}

/// Request payload for `batchEmbedContents`.
#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'text> {
    /// One embed request per input text.
    requests: Vec<EmbedContentRequest<'text>>,
}

/// A single embed request.
#[derive(Debug, Serialize)]
struct EmbedContentRequest<'text> {
    /// Fully-qualified model name, `models/<id>`.
    model: String,
    /// Content to embed.
    content: Content<'text>,
}

/// Content wrapper holding text parts.
#[derive(Debug, Serialize)]
struct Content<'text> {
    /// Text parts of the content.
    parts: Vec<Part<'text>>,
}

/// A text part.
#[derive(Debug, Serialize)]
struct Part<'text> {
    /// Text to embed.
    text: &'text str,
}

/// Response payload returned by `batchEmbedContents`.
#[derive(Debug, Default, Deserialize)]
struct BatchEmbedResponse {
    /// Embeddings in request order.
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

/// A single returned embedding.
#[derive(Debug, Default, Deserialize)]
struct ContentEmbedding {
    /// Vector values.
    #[serde(default)]
    values: Vec<f32>,
}

impl BatchEmbedResponse {
    /// Validates the response against the number of inputs.
    fn into_vectors(self, expected: usize) -> CoreResult<Vec<Embedding>, String> {
        if self.embeddings.len() != expected {
            return Err(format!(
                "Gemini returned {} embeddings for {expected} inputs",
                self.embeddings.len()
            ));
        }
        if let Some(position) = self
            .embeddings
            .iter()
            .position(|embedding| embedding.values.is_empty())
        {
            return Err(format!("Gemini returned an empty vector at position {position}"));
        }
        Ok(self
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingClient {
    fn name(&self) -> String {
        format!("gemini/{}", self.model)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model_path = format!("models/{}", self.model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model_path.clone(),
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        debug!(count = texts.len(), model = %self.model, "Sending Gemini embedding batch");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| self.batch_error(texts.len(), format!("request failed: {error}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(self.batch_error(texts.len(), format!("API error {status}: {body}")));
        }

        let parsed: BatchEmbedResponse = response.json().await.map_err(|error| {
            self.batch_error(texts.len(), format!("failed to parse response: {error}"))
        })?;

        parsed
            .into_vectors(texts.len())
            .map_err(|message| self.batch_error(texts.len(), message))
    }
}
