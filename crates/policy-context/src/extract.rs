//! Text extractors turning source files into [`Document`]s.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use policy_core::{Document, Error, RagConfig, Result, TextExtractor};
use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio::fs;
use tracing::debug;

/// Source identifier for a path: its file name.
pub fn source_id(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn extraction_error(path: &Path, message: impl Into<String>) -> Error {
    Error::Extraction {
        document: source_id(path),
        message: message.into(),
    }
}

/// Extracts PDF text through an external Tika-compatible service.
#[derive(Clone)]
pub struct HttpTextExtractor {
    client: Client,
    endpoint: String,
}

impl HttpTextExtractor {
    /// Creates an extractor that PUTs file bytes to `endpoint`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Creates an extractor from the pipeline configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(
            config.ingestion.extractor_url.clone(),
            Duration::from_secs(config.gemini.timeout_seconds.max(1)),
        )
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn document_kind(&self) -> &str {
        "PDF"
    }

    async fn extract(&self, path: &Path) -> Result<Document> {
        let bytes = fs::read(path)
            .await
            .map_err(|error| extraction_error(path, format!("failed to read file: {error}")))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Sending document to text extractor");

        let response = self
            .client
            .put(&self.endpoint)
            .header(ACCEPT, "text/plain")
            .body(bytes)
            .send()
            .await
            .map_err(|error| extraction_error(path, format!("extractor unreachable: {error}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(extraction_error(path, format!("extractor returned {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|error| extraction_error(path, format!("invalid extractor response: {error}")))?;
        Ok(Document::new(source_id(path), text))
    }
}

/// Reads UTF-8 text and markdown files directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    fn document_kind(&self) -> &str {
        "text"
    }

    async fn extract(&self, path: &Path) -> Result<Document> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|error| extraction_error(path, error.to_string()))?;
        Ok(Document::new(source_id(path), text))
    }
}
