//! Gemini `streamGenerateContent` provider.
//!
//! Responses are requested as server-sent events (`?alt=sse`) and decoded
//! line by line from the byte stream. Each `data:` event yields the text of
//! the first candidate as one increment.

use core::fmt::Display;
use core::mem;
use core::result::Result as CoreResult;
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt as _, stream};
use policy_core::{Error, GenerationProvider, Prompt, RagConfig, Result, TextStream};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Header carrying the Gemini API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Streaming generation through the Gemini API.
#[derive(Clone)]
pub struct GeminiProvider {
    /// HTTP client for API requests.
    client: Client,
    /// API base URL without trailing slash.
    base_url: String,
    /// Gemini API key.
    api_key: String,
    /// Model identifier without the `models/` prefix.
    model: String,
}

impl GeminiProvider {
    /// Creates a provider for `model`.
    ///
    /// Only connection setup is bounded by `connect_timeout`; streamed
    /// responses may run longer.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the API key is empty or the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("missing Gemini API key".to_owned()));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.trim().to_owned(),
            model: model.into().trim().trim_start_matches("models/").to_owned(),
        })
    }

    /// Creates a provider from the pipeline configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the API key is not configured.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(
            config.api_key()?,
            config.gemini.generation_model.clone(),
            config.gemini.base_url.clone(),
            Duration::from_secs(config.gemini.timeout_seconds.max(1)),
        )
    }

    /// Model used for generation.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    fn request_body(prompt: &Prompt) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{ "text": prompt.system }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt.user }]
            }]
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<TextStream> {
        debug!(model = %self.model, "Sending Gemini streaming request");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|error| Error::Generation(format!("request to Gemini failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("Gemini returned {status}: {body}")));
        }

        Ok(sse_text_stream(Box::pin(response.bytes_stream())))
    }
}

/// Incremental decoder for Gemini server-sent events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current incomplete line.
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns the increments of every completed line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.buffer.extend_from_slice(bytes);
        let mut increments = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(item) = decode_line(&line) {
                increments.push(item);
            }
        }
        increments
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<Result<String>> {
        let line = mem::take(&mut self.buffer);
        decode_line(&line).into_iter().collect()
    }
}

/// Decodes one SSE line into a text increment.
fn decode_line(line: &[u8]) -> Option<Result<String>> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(event) => event_text(&event),
        Err(error) => {
            warn!(error = %error, "Failed to parse Gemini SSE event");
            None
        }
    }
}

/// Extracts the concatenated text parts of the first candidate.
fn event_text(event: &Value) -> Option<Result<String>> {
    if let Some(error) = event.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned);
        return Some(Err(Error::Generation(message)));
    }

    let parts = event
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return None;
    }
    Some(Ok(text))
}

/// State threaded through the increment stream.
struct SseState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

/// Turns an SSE byte stream into a stream of text increments.
///
/// A transport failure yields one terminal error item and ends the stream.
pub fn sse_text_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = CoreResult<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let initial = SseState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(initial, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let decoded = state.decoder.push(chunk.as_ref());
                    state.pending.extend(decoded);
                }
                Some(Err(error)) => state.pending.push_back(Err(Error::Generation(format!(
                    "stream interrupted: {error}"
                )))),
                None => {
                    state.finished = true;
                    let decoded = state.decoder.finish();
                    state.pending.extend(decoded);
                }
            }
        }
    }))
}
