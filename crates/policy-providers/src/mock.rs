//! Mock generation provider.
//!
//! Streams a fixed script of increments and records every prompt it
//! receives, so pipelines can be exercised end-to-end without network calls.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use policy_core::{Error, GenerationProvider, IgnoreLock as _, Prompt, Result, TextStream};

/// Provider that replays scripted increments.
#[derive(Clone, Default)]
pub struct MockProvider {
    /// Increments streamed for every prompt
    increments: Vec<String>,
    /// Error raised instead of starting the stream
    start_failure: Option<String>,
    /// Error yielded after the scripted increments
    stream_failure: Option<String>,
    /// Prompts received, in call order
    prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl MockProvider {
    /// Creates a provider streaming `increments` in order.
    #[must_use]
    pub fn new<I, T>(increments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            increments: increments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Fails every call before streaming starts.
    #[must_use]
    pub fn with_start_failure(mut self, message: impl Into<String>) -> Self {
        self.start_failure = Some(message.into());
        self
    }

    /// Ends every stream with a terminal error after the scripted increments.
    #[must_use]
    pub fn with_stream_failure(mut self, message: impl Into<String>) -> Self {
        self.stream_failure = Some(message.into());
        self
    }

    /// Prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock_ignore_poison().clone()
    }

    /// Number of generation calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock_ignore_poison().len()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<TextStream> {
        self.prompts.lock_ignore_poison().push(prompt.clone());

        if let Some(message) = &self.start_failure {
            return Err(Error::Generation(message.clone()));
        }

        let mut items: Vec<Result<String>> = self.increments.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.stream_failure {
            items.push(Err(Error::Generation(message.clone())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}
