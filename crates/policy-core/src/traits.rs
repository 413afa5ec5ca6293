use core::pin::Pin;
use std::path::Path;

use async_trait::async_trait;
use futures::Stream;

use crate::{CollectionHandle, Document, Embedding, Prompt, QueryMatch, Result, UpsertBatch};

/// Lazily produced text increments from a generation call.
///
/// The stream is finite and cannot be restarted. Dropping it releases the
/// underlying connection.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Converts text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the backend and model, used in logs.
    fn name(&self) -> String;

    /// Embeds every text in `texts`, preserving length and order.
    ///
    /// # Errors
    /// Returns an error if the backend fails or returns fewer vectors than inputs.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Releases process-wide resources held by the provider.
    ///
    /// The provider stays usable afterwards and re-initializes on the next call.
    async fn release(&self) {}
}

/// Thin adapter over an external vector store.
#[async_trait]
pub trait VectorIndexClient: Send + Sync {
    /// Returns the named collection, creating it if needed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Connection`] if the store is unreachable.
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle>;

    /// Inserts or overwrites rows keyed by id.
    ///
    /// # Errors
    /// Returns an error if the batch is misaligned or the store rejects it.
    async fn upsert(&self, collection: &CollectionHandle, batch: UpsertBatch) -> Result<()>;

    /// Returns at most `top_k` rows ordered by ascending distance.
    ///
    /// # Errors
    /// Returns an error if the store rejects the query, for example on a dimension mismatch.
    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>>;

    /// Number of rows stored in the collection.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    async fn count(&self, collection: &CollectionHandle) -> Result<usize>;
}

/// Turns a source file into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// File extensions (lowercase, without dot) this extractor understands.
    fn extensions(&self) -> &[&str];

    /// Human-readable document kind used in messages, e.g. `PDF`.
    fn document_kind(&self) -> &str;

    /// Extracts the text of the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Extraction`] if the file cannot be parsed.
    async fn extract(&self, path: &Path) -> Result<Document>;
}

/// Streams answers from a generative model.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the unique identifier for this provider.
    fn name(&self) -> &'static str;

    /// Starts a streaming generation for `prompt`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Generation`] if the call cannot be started. Failures
    /// after the first increment surface as a terminal error item in the stream.
    async fn stream(&self, prompt: &Prompt) -> Result<TextStream>;
}
