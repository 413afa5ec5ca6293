//! Query answering: embed, retrieve top-k, assemble a grounded prompt, stream.

use std::sync::Arc;

use policy_core::{
    EmbeddingProvider, Error, GenerationProvider, Prompt, Result, RetrievedChunk, TextStream,
    VectorIndexClient,
};
use tracing::{debug, info};

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Notice placed in the prompt when retrieval found nothing.
pub const NO_CONTEXT_NOTICE: &str = "No relevant context was found in the policy documents.";

/// System instruction restricting answers to the retrieved context.
pub const SYSTEM_INSTRUCTION: &str = "You are an assistant that answers questions about company policy documents. \
Answer only from the provided context. If the context does not contain the answer, \
say that the policy documents do not cover it. Cite the source of the passages you use.";

/// Builds the grounded prompt for `query` from chunks in relevance order.
pub fn build_prompt(query: &str, chunks: &[RetrievedChunk]) -> Prompt {
    let mut user = String::from("Context:\n");
    if chunks.is_empty() {
        user.push_str(NO_CONTEXT_NOTICE);
        user.push('\n');
    }
    for (position, chunk) in chunks.iter().enumerate() {
        if position > 0 {
            user.push('\n');
        }
        user.push_str(&format!(
            "[{}] source: {}, chunk {}\n{}\n",
            position + 1,
            chunk.source,
            chunk.chunk_index,
            chunk.text
        ));
    }
    user.push_str("\nQuestion: ");
    user.push_str(query.trim());

    Prompt {
        system: SYSTEM_INSTRUCTION.to_owned(),
        user,
    }
}

/// Answers queries against one collection.
///
/// The embedding provider must be the one that populated the collection.
pub struct RetrievalPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndexClient>,
    generator: Arc<dyn GenerationProvider>,
    collection: String,
    top_k: usize,
}

impl RetrievalPipeline {
    /// Creates a pipeline over `collection`.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndexClient>,
        generator: Arc<dyn GenerationProvider>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            collection: collection.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Sets the number of chunks retrieved per query.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Target collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Chunks retrieved per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Returns the chunks closest to `query`, most relevant first.
    ///
    /// # Errors
    /// Returns [`Error::InvalidQuery`] for a blank query, or the embedding or
    /// vector store error that stopped retrieval.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let query = validate_query(query)?;

        let mut vectors = self.embedder.embed(&[query.to_owned()]).await?;
        let embedding = vectors.pop().filter(|_| vectors.is_empty()).ok_or_else(|| {
            Error::Embedding {
                context: "query".to_owned(),
                message: "provider did not return exactly one vector".to_owned(),
            }
        })?;

        let collection = self.index.get_or_create_collection(&self.collection).await?;
        let matches = self.index.query(&collection, &embedding, self.top_k).await?;
        debug!(
            collection = %self.collection,
            matches = matches.len(),
            "Retrieved context"
        );
        Ok(matches.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Streams a grounded answer to `query`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidQuery`] for a blank query before any backend
    /// call, or the error that prevented generation from starting.
    pub async fn answer(&self, query: &str) -> Result<TextStream> {
        let query = validate_query(query)?;
        let chunks = self.retrieve(query).await?;
        info!(
            collection = %self.collection,
            context_chunks = chunks.len(),
            generator = self.generator.name(),
            "Answering query"
        );
        let prompt = build_prompt(query, &chunks);
        self.generator.stream(&prompt).await
    }
}

fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidQuery("query must not be empty".to_owned()));
    }
    Ok(trimmed)
}
