//! Retrieval-augmented generation over policy documents.
//!
//! This crate implements the pipeline stages: chunking extracted text,
//! embedding chunks through the Gemini API, storing and querying vectors in
//! Chroma (or an in-memory index), and assembling grounded prompts whose
//! answers are streamed back to the caller.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::float_cmp,
        clippy::absolute_paths,
        clippy::assertions_on_result_states,
        reason = "Test allows"
    )
)]

/// Recursive character chunking.
pub mod chunking;
/// Cloud embedding client.
pub mod embedding;
/// Source file text extraction.
pub mod extract;
/// Vector index clients.
pub mod index;
/// Ingestion pipeline.
pub mod ingest;
/// Retrieval and generation pipeline.
pub mod retrieval;

pub use chunking::{CHUNK_OVERLAP, CHUNK_SIZE, Chunker, ChunkerConfig};
pub use embedding::GeminiEmbeddingClient;
pub use extract::{HttpTextExtractor, PlainTextExtractor};
pub use index::{ChromaClient, MemoryIndex};
pub use ingest::{EMBED_BATCH_SIZE, IngestionPipeline, UPSERT_BATCH_SIZE};
pub use retrieval::{NO_CONTEXT_NOTICE, RetrievalPipeline, build_prompt};
