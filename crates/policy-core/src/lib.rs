//! Core types and traits for the policy retrieval pipeline.
//!
//! This crate provides the error taxonomy, configuration, data model and the
//! capability traits implemented by embedding, vector index, extraction and
//! generation backends.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::absolute_paths,
        clippy::assertions_on_result_states,
        reason = "Test allows"
    )
)]

/// Configuration loading and validation.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Poison-tolerant locking.
pub mod sync;
/// Capability traits for pluggable backends.
pub mod traits;
/// Core data types for documents, chunks and retrieval results.
pub mod types;

pub use config::{ConfigOption, RagConfig};
pub use error::{Error, Result};
pub use sync::IgnoreLock;
pub use traits::{EmbeddingProvider, GenerationProvider, TextExtractor, TextStream, VectorIndexClient};
pub use types::{
    Chunk, ChunkMetadata, CollectionHandle, Document, Embedding, IngestReport, Prompt, QueryMatch,
    RetrievedChunk, UpsertBatch,
};
