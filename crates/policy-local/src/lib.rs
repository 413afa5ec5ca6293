//! Local sentence embeddings for the policy retrieval pipeline.
//!
//! Runs an ONNX sentence encoder (for example `all-MiniLM-L6-v2`) through
//! tract, with mean pooling over attended tokens and L2 normalisation. The
//! model is loaded lazily and can be released between ingestion runs.
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

/// Local model errors.
pub mod error;
/// Pooling and normalisation.
pub mod pooling;
/// Lazily loaded embedding provider.
pub mod provider;
/// ONNX inference sessions.
pub mod session;
/// Tokenization.
pub mod tokenize;

pub use error::{LocalError, Result};
pub use pooling::{l2_normalize, mean_pool};
pub use provider::{LocalEmbeddingModel, SessionLoader};
pub use session::{EmbeddingSession, OnnxSession};
