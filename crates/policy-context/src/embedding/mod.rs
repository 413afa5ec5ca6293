//! Embedding providers backed by remote services.
//!
//! The local ONNX provider lives in the `policy-local` crate; both implement
//! [`policy_core::EmbeddingProvider`].

mod gemini;

pub use gemini::GeminiEmbeddingClient;
