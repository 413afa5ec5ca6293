use core::result::Result as CoreResult;

use thiserror::Error;

/// Result type for local model operations.
pub type Result<T> = CoreResult<T, LocalError>;

/// Errors raised while loading or running the local embedding model.
#[derive(Debug, Error)]
pub enum LocalError {
    /// Model or tokenizer files could not be loaded.
    #[error("Model load failed: {0}")]
    Load(String),

    /// Text could not be tokenized.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// The inference graph failed to run.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The model produced an output of unexpected shape.
    #[error("Shape error: {0}")]
    Shape(String),
}

impl From<LocalError> for policy_core::Error {
    fn from(error: LocalError) -> Self {
        Self::Embedding {
            context: "local model".to_owned(),
            message: error.to_string(),
        }
    }
}
