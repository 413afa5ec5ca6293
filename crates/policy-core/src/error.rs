use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for pipeline operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while ingesting documents or answering queries.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// A required configuration option is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The vector store could not be reached.
    #[error("Could not connect to vector store at {endpoint}: {message}")]
    Connection {
        /// Endpoint that was contacted.
        endpoint: String,
        /// Underlying transport message.
        message: String,
    },

    /// A single document could not be turned into text.
    #[error("Failed to extract text from {document}: {message}")]
    Extraction {
        /// Source identifier of the document.
        document: String,
        /// Underlying extractor message.
        message: String,
    },

    /// An embedding batch failed.
    #[error("Embedding failed for {context}: {message}")]
    Embedding {
        /// Description of the batch that triggered the failure.
        context: String,
        /// Underlying provider message.
        message: String,
    },

    /// Upsert arrays disagree in length.
    #[error(
        "Upsert arrays are misaligned: {ids} ids, {embeddings} embeddings, {documents} documents, {metadatas} metadatas"
    )]
    Alignment {
        /// Number of ids.
        ids: usize,
        /// Number of embeddings.
        embeddings: usize,
        /// Number of documents.
        documents: usize,
        /// Number of metadata entries.
        metadatas: usize,
    },

    /// The vector store rejected a request.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// A query embedding does not match the collection dimensionality.
    #[error("Embedding dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality fixed by the collection.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// The generative model failed.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The user query was empty.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient errors like an unreachable store or network failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Request(_))
    }

    /// Builds a connection error from a transport failure against `endpoint`.
    pub fn connection(endpoint: impl Into<String>, error: &ReqwestError) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: error.to_string(),
        }
    }
}
