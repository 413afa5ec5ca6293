use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single embedding vector.
pub type Embedding = Vec<f32>;

/// Extracted document text together with its stable source identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier of the document, usually its file name.
    pub source: String,
    /// Raw extracted text.
    pub text: String,
}

impl Document {
    /// Creates a document from a source identifier and its text.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A bounded text window derived from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source identifier of the owning document.
    pub source: String,
    /// Zero-based position among the chunks of the same document.
    pub chunk_index: usize,
    /// Chunk body submitted to the embedding model.
    pub text: String,
}

impl Chunk {
    /// Creates a new chunk.
    pub fn new(source: impl Into<String>, chunk_index: usize, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            chunk_index,
            text: text.into(),
        }
    }

    /// Persisted row identifier, `"{source}-{chunk_index}"`.
    pub fn id(&self) -> String {
        format!("{}-{}", self.source, self.chunk_index)
    }

    /// Metadata stored alongside the row.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Metadata persisted with every chunk row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source identifier of the owning document.
    #[serde(default)]
    pub source: String,
    /// Zero-based chunk position within the document.
    #[serde(default)]
    pub chunk_index: usize,
}

/// Reference to a collection owned by the vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    /// Collection name used for addressing.
    pub name: String,
    /// Store-assigned collection identifier.
    pub id: String,
}

/// Index-aligned arrays sent to the vector store in one upsert call.
#[derive(Debug, Clone, Default)]
pub struct UpsertBatch {
    /// Row identifiers.
    pub ids: Vec<String>,
    /// Embedding vectors.
    pub embeddings: Vec<Embedding>,
    /// Chunk texts.
    pub documents: Vec<String>,
    /// Row metadata.
    pub metadatas: Vec<ChunkMetadata>,
}

impl UpsertBatch {
    /// Builds an aligned batch from chunks and their embeddings.
    ///
    /// # Errors
    /// Returns [`Error::Alignment`] if the number of embeddings differs from the number of chunks.
    pub fn from_chunks(chunks: &[Chunk], embeddings: Vec<Embedding>) -> Result<Self> {
        let batch = Self {
            ids: chunks.iter().map(Chunk::id).collect(),
            documents: chunks.iter().map(|chunk| chunk.text.clone()).collect(),
            metadatas: chunks.iter().map(Chunk::metadata).collect(),
            embeddings,
        };
        batch.validate()?;
        Ok(batch)
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch carries no rows.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Checks that all four arrays have the same length.
    ///
    /// # Errors
    /// Returns [`Error::Alignment`] describing the lengths when they differ.
    pub fn validate(&self) -> Result<()> {
        let expected = self.ids.len();
        if self.embeddings.len() == expected
            && self.documents.len() == expected
            && self.metadatas.len() == expected
        {
            return Ok(());
        }
        Err(Error::Alignment {
            ids: self.ids.len(),
            embeddings: self.embeddings.len(),
            documents: self.documents.len(),
            metadatas: self.metadatas.len(),
        })
    }
}

/// One nearest-neighbour match returned by the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    /// Row identifier.
    pub id: String,
    /// Stored chunk text.
    pub document: String,
    /// Stored row metadata.
    pub metadata: ChunkMetadata,
    /// Distance to the query embedding (smaller is more similar).
    pub distance: f32,
}

/// A retrieved chunk as used for prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// Source identifier of the document.
    pub source: String,
    /// Chunk position within the document.
    pub chunk_index: usize,
    /// Chunk text.
    pub text: String,
    /// Relevance distance reported by the store.
    pub distance: f32,
}

impl From<QueryMatch> for RetrievedChunk {
    fn from(found: QueryMatch) -> Self {
        Self {
            source: found.metadata.source,
            chunk_index: found.metadata.chunk_index,
            text: found.document,
            distance: found.distance,
        }
    }
}

/// Prompt handed to a generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System instruction constraining the answer.
    pub system: String,
    /// User turn with context and question.
    pub user: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Whether the run completed without a fatal error.
    pub success: bool,
    /// Total chunks upserted across all ingested documents.
    pub chunk_count: usize,
    /// Number of documents fully upserted.
    pub documents_ingested: usize,
    /// Sources skipped because they produced no usable text.
    pub skipped: Vec<String>,
    /// Human-readable error for unsuccessful runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestReport {
    /// Marks the report as failed with the given message.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}
