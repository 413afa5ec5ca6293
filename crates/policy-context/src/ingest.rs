//! Document ingestion: extract, chunk, embed and upsert.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use policy_core::{
    CollectionHandle, EmbeddingProvider, Error, IngestReport, Result, TextExtractor, UpsertBatch,
    VectorIndexClient,
};
use tokio::fs;
use tracing::{Instrument as _, debug, error, info, info_span, warn};

use crate::chunking::Chunker;
use crate::extract::source_id;

/// Default number of chunks embedded per provider call.
pub const EMBED_BATCH_SIZE: usize = 100;
/// Default number of rows sent to the vector store per upsert call.
pub const UPSERT_BATCH_SIZE: usize = 1000;

/// Result of ingesting a single document.
enum DocumentOutcome {
    /// All chunks were upserted.
    Upserted(usize),
    /// The document produced no usable text.
    Skipped,
}

/// Sequential ingestion of a document directory into one collection.
pub struct IngestionPipeline {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndexClient>,
    collection: String,
    chunker: Chunker,
    embed_batch_size: usize,
    upsert_batch_size: usize,
}

impl IngestionPipeline {
    /// Creates a pipeline writing into `collection` with default chunking.
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndexClient>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            collection: collection.into(),
            chunker: Chunker::default(),
            embed_batch_size: EMBED_BATCH_SIZE,
            upsert_batch_size: UPSERT_BATCH_SIZE,
        }
    }

    /// Replaces the chunker.
    #[must_use]
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Sets how many chunks are sent to the provider per call. Zero is treated as one.
    #[must_use]
    pub fn with_embed_batch_size(mut self, embed_batch_size: usize) -> Self {
        self.embed_batch_size = embed_batch_size.max(1);
        self
    }

    /// Sets the maximum rows per upsert call. Zero is treated as one.
    #[must_use]
    pub fn with_upsert_batch_size(mut self, upsert_batch_size: usize) -> Self {
        self.upsert_batch_size = upsert_batch_size.max(1);
        self
    }

    /// Target collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ingests every recognised file in `documents_dir`.
    ///
    /// Failures are reported through the returned [`IngestReport`]. The
    /// embedding provider is released once the run ends.
    pub async fn ingest(&self, documents_dir: &Path) -> IngestReport {
        let span = info_span!(
            "ingest",
            collection = %self.collection,
            provider = %self.embedder.name()
        );
        let report = self.run(documents_dir).instrument(span).await;
        self.embedder.release().await;
        report
    }

    async fn run(&self, documents_dir: &Path) -> IngestReport {
        let start = Instant::now();
        let files = self.discover(documents_dir).await;
        if files.is_empty() {
            let message = format!(
                "No {} files found in {}",
                self.extractor.document_kind(),
                documents_dir.display()
            );
            warn!("{message}");
            return IngestReport::default().failed(message);
        }

        info!(documents = files.len(), "Starting ingestion");

        let mut report = IngestReport::default();
        let collection = match self.index.get_or_create_collection(&self.collection).await {
            Ok(collection) => collection,
            Err(error) => {
                error!("Failed to open collection: {error}");
                return report.failed(error.to_string());
            }
        };

        for path in &files {
            let span = info_span!("document", path = %path.display());
            match self.ingest_document(&collection, path).instrument(span).await {
                Ok(DocumentOutcome::Upserted(count)) => {
                    report.chunk_count += count;
                    report.documents_ingested += 1;
                }
                Ok(DocumentOutcome::Skipped) => report.skipped.push(source_id(path)),
                Err(error) => {
                    error!(
                        chunks_upserted = report.chunk_count,
                        "Ingestion aborted: {error}"
                    );
                    return report.failed(error.to_string());
                }
            }
        }

        report.success = true;
        info!(
            chunks = report.chunk_count,
            documents = report.documents_ingested,
            skipped = report.skipped.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Ingestion complete"
        );
        report
    }

    /// Lists recognised files sorted by file name. A missing directory yields none.
    async fn discover(&self, documents_dir: &Path) -> Vec<PathBuf> {
        let mut entries = match fs::read_dir(documents_dir).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(dir = %documents_dir.display(), "Cannot read documents directory: {error}");
                return Vec::new();
            }
        };

        let extensions = self.extractor.extensions();
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    warn!("Failed to read directory entry: {error}");
                    continue;
                }
            };
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .is_ok_and(|file_type| file_type.is_file());
            let recognised = path
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| {
                    extensions
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                });
            if is_file && recognised {
                files.push(path);
            }
        }
        files.sort_by(|first, second| first.file_name().cmp(&second.file_name()));
        files
    }

    async fn ingest_document(
        &self,
        collection: &CollectionHandle,
        path: &Path,
    ) -> Result<DocumentOutcome> {
        let document = match self.extractor.extract(path).await {
            Ok(document) => document,
            Err(error) => {
                warn!("Skipping document: {error}");
                return Ok(DocumentOutcome::Skipped);
            }
        };

        let chunks = self.chunker.chunk_document(&document);
        if chunks.is_empty() {
            warn!(source = %document.source, "Skipping document without extractable text");
            return Ok(DocumentOutcome::Skipped);
        }
        debug!(source = %document.source, chunks = chunks.len(), "Chunked document");

        let mut embeddings = Vec::with_capacity(chunks.len());
        for (batch_number, batch) in chunks.chunks(self.embed_batch_size).enumerate() {
            let first = batch_number * self.embed_batch_size;
            let range = first..first + batch.len();
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await.map_err(|error| {
                let message = match error {
                    Error::Embedding { message, .. } => message,
                    other => other.to_string(),
                };
                Error::Embedding {
                    context: format!("{} chunks {}..{}", document.source, range.start, range.end),
                    message,
                }
            })?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding {
                    context: format!("{} chunks {}..{}", document.source, range.start, range.end),
                    message: format!(
                        "provider returned {} vectors for {} chunks",
                        vectors.len(),
                        batch.len()
                    ),
                });
            }
            debug!(
                source = %document.source,
                batch = batch_number + 1,
                "Embedded chunks {}..{}",
                range.start,
                range.end
            );
            embeddings.extend(vectors);
        }

        // Nothing is written until every chunk of the document has a vector.
        let mut vectors = embeddings.into_iter();
        for rows in chunks.chunks(self.upsert_batch_size) {
            let row_vectors = vectors.by_ref().take(rows.len()).collect();
            let upsert = UpsertBatch::from_chunks(rows, row_vectors)?;
            self.index.upsert(collection, upsert).await?;
            debug!(source = %document.source, rows = rows.len(), "Upserted rows");
        }
        info!(source = %document.source, chunks = chunks.len(), "Upserted document");
        Ok(DocumentOutcome::Upserted(chunks.len()))
    }
}
