//! Tests for the ingestion pipeline over a temporary documents directory

use std::fs;
use std::sync::Arc;

use policy_context::{Chunker, ChunkerConfig, IngestionPipeline, MemoryIndex};
use policy_core::VectorIndexClient as _;
use tempfile::TempDir;

use crate::common::{FakeEmbedder, FakePdfExtractor, RecordingIndex, alphabet_text};

const COLLECTION: &str = "policy_documents";

fn pipeline(embedder: &Arc<FakeEmbedder>, index: &Arc<MemoryIndex>) -> IngestionPipeline {
    IngestionPipeline::new(
        Arc::new(FakePdfExtractor),
        Arc::clone(embedder) as _,
        Arc::clone(index) as _,
        COLLECTION,
    )
}

async fn stored_rows(index: &MemoryIndex) -> usize {
    let handle = index.get_or_create_collection(COLLECTION).await.unwrap();
    index.count(&handle).await.unwrap()
}

#[tokio::test]
async fn test_single_document_yields_three_chunks() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("A.pdf"), alphabet_text(2500)).unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(MemoryIndex::new());

    let report = pipeline(&embedder, &index).ingest(dir.path()).await;

    assert!(report.success, "{report:?}");
    assert_eq!(report.chunk_count, 3);
    assert_eq!(report.documents_ingested, 1);
    assert_eq!(stored_rows(&index).await, 3);

    let handle = index.get_or_create_collection(COLLECTION).await.unwrap();
    let matches = index
        .query(&handle, &FakeEmbedder::embedding("anything"), 10)
        .await
        .unwrap();
    let mut ids: Vec<String> = matches.into_iter().map(|found| found.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["A.pdf-0", "A.pdf-1", "A.pdf-2"]);
}

#[tokio::test]
async fn test_empty_directory_reports_failure() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), "not a pdf").unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(MemoryIndex::new());

    let report = pipeline(&embedder, &index).ingest(dir.path()).await;

    assert!(!report.success);
    assert_eq!(report.chunk_count, 0);
    let error = report.error.unwrap();
    assert!(error.starts_with("No PDF files found in"), "{error}");
    assert!(error.contains(&dir.path().display().to_string()));
    assert!(embedder.batches().is_empty());
    assert_eq!(embedder.releases(), 1);
}

#[tokio::test]
async fn test_missing_directory_reports_failure() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist");
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(MemoryIndex::new());

    let report = pipeline(&embedder, &index).ingest(&missing).await;

    assert!(!report.success);
    assert!(report.error.unwrap().starts_with("No PDF files found in"));
}

#[tokio::test]
async fn test_reingestion_is_idempotent() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("leave.pdf"), alphabet_text(1800)).unwrap();
    fs::write(dir.path().join("travel.pdf"), "Economy class for flights under six hours.").unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(MemoryIndex::new());
    let pipeline = pipeline(&embedder, &index);

    let first = pipeline.ingest(dir.path()).await;
    let rows_after_first = stored_rows(&index).await;
    let second = pipeline.ingest(dir.path()).await;

    assert!(first.success && second.success);
    assert_eq!(first.chunk_count, second.chunk_count);
    assert_eq!(stored_rows(&index).await, rows_after_first);
    assert_eq!(embedder.releases(), 2);
}

#[tokio::test]
async fn test_unreadable_document_is_skipped() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a-broken.pdf"), "%CORRUPT binary").unwrap();
    fs::write(dir.path().join("b-blank.pdf"), "   \n\n  ").unwrap();
    fs::write(dir.path().join("c-handbook.pdf"), "Remote work requires manager approval.").unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(MemoryIndex::new());

    let report = pipeline(&embedder, &index).ingest(dir.path()).await;

    assert!(report.success);
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.documents_ingested, 1);
    assert_eq!(report.skipped, vec!["a-broken.pdf", "b-blank.pdf"]);
    assert_eq!(embedder.batches(), vec![1]);
}

#[tokio::test]
async fn test_embedding_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("1-first.pdf"), alphabet_text(1500)).unwrap();
    fs::write(dir.path().join("2-second.pdf"), "Second document body.").unwrap();
    fs::write(dir.path().join("3-third.pdf"), "Third document body.").unwrap();
    let embedder = Arc::new(FakeEmbedder::failing_on_call(2));
    let index = Arc::new(MemoryIndex::new());

    let report = pipeline(&embedder, &index).ingest(dir.path()).await;

    assert!(!report.success);
    assert_eq!(report.chunk_count, 2);
    assert_eq!(report.documents_ingested, 1);
    let error = report.error.unwrap();
    assert!(error.contains("2-second.pdf"), "{error}");
    assert!(error.contains("quota exceeded"), "{error}");
    assert_eq!(stored_rows(&index).await, 2);
    assert_eq!(embedder.batches().len(), 2);
    assert_eq!(embedder.releases(), 1);
}

#[tokio::test]
async fn test_embedding_is_batched_per_document() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("A.pdf"), alphabet_text(2500)).unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(MemoryIndex::new());

    let report = pipeline(&embedder, &index)
        .with_embed_batch_size(2)
        .ingest(dir.path())
        .await;

    assert!(report.success);
    assert_eq!(embedder.batches(), vec![2, 1]);
    assert_eq!(stored_rows(&index).await, 3);
}

#[tokio::test]
async fn test_upserts_respect_store_batch_limit() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("A.pdf"), alphabet_text(2500)).unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(RecordingIndex::default());

    let report = IngestionPipeline::new(
        Arc::new(FakePdfExtractor),
        Arc::clone(&embedder) as _,
        Arc::clone(&index) as _,
        COLLECTION,
    )
    .with_upsert_batch_size(2)
    .ingest(dir.path())
    .await;

    assert!(report.success, "{report:?}");
    assert_eq!(index.upserts(), vec![2, 1]);
    assert_eq!(embedder.batches(), vec![3]);
    let handle = index.get_or_create_collection(COLLECTION).await.unwrap();
    assert_eq!(index.count(&handle).await.unwrap(), 3);
}

#[tokio::test]
async fn test_failed_embedding_writes_no_partial_document() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("A.pdf"), alphabet_text(2500)).unwrap();
    let embedder = Arc::new(FakeEmbedder::failing_on_call(2));
    let index = Arc::new(RecordingIndex::default());

    let report = IngestionPipeline::new(
        Arc::new(FakePdfExtractor),
        Arc::clone(&embedder) as _,
        Arc::clone(&index) as _,
        COLLECTION,
    )
    .with_embed_batch_size(2)
    .with_upsert_batch_size(1)
    .ingest(dir.path())
    .await;

    assert!(!report.success);
    assert!(index.upserts().is_empty());
}

#[tokio::test]
async fn test_custom_chunker_is_used() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("A.pdf"), alphabet_text(250)).unwrap();
    let embedder = Arc::new(FakeEmbedder::new());
    let index = Arc::new(MemoryIndex::new());
    let chunker = Chunker::new(ChunkerConfig::new(100, 0).unwrap());

    let report = pipeline(&embedder, &index)
        .with_chunker(chunker)
        .ingest(dir.path())
        .await;

    assert_eq!(report.chunk_count, 3);
}
