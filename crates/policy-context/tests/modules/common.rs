//! Shared fakes for pipeline tests
//!
//! Embeddings are deterministic bag-of-words vectors, so texts sharing words
//! are close under cosine distance without any model.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher as _};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use policy_context::MemoryIndex;
use policy_core::{
    CollectionHandle, Document, Embedding, EmbeddingProvider, Error, IgnoreLock as _, QueryMatch,
    Result, TextExtractor, UpsertBatch, VectorIndexClient,
};
use tokio::fs;

/// Dimensionality of fake embeddings.
pub const FAKE_DIMENSION: usize = 64;

/// Fake embedding provider recording every batch size it receives.
#[derive(Default)]
pub struct FakeEmbedder {
    batches: Mutex<Vec<usize>>,
    fail_on_call: Option<usize>,
    releases: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `call`-th embed call (1-based).
    pub fn failing_on_call(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock_ignore_poison().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn embedding(text: &str) -> Embedding {
        let mut vector = vec![0.0; FAKE_DIMENSION];
        for word in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % FAKE_DIMENSION as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn name(&self) -> String {
        "fake/bag-of-words".to_owned()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let call = {
            let mut batches = self.batches.lock_ignore_poison();
            batches.push(texts.len());
            batches.len()
        };
        if self.fail_on_call == Some(call) {
            return Err(Error::Embedding {
                context: "fake".to_owned(),
                message: "quota exceeded".to_owned(),
            });
        }
        Ok(texts.iter().map(|text| Self::embedding(text)).collect())
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Extractor treating `.pdf` files as plain text; files starting with `%CORRUPT` fail.
pub struct FakePdfExtractor;

#[async_trait]
impl TextExtractor for FakePdfExtractor {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn document_kind(&self) -> &str {
        "PDF"
    }

    async fn extract(&self, path: &Path) -> Result<Document> {
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = fs::read_to_string(path).await?;
        if text.starts_with("%CORRUPT") {
            return Err(Error::Extraction {
                document: source,
                message: "unreadable PDF".to_owned(),
            });
        }
        Ok(Document::new(source, text))
    }
}

/// In-memory index recording the row count of every upsert call.
#[derive(Default)]
pub struct RecordingIndex {
    inner: MemoryIndex,
    upserts: Mutex<Vec<usize>>,
}

impl RecordingIndex {
    pub fn upserts(&self) -> Vec<usize> {
        self.upserts.lock_ignore_poison().clone()
    }
}

#[async_trait]
impl VectorIndexClient for RecordingIndex {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        self.inner.get_or_create_collection(name).await
    }

    async fn upsert(&self, collection: &CollectionHandle, batch: UpsertBatch) -> Result<()> {
        self.upserts.lock_ignore_poison().push(batch.len());
        self.inner.upsert(collection, batch).await
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        self.inner.query(collection, embedding, top_k).await
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        self.inner.count(collection).await
    }
}

/// Cyclic alphabet text of `len` characters with no separators.
pub fn alphabet_text(len: usize) -> String {
    "abcdefghijklmnopqrstuvwxyz".chars().cycle().take(len).collect()
}
