//! Shared fixtures for router and command tests

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use policy_cli::{AppState, Pipelines};
use policy_context::{IngestionPipeline, MemoryIndex, PlainTextExtractor, RetrievalPipeline};
use policy_core::{Embedding, EmbeddingProvider, Error, Result};
use policy_providers::MockProvider;
use tempfile::TempDir;

/// Vocabulary used by [`KeywordEmbedder`]; one dimension per word.
const VOCABULARY: [&str; 6] = ["vacation", "leave", "travel", "flights", "laptop", "encryption"];

/// Embeds text as keyword counts plus a constant bias dimension.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    failing: bool,
}

impl KeywordEmbedder {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> String {
        "fake/keywords".to_owned()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::Embedding {
                context: "fake".to_owned(),
                message: "provider unavailable".to_owned(),
            });
        }
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }
}

/// Application state over in-memory services and a documents directory.
pub struct Fixture {
    pub state: AppState,
    pub generator: MockProvider,
    pub embedder: Arc<KeywordEmbedder>,
    pub index: Arc<MemoryIndex>,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new(generator: MockProvider) -> Self {
        Self::with_embedder(generator, KeywordEmbedder::default())
    }

    pub fn with_embedder(generator: MockProvider, embedder: KeywordEmbedder) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("leave.txt"),
            "Vacation leave: employees accrue twenty vacation days per year.",
        )
        .unwrap();
        fs::write(
            dir.path().join("travel.md"),
            "Travel: book economy flights through the company portal.",
        )
        .unwrap();

        let embedder = Arc::new(embedder);
        let index = Arc::new(MemoryIndex::new());
        let cloud = pipelines(&embedder, &index, &generator, "policy_documents");
        let local = pipelines(&embedder, &index, &generator, "policy_documents_local");
        let state = AppState::new(cloud, local, dir.path());

        Self {
            state,
            generator,
            embedder,
            index,
            dir,
        }
    }
}

fn pipelines(
    embedder: &Arc<KeywordEmbedder>,
    index: &Arc<MemoryIndex>,
    generator: &MockProvider,
    collection: &str,
) -> Pipelines {
    let ingestion = IngestionPipeline::new(
        Arc::new(PlainTextExtractor),
        Arc::clone(embedder) as _,
        Arc::clone(index) as _,
        collection,
    );
    let retrieval = RetrievalPipeline::new(
        Arc::clone(embedder) as _,
        Arc::clone(index) as _,
        Arc::new(generator.clone()),
        collection,
    )
    .with_top_k(1);
    Pipelines::new(ingestion, retrieval)
}
