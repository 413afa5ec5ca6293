//! Pipelines shared by the CLI commands and the HTTP server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use policy_context::{
    ChromaClient, GeminiEmbeddingClient, HttpTextExtractor, IngestionPipeline, RetrievalPipeline,
};
use policy_core::{
    EmbeddingProvider, GenerationProvider, IngestReport, RagConfig, Result, TextExtractor,
    VectorIndexClient,
};
use policy_local::LocalEmbeddingModel;
use policy_providers::GeminiProvider;
use tokio::sync::Mutex;
use tracing::info;

use crate::cli::Variant;

/// Ingestion and retrieval for one collection.
pub struct Pipelines {
    /// Writes documents into the collection.
    pub ingestion: IngestionPipeline,
    /// Answers queries from the collection.
    pub retrieval: RetrievalPipeline,
    ingest_lock: Mutex<()>,
}

impl Pipelines {
    /// Pairs an ingestion and a retrieval pipeline.
    pub fn new(ingestion: IngestionPipeline, retrieval: RetrievalPipeline) -> Self {
        Self {
            ingestion,
            retrieval,
            ingest_lock: Mutex::new(()),
        }
    }

    /// Runs ingestion, waiting for any run already in progress on this collection.
    pub async fn ingest(&self, documents_dir: &Path) -> IngestReport {
        let running = self.ingest_lock.lock().await;
        let report = self.ingestion.ingest(documents_dir).await;
        drop(running);
        report
    }
}

/// Cloud and local pipelines plus the documents directory.
#[derive(Clone)]
pub struct AppState {
    cloud: Arc<Pipelines>,
    local: Arc<Pipelines>,
    documents_dir: Arc<PathBuf>,
}

impl AppState {
    /// Creates state from already wired pipelines.
    pub fn new(cloud: Pipelines, local: Pipelines, documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            cloud: Arc::new(cloud),
            local: Arc::new(local),
            documents_dir: Arc::new(documents_dir.into()),
        }
    }

    /// Wires both variants against the configured services.
    ///
    /// Ingestion and retrieval get separate local model instances so a
    /// finished ingestion run can release its model without affecting queries.
    ///
    /// # Errors
    /// Returns an error if a configured endpoint is invalid or the API key is missing.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let index: Arc<dyn VectorIndexClient> = Arc::new(ChromaClient::from_config(config)?);
        let extractor: Arc<dyn TextExtractor> = Arc::new(HttpTextExtractor::from_config(config)?);
        let generator: Arc<dyn GenerationProvider> = Arc::new(GeminiProvider::from_config(config)?);
        let cloud_embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(GeminiEmbeddingClient::from_config(config)?);

        let cloud = build_pipelines(
            config,
            &config.cloud_collection(),
            &extractor,
            Arc::clone(&cloud_embedder),
            cloud_embedder,
            &index,
            &generator,
        );
        let local = build_pipelines(
            config,
            &config.local_collection(),
            &extractor,
            Arc::new(LocalEmbeddingModel::from_config(config)),
            Arc::new(LocalEmbeddingModel::from_config(config)),
            &index,
            &generator,
        );

        info!(
            vector_store = %config.vector_store.url,
            cloud_collection = %cloud.ingestion.collection(),
            local_collection = %local.ingestion.collection(),
            "Pipelines configured"
        );
        Ok(Self::new(cloud, local, config.ingestion.documents_dir.clone()))
    }

    /// Pipelines for `variant`.
    pub fn pipelines(&self, variant: Variant) -> &Pipelines {
        match variant {
            Variant::Cloud => &self.cloud,
            Variant::Local => &self.local,
        }
    }

    /// Directory scanned by ingestion requests.
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }
}

fn build_pipelines(
    config: &RagConfig,
    collection: &str,
    extractor: &Arc<dyn TextExtractor>,
    ingest_embedder: Arc<dyn EmbeddingProvider>,
    query_embedder: Arc<dyn EmbeddingProvider>,
    index: &Arc<dyn VectorIndexClient>,
    generator: &Arc<dyn GenerationProvider>,
) -> Pipelines {
    let ingestion = IngestionPipeline::new(
        Arc::clone(extractor),
        ingest_embedder,
        Arc::clone(index),
        collection,
    )
    .with_embed_batch_size(config.ingestion.embed_batch_size);
    let retrieval = RetrievalPipeline::new(
        query_embedder,
        Arc::clone(index),
        Arc::clone(generator),
        collection,
    )
    .with_top_k(config.retrieval.top_k);
    Pipelines::new(ingestion, retrieval)
}
