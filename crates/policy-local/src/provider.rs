//! Lazily loaded local embedding provider.

use core::result::Result as CoreResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use policy_core::{Embedding, EmbeddingProvider, Error, RagConfig, Result};
use tokio::sync::Mutex;
use tokio::task;
use tracing::info;

use crate::error::LocalError;
use crate::session::{EmbeddingSession, OnnxSession};

/// Loader invoked on the blocking pool the first time the model is needed.
pub type SessionLoader =
    Arc<dyn Fn() -> CoreResult<Arc<dyn EmbeddingSession>, LocalError> + Send + Sync>;

/// Embedding provider running a sentence encoder in process.
///
/// The model is loaded on first use and kept until [`EmbeddingProvider::release`]
/// is called; the next `embed` call loads it again.
pub struct LocalEmbeddingModel {
    label: String,
    loader: SessionLoader,
    session: Mutex<Option<Arc<dyn EmbeddingSession>>>,
    loads: AtomicUsize,
}

impl LocalEmbeddingModel {
    /// Creates a provider for the ONNX model stored in `model_dir`.
    pub fn new(model_dir: impl Into<PathBuf>, max_tokens: usize) -> Self {
        let model_dir: PathBuf = model_dir.into();
        let label = model_label(&model_dir);
        let loader: SessionLoader = Arc::new(move || {
            let session = OnnxSession::load(&model_dir, max_tokens)?;
            Ok(Arc::new(session) as Arc<dyn EmbeddingSession>)
        });
        Self::with_loader(label, loader)
    }

    /// Creates a provider from the pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.local.model_dir.clone(), config.local.max_tokens)
    }

    /// Creates a provider that obtains its session from `loader`.
    pub fn with_loader(label: impl Into<String>, loader: SessionLoader) -> Self {
        Self {
            label: label.into(),
            loader,
            session: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Whether a session is currently held.
    pub async fn is_loaded(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Number of times the session has been loaded.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Returns the session, loading it once if needed.
    async fn session(&self) -> Result<Arc<dyn EmbeddingSession>> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(Arc::clone(session));
        }

        info!(model = %self.label, "Loading local embedding model");
        let loader = Arc::clone(&self.loader);
        let session = task::spawn_blocking(move || loader())
            .await
            .map_err(|error| Error::Embedding {
                context: self.label.clone(),
                message: format!("model loading task failed: {error}"),
            })??;
        self.loads.fetch_add(1, Ordering::SeqCst);
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }
}

fn model_label(model_dir: &Path) -> String {
    let name = model_dir
        .file_name()
        .map_or_else(|| model_dir.display().to_string(), |name| name.to_string_lossy().into_owned());
    format!("local/{name}")
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingModel {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.session().await?;
        let batch = texts.to_vec();
        let vectors = task::spawn_blocking(move || session.embed_batch(&batch))
            .await
            .map_err(|error| Error::Embedding {
                context: self.label.clone(),
                message: format!("inference task failed: {error}"),
            })??;

        if vectors.len() != texts.len() {
            return Err(Error::Embedding {
                context: self.label.clone(),
                message: format!(
                    "model returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                ),
            });
        }
        Ok(vectors)
    }

    async fn release(&self) {
        if self.session.lock().await.take().is_some() {
            info!(model = %self.label, "Released local embedding model");
        }
    }
}
