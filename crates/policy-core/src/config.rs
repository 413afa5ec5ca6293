//! Configuration for the ingestion and retrieval pipelines.
//!
//! Values come from an optional TOML file and are then overridden by the
//! environment variables listed in [`RagConfig::OPTIONS`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Suffix appended to the collection name for the local embedding variant.
pub const LOCAL_COLLECTION_SUFFIX: &str = "_local";

/// A named configuration option read from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigOption {
    /// Environment variable name.
    pub env: &'static str,
    /// Whether startup fails when the option is absent.
    pub required: bool,
    /// Short description shown in validation errors.
    pub description: &'static str,
}

/// Complete pipeline configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Gemini API settings for cloud embeddings and generation
    pub gemini: GeminiConfig,
    /// Vector store settings
    pub vector_store: VectorStoreConfig,
    /// Local embedding model settings
    pub local: LocalModelConfig,
    /// Ingestion settings
    pub ingestion: IngestionConfig,
    /// Retrieval settings
    pub retrieval: RetrievalConfig,
    /// HTTP server settings
    pub server: ServerConfig,
}

/// Gemini API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key for the Gemini API
    pub api_key: Option<String>,
    /// Base URL of the API
    pub base_url: String,
    /// Cloud embedding model identifier
    pub embedding_model: String,
    /// Generation model identifier
    pub generation_model: String,
    /// Timeout in seconds for API requests
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_owned(),
            embedding_model: "text-embedding-004".to_owned(),
            generation_model: "gemini-1.5-flash".to_owned(),
            timeout_seconds: 60,
        }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Base URL of the Chroma server
    pub url: String,
    /// Chroma tenant
    pub tenant: String,
    /// Chroma database
    pub database: String,
    /// Base collection name; the local variant appends `_local`
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_owned(),
            tenant: "default_tenant".to_owned(),
            database: "default_database".to_owned(),
            collection: "policy_documents".to_owned(),
        }
    }
}

/// Local embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalModelConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`
    pub model_dir: PathBuf,
    /// Maximum tokens per input before truncation
    pub max_tokens: usize,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            max_tokens: 256,
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory scanned for source documents
    pub documents_dir: PathBuf,
    /// Endpoint of the external text extraction service
    pub extractor_url: String,
    /// Maximum texts per embedding request
    pub embed_batch_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("documents"),
            extractor_url: "http://localhost:9998/tika".to_owned(),
            embed_batch_size: 100,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the server binds to
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_owned(),
        }
    }
}

impl RagConfig {
    /// Every option recognised in the environment.
    pub const OPTIONS: &'static [ConfigOption] = &[
        ConfigOption {
            env: "GEMINI_API_KEY",
            required: true,
            description: "Gemini API key used for cloud embeddings and generation",
        },
        ConfigOption {
            env: "GEMINI_BASE_URL",
            required: false,
            description: "Gemini API base URL",
        },
        ConfigOption {
            env: "EMBEDDING_MODEL",
            required: false,
            description: "cloud embedding model identifier",
        },
        ConfigOption {
            env: "GENERATION_MODEL",
            required: false,
            description: "generation model identifier",
        },
        ConfigOption {
            env: "CHROMA_URL",
            required: false,
            description: "vector store endpoint",
        },
        ConfigOption {
            env: "CHROMA_TENANT",
            required: false,
            description: "vector store tenant",
        },
        ConfigOption {
            env: "CHROMA_DATABASE",
            required: false,
            description: "vector store database",
        },
        ConfigOption {
            env: "COLLECTION_NAME",
            required: false,
            description: "base collection name",
        },
        ConfigOption {
            env: "LOCAL_EMBEDDING_MODEL_DIR",
            required: false,
            description: "directory of the local ONNX embedding model",
        },
        ConfigOption {
            env: "TEXT_EXTRACTOR_URL",
            required: false,
            description: "text extraction service endpoint",
        },
        ConfigOption {
            env: "DOCUMENTS_DIR",
            required: false,
            description: "directory scanned for policy documents",
        },
        ConfigOption {
            env: "BIND_ADDRESS",
            required: false,
            description: "HTTP server bind address",
        },
        ConfigOption {
            env: "RETRIEVAL_TOP_K",
            required: false,
            description: "number of chunks retrieved per query",
        },
    ];

    /// Builds the configuration from defaults and the process environment.
    ///
    /// # Errors
    /// Returns an error if a value cannot be parsed or a required option is missing.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from defaults and an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if a value cannot be parsed or a required option is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file (when given), overlays the environment and validates.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(file) => Self::load_from_file(file)?,
            None => Self::default(),
        };
        config.apply_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific file without validating it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read {}: {error}", path.display())))?;
        let config: Self = toml::from_str(&contents)?;

        tracing::debug!(
            "Loaded config from {:?}: gemini_api_key={}",
            path,
            if config.gemini.api_key.is_some() {
                "present"
            } else {
                "missing"
            }
        );

        Ok(config)
    }

    /// Overrides fields with values returned by `lookup`.
    ///
    /// # Errors
    /// Returns an error if a numeric option cannot be parsed.
    pub fn apply_lookup<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|found| !found.trim().is_empty());

        if let Some(api_key) = value("GEMINI_API_KEY") {
            self.gemini.api_key = Some(api_key);
        }
        if let Some(base_url) = value("GEMINI_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Some(model) = value("EMBEDDING_MODEL") {
            self.gemini.embedding_model = model;
        }
        if let Some(model) = value("GENERATION_MODEL") {
            self.gemini.generation_model = model;
        }
        if let Some(url) = value("CHROMA_URL") {
            self.vector_store.url = url;
        }
        if let Some(tenant) = value("CHROMA_TENANT") {
            self.vector_store.tenant = tenant;
        }
        if let Some(database) = value("CHROMA_DATABASE") {
            self.vector_store.database = database;
        }
        if let Some(collection) = value("COLLECTION_NAME") {
            self.vector_store.collection = collection;
        }
        if let Some(model_dir) = value("LOCAL_EMBEDDING_MODEL_DIR") {
            self.local.model_dir = PathBuf::from(model_dir);
        }
        if let Some(url) = value("TEXT_EXTRACTOR_URL") {
            self.ingestion.extractor_url = url;
        }
        if let Some(dir) = value("DOCUMENTS_DIR") {
            self.ingestion.documents_dir = PathBuf::from(dir);
        }
        if let Some(address) = value("BIND_ADDRESS") {
            self.server.bind_address = address;
        }
        if let Some(top_k) = value("RETRIEVAL_TOP_K") {
            self.retrieval.top_k = parse_option("RETRIEVAL_TOP_K", &top_k)?;
        }
        Ok(())
    }

    /// Checks that required options are present and values are usable.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming every missing required option.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = Self::OPTIONS
            .iter()
            .filter(|option| option.required && !self.is_set(option.env))
            .map(|option| format!("{} ({})", option.env, option.description))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("RETRIEVAL_TOP_K must be at least 1".to_owned()));
        }
        if self.ingestion.embed_batch_size == 0 {
            return Err(Error::Config(
                "ingestion.embed_batch_size must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Collection populated by the cloud embedding provider.
    pub fn cloud_collection(&self) -> String {
        self.vector_store.collection.clone()
    }

    /// Collection populated by the local embedding provider.
    pub fn local_collection(&self) -> String {
        format!("{}{LOCAL_COLLECTION_SUFFIX}", self.vector_store.collection)
    }

    /// Gemini API key, or a configuration error when absent.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the key is not configured.
    pub fn api_key(&self) -> Result<&str> {
        self.gemini
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".to_owned()))
    }

    fn is_set(&self, env_name: &str) -> bool {
        match env_name {
            "GEMINI_API_KEY" => self
                .gemini
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty()),
            _ => true,
        }
    }
}

fn parse_option<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw}")))
}
