//! Chroma HTTP API (v2) adapter.

use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use policy_core::{
    ChunkMetadata, CollectionHandle, Error, QueryMatch, RagConfig, Result, UpsertBatch,
    VectorIndexClient,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Vector index client for a Chroma server.
#[derive(Clone)]
pub struct ChromaClient {
    /// HTTP client for API requests.
    client: Client,
    /// Server base URL without trailing slash.
    base_url: String,
    /// Tenant owning the database.
    tenant: String,
    /// Database holding the collections.
    database: String,
}

impl ChromaClient {
    /// Creates a client for the server at `base_url`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the URL is not http(s) or the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        tenant: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "vector store endpoint must be an http(s) URL, got {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            tenant: tenant.into(),
            database: database.into(),
        })
    }

    /// Creates a client from the pipeline configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configured endpoint is invalid.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(
            config.vector_store.url.clone(),
            config.vector_store.tenant.clone(),
            config.vector_store.database.clone(),
        )
    }

    /// Server endpoint reported in connection errors.
    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    fn collection_url(&self, collection: &CollectionHandle, action: &str) -> String {
        format!("{}/{}/{action}", self.collections_url(), collection.id)
    }

    /// Sends a request, mapping transport failures and error statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|error| {
            if error.is_connect() || error.is_timeout() {
                Error::connection(&self.base_url, &error)
            } else {
                Error::Request(error)
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        Err(Error::VectorStore(format!("Chroma returned {status}: {body}")))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|error| Error::VectorStore(format!("failed to parse Chroma response: {error}")))
    }
}

/// Request body for collection creation.
#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'name> {
    /// Collection name.
    name: &'name str,
    /// Return the existing collection instead of failing.
    get_or_create: bool,
}

/// Collection description returned by Chroma.
#[derive(Debug, Deserialize)]
struct CollectionModel {
    /// Server-assigned id.
    id: String,
    /// Collection name.
    name: String,
}

/// Request body for upserts.
#[derive(Debug, Serialize)]
struct UpsertRequest<'batch> {
    /// Row ids.
    ids: &'batch [String],
    /// Row embeddings.
    embeddings: &'batch [Vec<f32>],
    /// Row documents.
    documents: &'batch [String],
    /// Row metadata.
    metadatas: &'batch [ChunkMetadata],
}

/// Request body for nearest-neighbour queries.
#[derive(Debug, Serialize)]
struct QueryRequest<'embedding> {
    /// One query embedding per result list.
    query_embeddings: [&'embedding [f32]; 1],
    /// Maximum matches per query.
    n_results: usize,
    /// Fields to include in the response.
    include: [&'static str; 3],
}

/// Query response; every field holds one list per query embedding.
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    /// Matched ids.
    #[serde(default)]
    ids: Vec<Vec<String>>,
    /// Matched documents.
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    /// Matched metadata.
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Value>>>>,
    /// Distances to the query.
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    /// Flattens the first result list into matches sorted by ascending distance.
    fn into_matches(self, top_k: usize) -> Vec<QueryMatch> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let documents = first_list(self.documents);
        let metadatas = first_list(self.metadatas);
        let distances = first_list(self.distances);

        let mut matches: Vec<QueryMatch> = ids
            .into_iter()
            .enumerate()
            .map(|(position, id)| {
                let metadata = row_metadata(&id, metadatas.get(position).cloned().flatten());
                QueryMatch {
                    id,
                    document: documents
                        .get(position)
                        .cloned()
                        .flatten()
                        .unwrap_or_default(),
                    metadata,
                    distance: distances
                        .get(position)
                        .copied()
                        .flatten()
                        .unwrap_or(f32::MAX),
                }
            })
            .collect();
        matches.sort_by(|first, second| {
            first
                .distance
                .partial_cmp(&second.distance)
                .unwrap_or(Ordering::Equal)
        });
        matches.truncate(top_k);
        matches
    }
}

/// Decodes row metadata, falling back to the `{source}-{index}` row id when it is unusable.
fn row_metadata(id: &str, raw: Option<Value>) -> ChunkMetadata {
    raw.ok_or_else(|| "metadata missing".to_owned())
        .and_then(|value| serde_json::from_value(value).map_err(|error| error.to_string()))
        .unwrap_or_else(|reason| {
            warn!(id, "Unusable Chroma metadata, recovering it from the row id: {reason}");
            metadata_from_id(id)
        })
}

fn metadata_from_id(id: &str) -> ChunkMetadata {
    id.rsplit_once('-')
        .and_then(|(source, index)| {
            let chunk_index = index.parse().ok()?;
            Some(ChunkMetadata {
                source: source.to_owned(),
                chunk_index,
            })
        })
        .unwrap_or_else(|| ChunkMetadata {
            source: id.to_owned(),
            chunk_index: 0,
        })
}

fn first_list<T>(lists: Option<Vec<Vec<T>>>) -> Vec<T> {
    lists
        .and_then(|outer| outer.into_iter().next())
        .unwrap_or_default()
}

#[async_trait]
impl VectorIndexClient for ChromaClient {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        let request = self.client.post(self.collections_url()).json(&CreateCollectionRequest {
            name,
            get_or_create: true,
        });
        let collection: CollectionModel = self.send_json(request).await?;
        debug!(name = %collection.name, id = %collection.id, "Resolved Chroma collection");
        Ok(CollectionHandle {
            name: collection.name,
            id: collection.id,
        })
    }

    async fn upsert(&self, collection: &CollectionHandle, batch: UpsertBatch) -> Result<()> {
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .post(self.collection_url(collection, "upsert"))
            .json(&UpsertRequest {
                ids: &batch.ids,
                embeddings: &batch.embeddings,
                documents: &batch.documents,
                metadatas: &batch.metadatas,
            });
        self.send(request).await?;
        debug!(collection = %collection.name, rows = batch.len(), "Upserted rows into Chroma");
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let request = self
            .client
            .post(self.collection_url(collection, "query"))
            .json(&QueryRequest {
                query_embeddings: [embedding],
                n_results: top_k,
                include: ["documents", "metadatas", "distances"],
            });
        let response: QueryResponse = self.send_json(request).await?;
        Ok(response.into_matches(top_k))
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let request = self.client.get(self.collection_url(collection, "count"));
        self.send_json(request).await
    }
}
