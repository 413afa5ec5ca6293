//! In-process vector index with exact cosine search.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use policy_core::{
    ChunkMetadata, CollectionHandle, Embedding, Error, QueryMatch, Result, UpsertBatch,
    VectorIndexClient,
};
use tokio::sync::RwLock;
use tracing::debug;

/// Stored row.
#[derive(Debug, Clone)]
struct Row {
    embedding: Embedding,
    document: String,
    metadata: ChunkMetadata,
}

/// Rows of one collection keyed by id.
#[derive(Debug, Default)]
struct Collection {
    id: String,
    /// Fixed by the first upserted vector.
    dimension: Option<usize>,
    rows: BTreeMap<String, Row>,
}

/// Vector index held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance (`1 - cosine similarity`); zero vectors are maximally distant.
pub fn cosine_distance(first: &[f32], second: &[f32]) -> f32 {
    if first.len() != second.len() {
        return 1.0;
    }

    let dot_product: f32 = first.iter().zip(second).map(|(left, right)| left * right).sum();
    let magnitude_a = first.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = second.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 1.0;
    }

    1.0 - dot_product / (magnitude_a * magnitude_b)
}

fn check_dimension(collection: &Collection, actual: usize) -> Result<()> {
    match collection.dimension {
        Some(expected) if expected != actual => Err(Error::DimensionMismatch { expected, actual }),
        _ => Ok(()),
    }
}

#[async_trait]
impl VectorIndexClient for MemoryIndex {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_owned())
            .or_insert_with(|| Collection {
                id: format!("memory-{name}"),
                ..Collection::default()
            });
        Ok(CollectionHandle {
            name: name.to_owned(),
            id: collection.id.clone(),
        })
    }

    async fn upsert(&self, collection: &CollectionHandle, batch: UpsertBatch) -> Result<()> {
        batch.validate()?;
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(&collection.name)
            .ok_or_else(|| Error::VectorStore(format!("collection {} not found", collection.name)))?;

        // Validate the whole batch before touching any row.
        let mut dimension = stored.dimension;
        for embedding in &batch.embeddings {
            match dimension {
                Some(expected) if expected != embedding.len() => {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(embedding.len()),
            }
        }
        stored.dimension = dimension;

        let rows = batch.len();
        for (((id, embedding), document), metadata) in batch
            .ids
            .into_iter()
            .zip(batch.embeddings)
            .zip(batch.documents)
            .zip(batch.metadatas)
        {
            stored.rows.insert(
                id,
                Row {
                    embedding,
                    document,
                    metadata,
                },
            );
        }
        debug!(collection = %collection.name, rows, "Upserted rows into memory index");
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let collections = self.collections.read().await;
        let Some(stored) = collections.get(&collection.name) else {
            return Err(Error::VectorStore(format!(
                "collection {} not found",
                collection.name
            )));
        };
        check_dimension(stored, embedding.len())?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut matches: Vec<QueryMatch> = stored
            .rows
            .iter()
            .map(|(id, row)| QueryMatch {
                id: id.clone(),
                document: row.document.clone(),
                metadata: row.metadata.clone(),
                distance: cosine_distance(embedding, &row.embedding),
            })
            .collect();
        matches.sort_by(|first, second| {
            first
                .distance
                .partial_cmp(&second.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| first.id.cmp(&second.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(&collection.name)
            .map(|stored| stored.rows.len())
            .ok_or_else(|| Error::VectorStore(format!("collection {} not found", collection.name)))
    }
}
