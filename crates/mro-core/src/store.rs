//! Vector store seam plus an in-memory implementation.
//! The hosted index lives in [`crate::pinecone`]; [`MemoryStore`] keeps records
//! for the life of the process only.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::chunks::Chunk;
use crate::error::ServiceError;

/// Metadata stored next to each vector. The chunk text is duplicated verbatim so
/// retrieval needs no second lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u32")]
    pub page: Option<u32>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u32")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure_image: Option<String>,
    #[serde(default)]
    pub low_text: bool,
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            source: chunk.source.to_string_lossy().into_owned(),
            page: chunk.page,
            text: chunk.text.clone(),
            chunk_index: u32::try_from(chunk.index).ok(),
            figure_reference: chunk.figure_reference.clone(),
            figure_image: chunk
                .figure_image
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            low_text: chunk.low_text,
        }
    }
}

/// Pinecone hands numeric metadata back as floats (`2.0`).
fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v: Option<f64> = Option::deserialize(d)?;
    Ok(v.filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32))
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// One query hit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Match {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub dimension: Option<usize>,
    pub total_vector_count: u64,
    /// Vector count per namespace.
    pub namespaces: BTreeMap<String, u64>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records (by id) in `namespace`.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), ServiceError>;

    /// Up to `top_k` records most similar to `vector`, in store order.
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<Match>, ServiceError>;

    async fn describe_stats(&self) -> Result<IndexStats, ServiceError>;
}

/// A record with its embedding, stored for similarity search.
#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    metadata: ChunkMetadata,
    /// Normalized embedding vector (unit length for cosine similarity via dot product).
    embedding: Vec<f32>,
}

/// In-memory, namespaced vector store. Linear cosine scan; no persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .all(Vec::is_empty)
    }

    fn search(&self, namespace: &str, query_embedding: &[f32], k: usize) -> Vec<Match> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let Some(items) = namespaces.get(namespace) else {
            return Vec::new();
        };
        if items.is_empty() || query_embedding.is_empty() {
            return Vec::new();
        }
        let q_norm = normalize(query_embedding);
        let mut scored: Vec<Match> = items
            .iter()
            .map(|r| Match {
                id: r.id.clone(),
                score: dot(&q_norm, &r.embedding),
                metadata: r.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), ServiceError> {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let items = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            let stored = StoredRecord {
                embedding: normalize(&record.values),
                id: record.id,
                metadata: record.metadata,
            };
            match items.iter_mut().find(|r| r.id == stored.id) {
                Some(existing) => *existing = stored,
                None => items.push(stored),
            }
        }
        Ok(())
    }

    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<Match>, ServiceError> {
        Ok(self.search(namespace, vector, top_k))
    }

    async fn describe_stats(&self) -> Result<IndexStats, ServiceError> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let counts: BTreeMap<String, u64> = namespaces
            .iter()
            .map(|(ns, items)| (ns.clone(), items.len() as u64))
            .collect();
        Ok(IndexStats {
            dimension: namespaces
                .values()
                .flat_map(|items| items.first())
                .map(|r| r.embedding.len())
                .next(),
            total_vector_count: counts.values().sum(),
            namespaces: counts,
        })
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
