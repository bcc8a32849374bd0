use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::VectorStoreError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One indexed chunk of a document, as persisted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub source_filename: String,
    pub total_chunks: usize,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// A retrieved chunk annotated with its cosine similarity to the query.
///
/// `score` is a similarity, never a raw distance: higher means closer,
/// identical vectors score 1.0.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub source_filename: String,
    pub score: f32,
}

/// Per-document aggregate used by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub filename: String,
    pub chunks: usize,
}

/// Storage seam for indexed chunks. Dyn-safe so the index can hold
/// `Arc<dyn VectorBackend>` and swap Qdrant for the in-memory backend.
pub trait VectorBackend: Send + Sync {
    fn upsert(&self, records: Vec<ChunkRecord>) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredChunk>, VectorStoreError>>;

    /// Remove every chunk of the given document. Idempotent; returns
    /// `false` when nothing matched.
    fn delete_document(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentSummary>, VectorStoreError>>;

    fn healthy(&self) -> BoxFuture<'_, bool>;
}
