use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::VectorStoreError;
use crate::vector_store::{
    BoxFuture, ChunkRecord, DocumentSummary, ScoredChunk, VectorBackend,
};

/// Brute-force in-memory backend for tests and storage-less operation.
pub struct InMemoryBackend {
    chunks: RwLock<HashMap<(String, usize), ChunkRecord>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend").finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorBackend for InMemoryBackend {
    fn upsert(&self, records: Vec<ChunkRecord>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let mut chunks = self
                .chunks
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            for record in records {
                chunks.insert((record.document_id.clone(), record.chunk_index), record);
            }
            Ok(())
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredChunk>, VectorStoreError>> {
        Box::pin(async move {
            let chunks = self
                .chunks
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let mut scored: Vec<ScoredChunk> = chunks
                .values()
                .map(|record| ScoredChunk {
                    document_id: record.document_id.clone(),
                    chunk_index: record.chunk_index,
                    content: record.content.clone(),
                    source_filename: record.source_filename.clone(),
                    score: cosine_similarity(&vector, &record.embedding),
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(limit);
            Ok(scored)
        })
    }

    fn delete_document(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let document_id = document_id.to_owned();
        Box::pin(async move {
            let mut chunks = self
                .chunks
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            let before = chunks.len();
            chunks.retain(|(doc, _), _| *doc != document_id);
            Ok(chunks.len() < before)
        })
    }

    fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentSummary>, VectorStoreError>> {
        Box::pin(async move {
            let chunks = self
                .chunks
                .read()
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;

            let mut by_doc: HashMap<&str, DocumentSummary> = HashMap::new();
            for record in chunks.values() {
                by_doc
                    .entry(&record.document_id)
                    .or_insert_with(|| DocumentSummary {
                        document_id: record.document_id.clone(),
                        filename: record.source_filename.clone(),
                        chunks: 0,
                    })
                    .chunks += 1;
            }

            let mut docs: Vec<DocumentSummary> = by_doc.into_values().collect();
            docs.sort_by(|a, b| a.document_id.cmp(&b.document_id));
            Ok(docs)
        })
    }

    fn healthy(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc: &str, idx: usize, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            document_id: doc.to_owned(),
            chunk_index: idx,
            content: format!("chunk {idx} of {doc}"),
            source_filename: format!("{doc}.txt"),
            total_chunks: 1,
            embedding: vector,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_and_search_ranks_by_similarity() {
        let store = InMemoryBackend::new();
        store
            .upsert(vec![
                record("a", 0, vec![1.0, 0.0, 0.0]),
                record("b", 0, vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(vec![1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, "a");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
        assert!(results[1].score < results[0].score);
    }

    #[tokio::test]
    async fn upsert_same_key_overwrites() {
        let store = InMemoryBackend::new();
        store
            .upsert(vec![record("a", 0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let mut replacement = record("a", 0, vec![1.0, 0.0, 0.0]);
        replacement.content = "updated".to_owned();
        store.upsert(vec![replacement]).await.unwrap();

        let results = store.search(vec![1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "updated");
    }

    #[tokio::test]
    async fn delete_document_removes_all_chunks() {
        let store = InMemoryBackend::new();
        store
            .upsert(vec![
                record("a", 0, vec![1.0, 0.0, 0.0]),
                record("a", 1, vec![0.9, 0.1, 0.0]),
                record("b", 0, vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert!(store.delete_document("a").await.unwrap());
        let results = store.search(vec![1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "b");
    }

    #[tokio::test]
    async fn delete_missing_document_is_noop() {
        let store = InMemoryBackend::new();
        assert!(!store.delete_document("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn list_documents_aggregates_chunk_counts() {
        let store = InMemoryBackend::new();
        store
            .upsert(vec![
                record("a", 0, vec![1.0, 0.0]),
                record("a", 1, vec![0.0, 1.0]),
                record("b", 0, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document_id, "a");
        assert_eq!(docs[0].chunks, 2);
        assert_eq!(docs[1].chunks, 1);
    }

    #[tokio::test]
    async fn healthy_is_always_true() {
        let store = InMemoryBackend::new();
        assert!(store.healthy().await);
    }

    #[test]
    fn cosine_similarity_zero_vector_scores_zero() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < f32::EPSILON);
    }
}
