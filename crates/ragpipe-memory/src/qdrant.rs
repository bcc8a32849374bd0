use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, value::Kind,
};
use uuid::Uuid;

use crate::error::VectorStoreError;
use crate::vector_store::{
    BoxFuture, ChunkRecord, DocumentSummary, ScoredChunk, VectorBackend,
};

const DEFAULT_COLLECTION: &str = "ragpipe_chunks";

/// Qdrant-backed chunk storage with a cosine-distance collection.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
}

impl std::fmt::Debug for QdrantBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantBackend")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

/// Deterministic point id for a chunk key. Re-ingesting the same
/// `(document_id, chunk_index)` overwrites instead of duplicating.
fn point_id_for(document_id: &str, chunk_index: usize) -> String {
    let name = format!("{document_id}:{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

impl QdrantBackend {
    /// Connect to Qdrant and ensure the chunk collection exists with the
    /// given vector dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the collection
    /// cannot be created.
    pub async fn connect(url: &str, vector_size: u64) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        let backend = Self {
            client,
            collection: DEFAULT_COLLECTION.to_owned(),
        };
        backend.ensure_collection(vector_size).await?;
        Ok(backend)
    }

    async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        Ok(())
    }

    fn record_to_point(record: ChunkRecord) -> Result<PointStruct, VectorStoreError> {
        let chunk_index = i64::try_from(record.chunk_index)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        let total_chunks = i64::try_from(record.total_chunks)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;

        let payload = serde_json::json!({
            "document_id": record.document_id,
            "chunk_index": chunk_index,
            "content": record.content,
            "filename": record.source_filename,
            "total_chunks": total_chunks,
            "metadata": record.metadata.to_string(),
        });
        let payload: HashMap<String, qdrant_client::qdrant::Value> =
            serde_json::from_value(payload)
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;

        Ok(PointStruct::new(
            point_id_for(&record.document_id, record.chunk_index),
            record.embedding,
            payload,
        ))
    }
}

fn payload_str(
    payload: &HashMap<String, qdrant_client::qdrant::Value>,
    field: &str,
) -> Option<String> {
    match &payload.get(field)?.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn payload_int(
    payload: &HashMap<String, qdrant_client::qdrant::Value>,
    field: &str,
) -> Option<i64> {
    match &payload.get(field)?.kind {
        Some(Kind::IntegerValue(i)) => Some(*i),
        _ => None,
    }
}

impl VectorBackend for QdrantBackend {
    fn upsert(&self, records: Vec<ChunkRecord>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let points: Vec<PointStruct> = records
                .into_iter()
                .map(Self::record_to_point)
                .collect::<Result<_, _>>()?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            Ok(())
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredChunk>, VectorStoreError>> {
        Box::pin(async move {
            let limit = u64::try_from(limit).unwrap_or(u64::MAX);
            let results = self
                .client
                .search_points(
                    SearchPointsBuilder::new(&self.collection, vector, limit).with_payload(true),
                )
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            // Qdrant reports cosine similarity directly for cosine collections.
            let chunks = results
                .result
                .into_iter()
                .filter_map(|point| {
                    let payload = &point.payload;
                    Some(ScoredChunk {
                        document_id: payload_str(payload, "document_id")?,
                        chunk_index: usize::try_from(payload_int(payload, "chunk_index")?)
                            .ok()?,
                        content: payload_str(payload, "content")?,
                        source_filename: payload_str(payload, "filename")?,
                        score: point.score,
                    })
                })
                .collect();
            Ok(chunks)
        })
    }

    fn delete_document(
        &self,
        document_id: &str,
    ) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let document_id = document_id.to_owned();
        Box::pin(async move {
            let filter = Filter::must([Condition::matches("document_id", document_id.clone())]);

            let count = self
                .client
                .count(
                    CountPointsBuilder::new(&self.collection)
                        .filter(filter.clone())
                        .exact(true),
                )
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?
                .result
                .map_or(0, |r| r.count);

            if count == 0 {
                return Ok(false);
            }

            self.client
                .delete_points(DeletePointsBuilder::new(&self.collection).points(filter))
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            tracing::info!(document_id, count, "deleted document chunks");
            Ok(true)
        })
    }

    fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentSummary>, VectorStoreError>> {
        Box::pin(async move {
            let mut by_doc: HashMap<String, DocumentSummary> = HashMap::new();
            let mut offset: Option<PointId> = None;

            loop {
                let mut builder = ScrollPointsBuilder::new(&self.collection)
                    .with_payload(true)
                    .with_vectors(false)
                    .limit(100);
                if let Some(ref off) = offset {
                    builder = builder.offset(off.clone());
                }

                let response = self
                    .client
                    .scroll(builder)
                    .await
                    .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;

                for point in &response.result {
                    let Some(doc_id) = payload_str(&point.payload, "document_id") else {
                        continue;
                    };
                    let filename = payload_str(&point.payload, "filename").unwrap_or_default();
                    by_doc
                        .entry(doc_id.clone())
                        .or_insert_with(|| DocumentSummary {
                            document_id: doc_id,
                            filename,
                            chunks: 0,
                        })
                        .chunks += 1;
                }

                match response.next_page_offset {
                    Some(next) => offset = Some(next),
                    None => break,
                }
            }

            let mut docs: Vec<DocumentSummary> = by_doc.into_values().collect();
            docs.sort_by(|a, b| a.document_id.cmp(&b.document_id));
            Ok(docs)
        })
    }

    fn healthy(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.client.health_check().await.is_ok() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic() {
        assert_eq!(point_id_for("doc-1", 3), point_id_for("doc-1", 3));
        assert_ne!(point_id_for("doc-1", 3), point_id_for("doc-1", 4));
        assert_ne!(point_id_for("doc-1", 3), point_id_for("doc-2", 3));
    }

    #[test]
    fn point_id_is_a_uuid() {
        let id = point_id_for("doc-1", 0);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn record_to_point_carries_payload() {
        let record = ChunkRecord {
            document_id: "doc-1".to_owned(),
            chunk_index: 2,
            content: "some text".to_owned(),
            source_filename: "a.txt".to_owned(),
            total_chunks: 5,
            embedding: vec![0.1, 0.2],
            metadata: serde_json::json!({"filename": "a.txt"}),
        };
        let point = QdrantBackend::record_to_point(record).unwrap();
        assert_eq!(
            payload_str(&point.payload, "document_id").as_deref(),
            Some("doc-1")
        );
        assert_eq!(payload_int(&point.payload, "chunk_index"), Some(2));
        assert_eq!(payload_int(&point.payload, "total_chunks"), Some(5));
    }
}
