use std::sync::Arc;

use ragpipe_llm::EmbeddingClient;

use crate::error::IndexError;
use crate::vector_store::{ChunkRecord, DocumentSummary, ScoredChunk, VectorBackend};

/// Pending chunk of a document, produced by the splitter and not yet
/// embedded.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub content: String,
    pub chunk_index: usize,
    pub source_filename: String,
    pub total_chunks: usize,
    pub metadata: serde_json::Value,
}

/// Embeds text and stores it through the configured backend.
#[derive(Clone)]
pub struct DocumentIndex {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex").finish_non_exhaustive()
    }
}

impl DocumentIndex {
    #[must_use]
    pub fn new(backend: Arc<dyn VectorBackend>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { backend, embedder }
    }

    /// Embed and store chunks one at a time, returning the count written.
    ///
    /// Writes are at-least-once: a failure part way through leaves the
    /// chunks already written in place. Chunk point identity is derived
    /// from `(document_id, chunk_index)`, so retrying the same document
    /// overwrites rather than duplicates.
    ///
    /// # Errors
    ///
    /// Returns the failing stage: `Embedding` when the embedder rejects a
    /// chunk, `Storage` when the backend write fails.
    pub async fn upsert_chunks(
        &self,
        document_id: &str,
        chunks: Vec<PendingChunk>,
    ) -> Result<usize, IndexError> {
        let mut written = 0;
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.content).await?;
            let record = ChunkRecord {
                document_id: document_id.to_owned(),
                chunk_index: chunk.chunk_index,
                content: chunk.content,
                source_filename: chunk.source_filename,
                total_chunks: chunk.total_chunks,
                embedding,
                metadata: chunk.metadata,
            };
            self.backend.upsert(vec![record]).await?;
            written += 1;
        }
        tracing::info!(document_id, written, "indexed document chunks");
        Ok(written)
    }

    /// Embed the query and return the top matches at or above the
    /// similarity threshold, best first.
    ///
    /// # Errors
    ///
    /// Returns the failing stage; callers decide whether retrieval failure
    /// aborts their operation or degrades to an empty context.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let vector = self.embedder.embed(query).await?;
        let results = self.backend.search(vector, k).await?;
        let matches: Vec<ScoredChunk> = results
            .into_iter()
            .filter(|c| c.score >= score_threshold)
            .collect();
        tracing::debug!(k, found = matches.len(), "similarity search");
        Ok(matches)
    }

    /// Remove every chunk of a document. Idempotent; `false` means nothing
    /// matched.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the backend delete fails.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool, IndexError> {
        Ok(self.backend.delete_document(document_id).await?)
    }

    /// # Errors
    ///
    /// Returns `Storage` when the backend scroll fails.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, IndexError> {
        Ok(self.backend.list_documents().await?)
    }

    pub async fn healthy(&self) -> bool {
        self.backend.healthy().await
    }
}
