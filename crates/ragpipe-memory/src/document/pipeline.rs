use serde::Serialize;
use uuid::Uuid;

use super::error::DocumentError;
use super::splitter::TextSplitter;
use crate::index::{DocumentIndex, PendingChunk};

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub filename: String,
    pub chunks_created: usize,
    pub status: &'static str,
}

/// Validates, chunks, and indexes uploaded documents.
pub struct IngestionPipeline {
    splitter: TextSplitter,
    index: DocumentIndex,
    max_file_bytes: usize,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("max_file_bytes", &self.max_file_bytes)
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(splitter: TextSplitter, index: DocumentIndex, max_file_bytes: usize) -> Self {
        Self {
            splitter,
            index,
            max_file_bytes,
        }
    }

    /// Ingest extracted text under a fresh document id.
    ///
    /// # Errors
    ///
    /// `FileTooLarge` when the text exceeds the size limit, `Empty` when
    /// it is blank after trimming, or the failing indexing stage.
    pub async fn ingest(&self, filename: &str, text: &str) -> Result<IngestReport, DocumentError> {
        if text.len() > self.max_file_bytes {
            return Err(DocumentError::FileTooLarge {
                limit_bytes: self.max_file_bytes,
            });
        }
        if text.trim().is_empty() {
            return Err(DocumentError::Empty);
        }

        let document_id = Uuid::new_v4().to_string();
        let pieces = self.splitter.split(text);
        let total_chunks = pieces.len();

        let chunks: Vec<PendingChunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| PendingChunk {
                metadata: serde_json::json!({
                    "filename": filename,
                    "document_id": document_id,
                    "chunk_index": chunk_index,
                    "total_chunks": total_chunks,
                }),
                content,
                chunk_index,
                source_filename: filename.to_owned(),
                total_chunks,
            })
            .collect();

        let chunks_created = self.index.upsert_chunks(&document_id, chunks).await?;
        tracing::info!(filename, document_id, chunks_created, "ingested document");

        Ok(IngestReport {
            document_id,
            filename: filename.to_owned(),
            chunks_created,
            status: "success",
        })
    }

    /// Ingest raw file bytes, dispatching on the filename extension.
    ///
    /// Plain-text formats only: `.txt` and `.md` are decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for other extensions, `Extraction` for invalid
    /// UTF-8, plus everything [`Self::ingest`] returns.
    pub async fn ingest_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, DocumentError> {
        if bytes.len() > self.max_file_bytes {
            return Err(DocumentError::FileTooLarge {
                limit_bytes: self.max_file_bytes,
            });
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let text = match extension.as_str() {
            "txt" | "md" => std::str::from_utf8(bytes)
                .map_err(|e| DocumentError::Extraction(e.to_string()))?,
            other => return Err(DocumentError::UnsupportedFormat(format!(".{other}"))),
        };

        self.ingest(filename, text).await
    }
}
