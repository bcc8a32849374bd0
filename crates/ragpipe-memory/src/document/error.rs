use ragpipe_llm::EmbeddingError;

use crate::error::{IndexError, VectorStoreError};

/// Ingestion failure, tagged with the stage that failed. There is no
/// silent partial success: a mid-document failure surfaces here even
/// though earlier chunks stay indexed.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("file exceeds maximum size of {limit_bytes} bytes")]
    FileTooLarge { limit_bytes: usize },

    #[error("no text could be extracted from the document")]
    Empty,

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector storage failed: {0}")]
    Storage(#[from] VectorStoreError),
}

impl From<IndexError> for DocumentError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Embedding(e) => Self::Embedding(e),
            IndexError::Storage(e) => Self::Storage(e),
        }
    }
}
