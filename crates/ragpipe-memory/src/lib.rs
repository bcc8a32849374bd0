//! Vector-indexed document storage, TTL session memory, and document
//! ingestion.

pub mod document;
pub mod error;
pub mod in_memory;
pub mod index;
pub mod qdrant;
pub mod session;
pub mod vector_store;

pub use document::{DocumentError, IngestReport, IngestionPipeline, SplitterConfig, TextSplitter};
pub use error::{IndexError, MemoryError, VectorStoreError};
pub use in_memory::InMemoryBackend;
pub use index::{DocumentIndex, PendingChunk};
pub use qdrant::QdrantBackend;
pub use session::{Exchange, MemoryConfig, SessionMemory, SummaryEntry, Turn, TurnRole};
pub use vector_store::{ChunkRecord, DocumentSummary, ScoredChunk, VectorBackend};
