//! Document ingestion: size/format validation, chunking, indexing.

mod error;
mod pipeline;
mod splitter;

pub use error::DocumentError;
pub use pipeline::{IngestReport, IngestionPipeline};
pub use splitter::{SplitterConfig, TextSplitter};
