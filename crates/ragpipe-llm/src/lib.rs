//! Completion and embedding client boundary: dyn-safe traits plus the
//! HTTP-backed implementations used in production.

pub mod client;
pub mod embedding;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
mod retry;

pub use client::{Completion, CompletionRequest, EmbeddingClient, LlmClient};
pub use embedding::HttpEmbeddingClient;
pub use error::{EmbeddingError, GenerationError};
pub use openai::OpenAiClient;
