use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::{EmbeddingError, GenerationError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One completion call: a fully assembled prompt plus sampling parameters.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    /// Total tokens consumed, when the provider reports usage.
    pub token_count: Option<u32>,
}

/// Completion backend. Dyn-safe so the engine can hold `Arc<dyn LlmClient>`.
pub trait LlmClient: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<Completion, GenerationError>>;

    fn name(&self) -> &'static str;
}

/// Embedding backend producing fixed-dimension vectors.
///
/// `dimension()` is a process-wide constant; every vector returned by
/// `embed` has exactly that length.
pub trait EmbeddingClient: Send + Sync {
    fn embed(&self, text: &str) -> BoxFuture<'_, Result<Vec<f32>, EmbeddingError>>;

    fn dimension(&self) -> usize;
}
