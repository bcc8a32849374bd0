//! In-process test doubles for the completion and embedding traits.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::{BoxFuture, Completion, CompletionRequest, EmbeddingClient, LlmClient};
use crate::error::{EmbeddingError, GenerationError};

/// Scripted completion client. Pops queued responses in order, then falls
/// back to echoing the prompt.
#[derive(Debug, Default)]
pub struct MockLlm {
    responses: Mutex<VecDeque<String>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockLlm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A client whose every call fails with `GenerationError::Other`.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlm {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<Completion, GenerationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front());
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                return Err(GenerationError::Other("mock failure".into()));
            }
            let text = scripted.unwrap_or_else(|| format!("echo: {}", request.prompt));
            Ok(Completion {
                token_count: Some(u32::try_from(text.len()).unwrap_or(u32::MAX)),
                text,
            })
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Deterministic embedder: vectors derive from the input bytes, so equal
/// texts embed identically and different texts (almost always) differ.
#[derive(Debug)]
pub struct MockEmbedder {
    dimension: usize,
    fail: bool,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
        }
    }

    #[must_use]
    pub fn failing(dimension: usize) -> Self {
        Self {
            dimension,
            fail: true,
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut seed = 0x9e37_79b9_u32;
        for byte in text.bytes() {
            seed = seed.wrapping_mul(31).wrapping_add(u32::from(byte));
        }
        (0..self.dimension)
            .map(|i| {
                let x = seed.wrapping_add(i as u32).wrapping_mul(0x85eb_ca6b);
                // Map to [-1, 1) so cosine similarity behaves like a real embedding.
                (f64::from(x) / f64::from(u32::MAX)).mul_add(2.0, -1.0) as f32
            })
            .collect()
    }
}

impl EmbeddingClient for MockEmbedder {
    fn embed(&self, text: &str) -> BoxFuture<'_, Result<Vec<f32>, EmbeddingError>> {
        let result = if self.fail {
            Err(EmbeddingError::Other("mock embedder failure".into()))
        } else {
            Ok(self.vector_for(text))
        };
        Box::pin(async move { result })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
