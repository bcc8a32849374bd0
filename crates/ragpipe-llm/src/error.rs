/// Failure of the completion endpoint. Fatal for the request that issued it;
/// retry policy lives inside the client, never in callers.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("completion timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

/// Failure of the embedding endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("empty embedding from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

impl From<crate::retry::RetryError> for GenerationError {
    fn from(err: crate::retry::RetryError) -> Self {
        match err {
            crate::retry::RetryError::RateLimited => Self::RateLimited,
            crate::retry::RetryError::Http(e) => Self::Http(e),
        }
    }
}

impl From<crate::retry::RetryError> for EmbeddingError {
    fn from(err: crate::retry::RetryError) -> Self {
        match err {
            crate::retry::RetryError::RateLimited => Self::RateLimited,
            crate::retry::RetryError::Http(e) => Self::Http(e),
        }
    }
}
