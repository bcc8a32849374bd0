use serde::{Deserialize, Serialize};

use crate::client::{BoxFuture, EmbeddingClient};
use crate::error::EmbeddingError;
use crate::retry::send_with_retry;

const MAX_RETRIES: u32 = 3;

/// Embedding client speaking the sidecar protocol: `POST {base}/embed`
/// with `{"text": ...}`, answered by `{"embedding": [...]}`.
#[derive(Debug)]
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    #[must_use]
    pub fn new(mut base_url: String, dimension: usize) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            base_url,
            dimension,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = EmbedRequest { text };

        let response = send_with_retry("embedder", MAX_RETRIES, || {
            self.client
                .post(format!("{}/embed", self.base_url))
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("embedding API error {status}");
            return Err(EmbeddingError::Other(format!(
                "embedding request failed (status {status})"
            )));
        }

        let resp: EmbedResponse = response.json().await.map_err(EmbeddingError::Http)?;

        if resp.embedding.is_empty() {
            return Err(EmbeddingError::EmptyResponse {
                provider: "embedder",
            });
        }
        if resp.embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: resp.embedding.len(),
            });
        }

        Ok(resp.embedding)
    }
}

impl EmbeddingClient for HttpEmbeddingClient {
    fn embed(&self, text: &str) -> BoxFuture<'_, Result<Vec<f32>, EmbeddingError>> {
        let text = text.to_owned();
        Box::pin(async move { self.request_embedding(&text).await })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embeds_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .and(body_json(json!({"text": "hello"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2, 0.3]})),
            )
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(server.uri(), 3);
        let vector = client.embed("hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2]})),
            )
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(server.uri(), 384);
        let result = client.embed("hello").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 384,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn empty_vector_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": []})))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(server.uri(), 3);
        let result = client.embed("hello").await;
        assert!(matches!(result, Err(EmbeddingError::EmptyResponse { .. })));
    }

    #[tokio::test]
    async fn server_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(server.uri(), 3);
        let err = client.embed("hello").await.unwrap_err();
        assert!(err.to_string().contains("status 503"));
    }

    #[test]
    fn reports_configured_dimension() {
        let client = HttpEmbeddingClient::new("http://x".into(), 384);
        assert_eq!(client.dimension(), 384);
    }
}
