use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::{BoxFuture, Completion, CompletionRequest, LlmClient};
use crate::error::GenerationError;
use crate::retry::send_with_retry;

const MAX_RETRIES: u32 = 3;

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn send_request(&self, request: &CompletionRequest) -> Result<Completion, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = send_with_retry("openai", MAX_RETRIES, || {
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .timeout(request.timeout)
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| match e {
            crate::retry::RetryError::Http(err) if err.is_timeout() => {
                GenerationError::Timeout(request.timeout)
            }
            other => other.into(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(GenerationError::Http)?;

        if !status.is_success() {
            tracing::error!("completion API error {status}: {text}");
            return Err(GenerationError::Other(format!(
                "completion request failed (status {status})"
            )));
        }

        let resp: ChatResponse = serde_json::from_str(&text)?;
        let token_count = resp.usage.as_ref().map(|u| u.total_tokens);

        let text = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(GenerationError::EmptyResponse { provider: "openai" })?;

        Ok(Completion { text, token_count })
    }
}

impl LlmClient for OpenAiClient {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<Completion, GenerationError>> {
        Box::pin(async move { self.send_request(&request).await })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}
