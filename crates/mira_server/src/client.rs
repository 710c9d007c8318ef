//! Client for the completion service and other OpenAI-compatible servers.

use crate::wire::{DONE_SENTINEL, EventDecoder};
use futures::{Stream, StreamExt};
use mira_core::{
    CompletionRequest, CompletionResult, ErrorBody, HealthStatus, ModelList, StreamChunk,
};
use mira_error::{ServerError, ServerErrorKind};
use std::pin::Pin;
use tracing::instrument;

/// Stream of parsed chunks; ends after `[DONE]` or with an error item.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ServerError>> + Send>>;

/// Connection settings of a [`MiraClient`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientConfig {
    /// Base URL of the server (e.g., "http://localhost:8000")
    pub base_url: String,
    /// Optional bearer token
    pub api_key: Option<String>,
}

impl ClientConfig {
    /// Configuration for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - `MIRA_BASE_URL` (default: "http://localhost:8000")
    /// - `MIRA_API_KEY` (optional)
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MIRA_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let config = Self::new(base_url);
        match std::env::var("MIRA_API_KEY") {
            Ok(key) => config.with_api_key(key),
            Err(_) => config,
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// HTTP client for the completion endpoints.
#[derive(Debug, Clone)]
pub struct MiraClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl MiraClient {
    /// Create a new client
    #[instrument(skip(config), fields(base_url = %config.base_url))]
    pub fn new(config: ClientConfig) -> Self {
        tracing::debug!("Creating completion client");
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check that the server answers `/health`.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<HealthStatus, ServerError> {
        let response = self.get("/health").await?;
        parse_json(response).await
    }

    /// List the models the server advertises.
    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Result<ModelList, ServerError> {
        let response = self.get("/v1/models").await?;
        parse_json(response).await
    }

    /// Send a buffered chat completion request.
    ///
    /// `request.stream` is forced to `false`.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat_completion(
        &self,
        mut request: CompletionRequest,
    ) -> Result<CompletionResult, ServerError> {
        request.stream = false;
        let response = self.post_completion(&request).await?;
        let result = parse_json(response).await?;
        tracing::debug!("Chat completion successful");
        Ok(result)
    }

    /// Send a streaming chat completion request.
    ///
    /// `request.stream` is forced to `true`. The returned stream ends after
    /// the `[DONE]` sentinel; if the connection closes before it, the last
    /// item is a [`ServerErrorKind::Truncated`] error.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat_completion_stream(
        &self,
        mut request: CompletionRequest,
    ) -> Result<ChunkStream, ServerError> {
        request.stream = true;
        let response = self.post_completion(&request).await?;
        tracing::debug!("Streaming request accepted, parsing event stream");
        Ok(parse_event_stream(response))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ServerError> {
        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!("GET {}", url);
        let response = self.authorize(self.client.get(&url)).send().await.map_err(|e| {
            tracing::error!("Request failed: {}", e);
            ServerError::new(ServerErrorKind::Http(format!("Request failed: {}", e)))
        })?;
        check_status(response).await
    }

    async fn post_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response, ServerError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        tracing::debug!("Sending chat completion request to {}", url);

        let response = self
            .authorize(self.client.post(&url).json(request))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Request failed: {}", e);
                ServerError::new(ServerErrorKind::Http(format!("Request failed: {}", e)))
            })?;
        check_status(response).await
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(api_key) => req.header("Authorization", format!("Bearer {}", api_key)),
            None => req,
        }
    }
}

/// Turn non-success statuses into [`ServerErrorKind::Api`], carrying the
/// server's `{"error": ...}` message when there is one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
    tracing::error!(%status, %detail, "Server returned error");
    Err(ServerError::new(ServerErrorKind::Api(format!(
        "{}: {}",
        status.as_u16(),
        detail
    ))))
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServerError> {
    response.json().await.map_err(|e| {
        tracing::error!("Failed to parse response: {}", e);
        ServerError::new(ServerErrorKind::Deserialization(format!(
            "Failed to parse response: {}",
            e
        )))
    })
}

/// Parse a Server-Sent-Events body into completion chunks.
fn parse_event_stream(response: reqwest::Response) -> ChunkStream {
    let mut body = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut decoder = EventDecoder::new();

        while let Some(bytes) = body.next().await {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(ServerError::new(ServerErrorKind::Stream(format!(
                        "Stream error: {}",
                        e
                    ))));
                    return;
                }
            };

            let payloads = match decoder.push(&bytes) {
                Ok(payloads) => payloads,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for payload in payloads {
                if payload == DONE_SENTINEL {
                    tracing::debug!("Stream completed");
                    return;
                }
                match serde_json::from_str::<StreamChunk>(&payload) {
                    Ok(chunk) => yield Ok(chunk),
                    Err(e) => {
                        yield Err(ServerError::new(ServerErrorKind::Deserialization(format!(
                            "Failed to parse chunk: {}",
                            e
                        ))));
                        return;
                    }
                }
            }
        }

        tracing::warn!(partial = decoder.has_partial(), "Stream closed before [DONE]");
        yield Err(ServerError::new(ServerErrorKind::Truncated));
    })
}
