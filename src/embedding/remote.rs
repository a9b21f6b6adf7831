use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Client for an OpenAI-compatible `/embeddings` endpoint
///
/// The API key is checked when the client is created, so a missing key fails
/// before any request is attempted. The underlying HTTP client is only built
/// on first use.
pub struct RemoteEmbeddingClient {
    api_key: String,
    model: String,
    base_url: String,
    dimensions: Option<usize>,
    timeout: Duration,
    http: OnceCell<reqwest::Client>,
}

impl RemoteEmbeddingClient {
    /// Create a client from configuration, resolving the API key
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| EmbeddingError::MissingApiKey(config.api_key_env.clone()))?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dimensions: config.dimensions,
            timeout: Duration::from_secs(config.timeout_secs),
            http: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn http(&self) -> Result<&reqwest::Client, EmbeddingError> {
        self.http
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))
            })
            .await
    }

    async fn request_embeddings(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let expected = input.len();
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input,
            dimensions: self.dimensions,
            encoding_format: "float",
        };

        tracing::debug!("Requesting {} embeddings from {}", expected, url);

        let response = self
            .http()
            .await?
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout(self.timeout.as_secs())
                } else {
                    EmbeddingError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(format!("Invalid response body: {}", e)))?;

        // Sort by index to ensure correct order
        let mut data = result.data;
        data.sort_by_key(|entry| entry.index);
        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|entry| entry.embedding).collect();

        if embeddings.len() != expected {
            return Err(EmbeddingError::RequestFailed(format!(
                "Expected {} embeddings, got {}",
                expected,
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for RemoteEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.request_embeddings(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
