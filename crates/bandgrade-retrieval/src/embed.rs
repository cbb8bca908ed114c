//! OpenAI embeddings client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bandgrade_core::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Produces embedding vectors for rubric text.
///
/// A trait so the store can be tested without a live embeddings API.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Client for the OpenAI `/v1/embeddings` endpoint.
pub struct EmbeddingClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl EmbeddingClient {
    pub fn new(api_key: &str, base_url: Option<String>, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.to_string(),
            client,
        }
    }

    async fn classify_error(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return ProviderError::RateLimited {
                retry_after_ms: retry_after,
            };
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            401 => ProviderError::AuthenticationFailed(body),
            404 => ProviderError::ModelNotFound(body),
            _ => ProviderError::ApiError {
                status,
                message: body,
            },
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for EmbeddingClient {
    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response).await.into());
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status: 0,
                message: format!("failed to parse embeddings response: {e}"),
            })?;

        // The API may return items out of order; index them back.
        let mut vectors = vec![Vec::new(); texts.len()];
        for item in parsed.data {
            if item.index < vectors.len() {
                vectors[item.index] = item.embedding;
            }
        }
        Ok(vectors)
    }
}
