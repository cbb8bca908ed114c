//! OpenAI-compatible API client: chat completions (with vision content
//! parts) and audio transcription.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bandgrade_core::error::ProviderError;
use bandgrade_core::model::TokenUsage;
use bandgrade_core::traits::{
    AudioClip, ChatModel, ChatRequest, ChatResponse, Transcriber, Transcript,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// gpt-4o-mini pricing: $0.15/$0.60 per 1M tokens.
const COST_PER_PROMPT_TOKEN: f64 = 0.15 / 1_000_000.0;
const COST_PER_COMPLETION_TOKEN: f64 = 0.60 / 1_000_000.0;

/// Client for an OpenAI-compatible API.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    transcribe_model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: Option<String>, transcribe_model: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            transcribe_model: transcribe_model.unwrap_or_else(|| "whisper-1".to_string()),
            client,
        }
    }

    /// Map non-2xx statuses to the shared provider error taxonomy.
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

    fn network_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
        } else {
            ProviderError::NetworkError(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: MessageContent,
}

/// Plain text for text-only turns; typed parts when images are attached.
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: ApiUsage,
    model: String,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let start = Instant::now();

        let user_content = if request.images.is_empty() {
            MessageContent::Text(request.user.clone())
        } else {
            let mut parts = vec![ContentPart::Text {
                text: request.user.clone(),
            }];
            for image in &request.images {
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_uri.clone(),
                    },
                });
            }
            MessageContent::Parts(parts)
        };

        let body = ApiRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: MessageContent::Text(request.system.clone()),
                },
                ApiMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            response_format: request.json_response.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::network_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response).await.into());
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status: 0,
                message: format!("failed to parse response: {e}"),
            })?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let content = api_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        let estimated_cost = api_response.usage.prompt_tokens as f64 * COST_PER_PROMPT_TOKEN
            + api_response.usage.completion_tokens as f64 * COST_PER_COMPLETION_TOKEN;

        Ok(ChatResponse {
            content,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens: api_response.usage.prompt_tokens,
                completion_tokens: api_response.usage.completion_tokens,
                total_tokens: api_response.usage.total_tokens,
                estimated_cost_usd: estimated_cost,
            },
            latency_ms,
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    #[instrument(skip(self, clip), fields(file = %clip.file_name))]
    async fn transcribe(&self, clip: &AudioClip) -> anyhow::Result<Transcript> {
        let start = Instant::now();

        let part = reqwest::multipart::Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("model", self.transcribe_model.clone())
            .text("language", "en")
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(Self::network_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_error(response).await.into());
        }

        let parsed: TranscriptionResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status: 0,
                message: format!("failed to parse transcription: {e}"),
            })?;

        Ok(Transcript {
            text: parsed.text,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
