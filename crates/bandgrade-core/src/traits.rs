//! Service traits for the external collaborators: the chat model, the
//! audio transcriber, and the rubric store.
//!
//! Implementations live in `bandgrade-providers` and `bandgrade-retrieval`;
//! the engine only sees these traits so tests can substitute mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{TaskType, TokenUsage};

/// A hosted chat-completion model used as the examiner.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Human-readable backend name (e.g. "openai").
    fn name(&self) -> &str;

    /// Send one chat request and return the reply.
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse>;
}

/// One grading request to the chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier (e.g. "gpt-4o-mini").
    pub model: String,
    /// System prompt: examiner role and output contract.
    pub system: String,
    /// User prompt: task, submission, and rubric excerpts.
    pub user: String,
    /// Chart or diagram images for Academic Task 1.
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Ask the API to force a JSON object response.
    #[serde(default)]
    pub json_response: bool,
}

/// The model's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Raw reply content.
    pub content: String,
    /// Model that actually produced the reply.
    pub model: String,
    /// Token accounting.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// An image already encoded for transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// `data:image/...;base64,...` URI.
    pub data_uri: String,
}

/// Speech-to-text backend for speaking submissions.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> anyhow::Result<Transcript>;
}

/// A recorded speaking response.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Original file name, used for format detection by the API.
    pub file_name: String,
    /// Raw audio bytes.
    pub bytes: Vec<u8>,
}

/// Transcription output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub latency_ms: u64,
}

/// Retrieval backend serving rubric excerpts for the grading prompt.
#[async_trait]
pub trait RubricStore: Send + Sync {
    /// Fetch up to `k` rubric excerpts relevant to the task type.
    async fn retrieve(&self, task_type: TaskType, k: usize) -> anyhow::Result<Vec<RubricChunk>>;
}

/// One rubric excerpt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricChunk {
    pub text: String,
}
