//! Mock backends for testing without real API calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use bandgrade_core::model::TokenUsage;
use bandgrade_core::traits::{
    AudioClip, ChatModel, ChatRequest, ChatResponse, Transcriber, Transcript,
};

/// A complete writing verdict used as the default mock reply.
pub const DEFAULT_WRITING_VERDICT: &str = r#"{
    "TR": 6.5, "CC": 6.0, "LR": 7.0, "GRA": 6.0,
    "notes": {
        "TR": "Addresses all parts of the task with relevant ideas.",
        "CC": "Generally well organised with clear progression.",
        "LR": "Wide range of vocabulary used with some flexibility.",
        "GRA": "A mix of simple and complex structures; some errors persist."
    },
    "overall_comment": "A solid response that communicates clearly throughout.",
    "improvement_plan": ["Vary sentence openings", "Check article usage", "Extend the conclusion"]
}"#;

/// A complete speaking verdict for speaking-path tests.
pub const DEFAULT_SPEAKING_VERDICT: &str = r#"{
    "FC": 7.0, "LR": 6.5, "GRA": 6.0, "PR": 7.0,
    "notes": {
        "FC": "Speaks at length with only occasional hesitation.",
        "LR": "Good range of vocabulary with some less common items.",
        "GRA": "Mostly accurate with occasional errors in complex forms.",
        "PR": "Generally clear with effective intonation."
    },
    "overall_comment": "A confident performance with natural delivery.",
    "improvement_plan": ["Reduce fillers", "Extend answers", "Practise linking sounds"]
}"#;

/// A mock examiner model.
///
/// Returns configurable replies based on user-prompt substring matching.
pub struct MockModel {
    /// Map of prompt substring to reply.
    responses: HashMap<String, String>,
    /// Default reply if no prompt matches.
    default_response: String,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<ChatRequest>>,
}

impl MockModel {
    /// Create a mock with the given prompt-to-reply mappings.
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            default_response: DEFAULT_WRITING_VERDICT.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same reply.
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            responses: HashMap::new(),
            default_response: response.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[async_trait]
impl ChatModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let content = self
            .responses
            .iter()
            .find(|(key, _)| request.user.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone());

        let completion_tokens = (content.len() / 4) as u32; // Rough estimate
        let prompt_tokens = ((request.system.len() + request.user.len()) / 4) as u32;

        Ok(ChatResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
                estimated_cost_usd: 0.0,
            },
            latency_ms: 1,
        })
    }
}

/// A mock transcriber returning a fixed transcript.
pub struct MockTranscriber {
    transcript: String,
}

impl MockTranscriber {
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
        }
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new(
            "Well, last year I travelled to the mountains with my family and \
             it was a really memorable experience because the weather was \
             perfect and we spent most of the time hiking.",
        )
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _clip: &AudioClip) -> anyhow::Result<Transcript> {
        Ok(Transcript {
            text: self.transcript.clone(),
            latency_ms: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user: &str) -> ChatRequest {
        ChatRequest {
            model: "mock".into(),
            system: "examiner".into(),
            user: user.into(),
            images: vec![],
            temperature: 0.0,
            max_tokens: 512,
            json_response: true,
        }
    }

    #[tokio::test]
    async fn fixed_response() {
        let model = MockModel::with_fixed_response(r#"{"TR": 5.0}"#);
        let response = model.complete(&request("anything")).await.unwrap();
        assert_eq!(response.content, r#"{"TR": 5.0}"#);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn prompt_matching() {
        let mut responses = HashMap::new();
        responses.insert("environment".to_string(), r#"{"TR": 8.0}"#.to_string());
        responses.insert("technology".to_string(), r#"{"TR": 4.0}"#.to_string());
        let model = MockModel::new(responses);

        let resp = model
            .complete(&request("essay about the environment"))
            .await
            .unwrap();
        assert!(resp.content.contains("8.0"));

        let resp = model
            .complete(&request("essay about technology"))
            .await
            .unwrap();
        assert!(resp.content.contains("4.0"));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn default_verdict_is_well_formed() {
        use bandgrade_core::model::Modality;
        use bandgrade_core::verdict::parse_verdict;

        let model = MockModel::default();
        let response = model.complete(&request("grade this")).await.unwrap();
        assert!(parse_verdict(&response.content, Modality::Writing).is_parsed());
        assert!(
            parse_verdict(DEFAULT_SPEAKING_VERDICT, Modality::Speaking).is_parsed()
        );
    }

    #[tokio::test]
    async fn records_last_request() {
        let model = MockModel::default();
        model.complete(&request("remember me")).await.unwrap();
        let last = model.last_request().unwrap();
        assert!(last.user.contains("remember me"));
    }
}
