//! The grading engine: drives one submission through retrieval, the model
//! call, verdict parsing, and the deterministic scoring rules.
//!
//! The engine owns retries and backoff for the model call. The scoring
//! rules themselves are pure functions in `scoring` and `consistency`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::consistency::{validate_scores, ConsistencyConfig};
use crate::error::ProviderError;
use crate::model::{
    Criterion, CriterionSet, Evaluation, Feedback, Modality, TaskType,
};
use crate::prompt;
use crate::scoring::{apply_length_penalty, normalize_score, round_to_half, word_count};
use crate::traits::{
    AudioClip, ChatModel, ChatRequest, ChatResponse, ImageAttachment, RubricChunk, RubricStore,
    Transcriber,
};
use crate::verdict::{parse_verdict, RawEvaluation, Verdict};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier sent to the chat backend.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Max tokens for the verdict.
    pub max_tokens: u32,
    /// Retries on transient provider errors.
    pub max_retries: u32,
    /// Initial delay between retries; doubles per attempt.
    pub retry_delay: Duration,
    /// Consistency adjuster thresholds.
    pub consistency: ConsistencyConfig,
    /// How many rubric excerpts to request from the store.
    pub rubric_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            consistency: ConsistencyConfig::default(),
            rubric_k: 8,
        }
    }
}

/// A writing submission to grade.
#[derive(Debug, Clone)]
pub struct WritingSubmission {
    pub task_type: TaskType,
    pub task_prompt: String,
    pub essay: String,
    /// Chart/diagram image, Academic Task 1 only.
    pub chart: Option<ImageAttachment>,
}

/// A speaking submission to grade.
#[derive(Debug, Clone)]
pub struct SpeakingSubmission {
    pub task_prompt: String,
    pub audio: AudioClip,
}

/// The grading engine.
pub struct GradingEngine {
    chat: Arc<dyn ChatModel>,
    transcriber: Option<Arc<dyn Transcriber>>,
    rubric: Option<Arc<dyn RubricStore>>,
    config: EngineConfig,
}

impl GradingEngine {
    pub fn new(chat: Arc<dyn ChatModel>, config: EngineConfig) -> Self {
        Self {
            chat,
            transcriber: None,
            rubric: None,
            config,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_rubric_store(mut self, store: Arc<dyn RubricStore>) -> Self {
        self.rubric = Some(store);
        self
    }

    /// Grade a writing submission.
    pub async fn grade_writing(&self, submission: &WritingSubmission) -> Result<Evaluation> {
        let start = Instant::now();
        anyhow::ensure!(
            submission.task_type.modality() == Modality::Writing,
            "grade_writing requires a writing task type, got {}",
            submission.task_type
        );
        if submission.chart.is_some() {
            anyhow::ensure!(
                submission.task_type == TaskType::AcademicTask1,
                "chart images are only supported for academic_task_1"
            );
        }

        let rubric = self.retrieve_rubric(submission.task_type).await;
        let used_rubric = !rubric.is_empty();

        let mut system = prompt::writing_system(submission.task_type);
        if submission.chart.is_some() {
            system.push(' ');
            system.push_str(prompt::chart_instruction());
        }
        let user = prompt::writing_user(
            submission.task_type,
            &submission.task_prompt,
            &submission.essay,
            &rubric,
        );

        let request = ChatRequest {
            model: self.config.model.clone(),
            system,
            user,
            images: submission.chart.iter().cloned().collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            json_response: true,
        };

        let response = self.complete_with_retry(&request).await?;
        let raw = self.require_parsed(&response, Modality::Writing)?;

        let mut scores = self.normalized_scores(&raw)?;

        // Length penalty applies to TR/TA only.
        if let Some(min_words) = submission.task_type.min_words() {
            if let Some(tr) = scores.get_mut(&Criterion::TaskResponse) {
                *tr = apply_length_penalty(*tr, &submission.essay, min_words);
            }
        }

        self.finish(
            submission.task_type,
            scores,
            raw,
            word_count(&submission.essay),
            used_rubric,
            None,
            response,
            start,
        )
    }

    /// Grade a speaking submission: transcribe, then evaluate.
    pub async fn grade_speaking(&self, submission: &SpeakingSubmission) -> Result<Evaluation> {
        let start = Instant::now();
        let transcriber = self
            .transcriber
            .as_ref()
            .context("no transcriber configured for speaking submissions")?;

        let transcript = transcriber
            .transcribe(&submission.audio)
            .await
            .context("transcription failed")?;
        tracing::debug!(chars = transcript.text.len(), "transcription complete");

        let rubric = self.retrieve_rubric(TaskType::Speaking).await;
        let used_rubric = !rubric.is_empty();

        let request = ChatRequest {
            model: self.config.model.clone(),
            system: prompt::speaking_system(&rubric),
            user: prompt::speaking_user(&submission.task_prompt, &transcript.text),
            images: vec![],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            json_response: true,
        };

        let response = self.complete_with_retry(&request).await?;
        let raw = self.require_parsed(&response, Modality::Speaking)?;
        let scores = self.normalized_scores(&raw)?;

        self.finish(
            TaskType::Speaking,
            scores,
            raw,
            word_count(&transcript.text),
            used_rubric,
            Some(transcript.text),
            response,
            start,
        )
    }

    /// Rubric retrieval degrades to no excerpts on any failure.
    async fn retrieve_rubric(&self, task_type: TaskType) -> Vec<RubricChunk> {
        let Some(store) = &self.rubric else {
            return Vec::new();
        };
        match store.retrieve(task_type, self.config.rubric_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("rubric retrieval failed, grading without excerpts: {e:#}");
                Vec::new()
            }
        }
    }

    /// Call the chat model with exponential backoff on transient errors.
    async fn complete_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay;

        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(Duration::from_secs(60));
            }
            match self.chat.complete(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if let Some(pe) = e.downcast_ref::<ProviderError>() {
                        if pe.is_permanent() {
                            return Err(e);
                        }
                        if let Some(ms) = pe.retry_after_ms() {
                            retry_delay = Duration::from_millis(ms);
                        }
                    }
                    tracing::warn!("model call failed (attempt {}): {e:#}", retry + 1);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("model call failed")))
    }

    /// Surface an unparsable verdict as a request failure with the field
    /// problems listed.
    fn require_parsed(&self, response: &ChatResponse, modality: Modality) -> Result<RawEvaluation> {
        match parse_verdict(&response.content, modality) {
            Verdict::Parsed(raw) => Ok(raw),
            Verdict::Unparsable { raw, errors } => {
                tracing::debug!(raw_reply = %raw, "model reply rejected");
                let reasons = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                anyhow::bail!("model did not return a valid verdict: {reasons}")
            }
        }
    }

    /// Re-round raw scores and enforce the [0, 9] range.
    fn normalized_scores(&self, raw: &RawEvaluation) -> Result<BTreeMap<Criterion, f64>> {
        let mut scores = BTreeMap::new();
        for (&criterion, &value) in &raw.scores {
            scores.insert(criterion, normalize_score(criterion, value)?);
        }
        Ok(scores)
    }

    /// Shared tail: consistency adjustment, overall band, result assembly.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        task_type: TaskType,
        scores: BTreeMap<Criterion, f64>,
        raw: RawEvaluation,
        word_count: usize,
        used_rubric: bool,
        transcript: Option<String>,
        response: ChatResponse,
        start: Instant,
    ) -> Result<Evaluation> {
        let (adjusted_scores, adjusted) = validate_scores(
            &scores,
            &raw.notes,
            &raw.overall_comment,
            &self.config.consistency,
        );

        let set = CriterionSet::new(task_type.modality(), adjusted_scores)?;
        let overall = round_to_half(set.mean());

        if adjusted {
            tracing::info!(%task_type, overall, "scores adjusted for feedback consistency");
        }

        Ok(Evaluation {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            task_type,
            overall,
            scores: set,
            feedback: Feedback {
                notes: raw.notes,
                overall_comment: raw.overall_comment,
                improvement_plan: raw.improvement_plan,
            },
            word_count,
            used_rubric,
            adjusted,
            transcript,
            model: response.model,
            token_usage: response.token_usage,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TokenUsage;
    use crate::traits::Transcript;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Chat model returning a fixed reply, optionally failing first.
    struct FixedModel {
        reply: String,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl FixedModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                failures_before_success: 0,
                calls: AtomicU32::new(0),
            }
        }

        fn failing_first(reply: &str, failures: u32) -> Self {
            Self {
                reply: reply.to_string(),
                failures_before_success: failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(ProviderError::NetworkError("connection reset".into()).into());
            }
            Ok(ChatResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 1,
            })
        }
    }

    struct FixedTranscriber;

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _clip: &AudioClip) -> Result<Transcript> {
            Ok(Transcript {
                text: "Well last year I travelled to the mountains and it was great.".into(),
                latency_ms: 1,
            })
        }
    }

    fn writing_reply(tr: f64, cc: f64, lr: f64, gra: f64) -> String {
        format!(
            r#"{{"TR": {tr}, "CC": {cc}, "LR": {lr}, "GRA": {gra},
                "notes": {{"TR": "ok", "CC": "ok", "LR": "ok", "GRA": "ok"}},
                "overall_comment": "Adequate.",
                "improvement_plan": ["Read more"]}}"#
        )
    }

    fn long_essay(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            retry_delay: Duration::from_millis(1),
            ..EngineConfig::default()
        }
    }

    fn writing_submission(essay: String) -> WritingSubmission {
        WritingSubmission {
            task_type: TaskType::Task2,
            task_prompt: "Discuss both views and give your opinion.".into(),
            essay,
            chart: None,
        }
    }

    #[tokio::test]
    async fn grades_a_complete_writing_submission() {
        let model = Arc::new(FixedModel::new(&writing_reply(6.5, 6.0, 7.0, 6.0)));
        let engine = GradingEngine::new(model, fast_config());

        let eval = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap();

        assert_eq!(eval.scores.get(Criterion::TaskResponse), Some(6.5));
        assert_eq!(eval.overall, 6.5); // mean 6.375 rounds to 6.5
        assert_eq!(eval.word_count, 260);
        assert!(!eval.adjusted);
        assert!(!eval.used_rubric);
    }

    #[tokio::test]
    async fn short_essay_caps_task_response() {
        let model = Arc::new(FixedModel::new(&writing_reply(7.0, 7.0, 7.0, 7.0)));
        let engine = GradingEngine::new(model, fast_config());

        // 180 words < 0.8 * 250
        let eval = engine
            .grade_writing(&writing_submission(long_essay(180)))
            .await
            .unwrap();

        assert_eq!(eval.scores.get(Criterion::TaskResponse), Some(5.0));
        assert_eq!(eval.scores.get(Criterion::Coherence), Some(7.0));
        assert_eq!(eval.overall, 6.5); // mean 6.5
    }

    #[tokio::test]
    async fn off_grid_scores_are_rounded() {
        let model = Arc::new(FixedModel::new(&writing_reply(6.3, 6.0, 6.0, 6.0)));
        let engine = GradingEngine::new(model, fast_config());

        let eval = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap();
        assert_eq!(eval.scores.get(Criterion::TaskResponse), Some(6.5));
    }

    #[tokio::test]
    async fn out_of_range_score_is_a_hard_failure() {
        let model = Arc::new(FixedModel::new(&writing_reply(9.6, 6.0, 6.0, 6.0)));
        let engine = GradingEngine::new(model, fast_config());

        let err = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(err.to_string().contains("TR"));
    }

    #[tokio::test]
    async fn unparsable_reply_reports_field_problems() {
        let model = Arc::new(FixedModel::new(r#"{"TR": 6.0, "CC": 6.0}"#));
        let engine = GradingEngine::new(model, fast_config());

        let err = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("LR"), "missing field not named: {msg}");
        assert!(msg.contains("GRA"));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let model = Arc::new(FixedModel::failing_first(
            &writing_reply(6.0, 6.0, 6.0, 6.0),
            2,
        ));
        let engine = GradingEngine::new(Arc::clone(&model) as Arc<dyn ChatModel>, fast_config());

        let eval = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap();
        assert_eq!(eval.overall, 6.0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        struct AuthFailModel {
            calls: AtomicU32,
        }

        #[async_trait]
        impl ChatModel for AuthFailModel {
            fn name(&self) -> &str {
                "authfail"
            }
            async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::AuthenticationFailed("bad key".into()).into())
            }
        }

        let model = Arc::new(AuthFailModel {
            calls: AtomicU32::new(0),
        });
        let engine = GradingEngine::new(Arc::clone(&model) as Arc<dyn ChatModel>, fast_config());

        let err = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authentication"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inconsistent_feedback_adjusts_scores() {
        let reply = r#"{"TR": 3.0, "CC": 6.0, "LR": 6.0, "GRA": 6.0,
            "notes": {"TR": "Excellent coverage of all parts of the task.",
                      "CC": "", "LR": "", "GRA": ""},
            "overall_comment": "",
            "improvement_plan": []}"#;
        let model = Arc::new(FixedModel::new(reply));
        let engine = GradingEngine::new(model, fast_config());

        let eval = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap();
        assert!(eval.adjusted);
        assert!(eval.scores.get(Criterion::TaskResponse).unwrap() >= 5.5);
    }

    #[tokio::test]
    async fn wrong_modality_is_rejected() {
        let model = Arc::new(FixedModel::new(&writing_reply(6.0, 6.0, 6.0, 6.0)));
        let engine = GradingEngine::new(model, fast_config());

        let err = engine
            .grade_writing(&WritingSubmission {
                task_type: TaskType::Speaking,
                task_prompt: "p".into(),
                essay: "e".into(),
                chart: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("writing task type"));
    }

    #[tokio::test]
    async fn chart_rejected_outside_academic_task_1() {
        let model = Arc::new(FixedModel::new(&writing_reply(6.0, 6.0, 6.0, 6.0)));
        let engine = GradingEngine::new(model, fast_config());

        let err = engine
            .grade_writing(&WritingSubmission {
                task_type: TaskType::Task2,
                task_prompt: "p".into(),
                essay: long_essay(260),
                chart: Some(ImageAttachment {
                    data_uri: "data:image/png;base64,AAAA".into(),
                }),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("academic_task_1"));
    }

    #[tokio::test]
    async fn speaking_pipeline_produces_speaking_criteria() {
        let reply = r#"{"FC": 7.0, "LR": 6.5, "GRA": 6.0, "PR": 7.5,
            "notes": {"FC": "ok", "LR": "ok", "GRA": "ok", "PR": "ok"},
            "overall_comment": "Good performance.",
            "improvement_plan": ["Slow down"]}"#;
        let model = Arc::new(FixedModel::new(reply));
        let engine = GradingEngine::new(model, fast_config())
            .with_transcriber(Arc::new(FixedTranscriber));

        let eval = engine
            .grade_speaking(&SpeakingSubmission {
                task_prompt: "Describe a memorable journey.".into(),
                audio: AudioClip {
                    file_name: "answer.wav".into(),
                    bytes: vec![0u8; 16],
                },
            })
            .await
            .unwrap();

        assert_eq!(eval.task_type, TaskType::Speaking);
        assert_eq!(eval.scores.get(Criterion::Fluency), Some(7.0));
        assert_eq!(eval.scores.get(Criterion::Pronunciation), Some(7.5));
        assert_eq!(eval.overall, 7.0); // mean 6.75 rounds to 7.0
        assert!(eval.transcript.is_some());
        assert!(eval.word_count > 0);
    }

    #[tokio::test]
    async fn speaking_without_transcriber_fails() {
        let model = Arc::new(FixedModel::new("{}"));
        let engine = GradingEngine::new(model, fast_config());

        let err = engine
            .grade_speaking(&SpeakingSubmission {
                task_prompt: "p".into(),
                audio: AudioClip {
                    file_name: "a.wav".into(),
                    bytes: vec![],
                },
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no transcriber"));
    }

    #[tokio::test]
    async fn rubric_store_failure_degrades_gracefully() {
        struct FailingStore;

        #[async_trait]
        impl RubricStore for FailingStore {
            async fn retrieve(
                &self,
                _task_type: TaskType,
                _k: usize,
            ) -> Result<Vec<RubricChunk>> {
                anyhow::bail!("store unavailable")
            }
        }

        let model = Arc::new(FixedModel::new(&writing_reply(6.0, 6.0, 6.0, 6.0)));
        let engine =
            GradingEngine::new(model, fast_config()).with_rubric_store(Arc::new(FailingStore));

        let eval = engine
            .grade_writing(&writing_submission(long_essay(260)))
            .await
            .unwrap();
        assert!(!eval.used_rubric);
    }
}
