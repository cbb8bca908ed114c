//! Core data model for bandgrade.
//!
//! Band scores, criterion sets, feedback, and the immutable evaluation
//! record produced for each graded submission.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which kind of submission is being graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Writing,
    Speaking,
}

impl Modality {
    /// The fixed four-criterion set for this modality.
    pub fn criteria(&self) -> [Criterion; 4] {
        match self {
            Modality::Writing => [
                Criterion::TaskResponse,
                Criterion::Coherence,
                Criterion::Lexical,
                Criterion::Grammar,
            ],
            Modality::Speaking => [
                Criterion::Fluency,
                Criterion::Lexical,
                Criterion::Grammar,
                Criterion::Pronunciation,
            ],
        }
    }
}

/// The IELTS task being graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "academic_task_1")]
    AcademicTask1,
    #[serde(rename = "general_task_1")]
    GeneralTask1,
    #[serde(rename = "task_2")]
    Task2,
    #[serde(rename = "speaking")]
    Speaking,
}

impl TaskType {
    pub fn modality(&self) -> Modality {
        match self {
            TaskType::Speaking => Modality::Speaking,
            _ => Modality::Writing,
        }
    }

    /// Minimum word count for the length penalty rule. Speaking has no
    /// word-count requirement.
    pub fn min_words(&self) -> Option<usize> {
        match self {
            TaskType::Task2 => Some(250),
            TaskType::AcademicTask1 | TaskType::GeneralTask1 => Some(150),
            TaskType::Speaking => None,
        }
    }

    /// The official name of the first writing criterion for this task.
    pub fn tr_label(&self) -> &'static str {
        match self {
            TaskType::Task2 => "Task Response",
            _ => "Task Achievement",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::AcademicTask1 => write!(f, "academic_task_1"),
            TaskType::GeneralTask1 => write!(f, "general_task_1"),
            TaskType::Task2 => write!(f, "task_2"),
            TaskType::Speaking => write!(f, "speaking"),
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "academic_task_1" | "academic-task-1" => Ok(TaskType::AcademicTask1),
            "general_task_1" | "general-task-1" => Ok(TaskType::GeneralTask1),
            "task_2" | "task-2" => Ok(TaskType::Task2),
            "speaking" => Ok(TaskType::Speaking),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// One evaluation dimension. Serialized with the short codes used in the
/// model's JSON reply (TR, CC, LR, GRA, FC, PR).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Criterion {
    /// Task Response / Task Achievement.
    #[serde(rename = "TR")]
    TaskResponse,
    /// Coherence & Cohesion.
    #[serde(rename = "CC")]
    Coherence,
    /// Lexical Resource.
    #[serde(rename = "LR")]
    Lexical,
    /// Grammatical Range & Accuracy.
    #[serde(rename = "GRA")]
    Grammar,
    /// Fluency & Coherence (speaking).
    #[serde(rename = "FC")]
    Fluency,
    /// Pronunciation (speaking).
    #[serde(rename = "PR")]
    Pronunciation,
}

impl Criterion {
    /// Short code as used in prompts and the model's JSON reply.
    pub fn code(&self) -> &'static str {
        match self {
            Criterion::TaskResponse => "TR",
            Criterion::Coherence => "CC",
            Criterion::Lexical => "LR",
            Criterion::Grammar => "GRA",
            Criterion::Fluency => "FC",
            Criterion::Pronunciation => "PR",
        }
    }

    /// Human-readable name for display.
    pub fn long_name(&self) -> &'static str {
        match self {
            Criterion::TaskResponse => "Task Response",
            Criterion::Coherence => "Coherence & Cohesion",
            Criterion::Lexical => "Lexical Resource",
            Criterion::Grammar => "Grammatical Range & Accuracy",
            Criterion::Fluency => "Fluency & Coherence",
            Criterion::Pronunciation => "Pronunciation",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A fixed mapping from criterion to band score, always exactly four
/// entries matching the modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionSet {
    modality: Modality,
    scores: BTreeMap<Criterion, f64>,
}

impl CriterionSet {
    /// Build a criterion set, enforcing that exactly the modality's four
    /// criteria are present.
    pub fn new(modality: Modality, scores: BTreeMap<Criterion, f64>) -> Result<Self> {
        let expected = modality.criteria();
        for criterion in expected {
            anyhow::ensure!(
                scores.contains_key(&criterion),
                "missing criterion {criterion} for {modality:?}"
            );
        }
        anyhow::ensure!(
            scores.len() == expected.len(),
            "expected exactly {} criteria, got {}",
            expected.len(),
            scores.len()
        );
        Ok(Self { modality, scores })
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.scores.get(&criterion).copied()
    }

    /// Iterate criteria in the modality's canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        self.modality
            .criteria()
            .into_iter()
            .filter_map(|c| self.scores.get(&c).map(|&v| (c, v)))
    }

    /// Unweighted mean of the four criterion scores (not rounded).
    pub fn mean(&self) -> f64 {
        let sum: f64 = self.scores.values().sum();
        sum / self.scores.len() as f64
    }

}

/// Free-text feedback accompanying the numeric scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feedback {
    /// Per-criterion notes. Missing notes are stored as empty strings.
    #[serde(default)]
    pub notes: BTreeMap<Criterion, String>,
    /// Overall comment on the submission.
    #[serde(default)]
    pub overall_comment: String,
    /// Short actionable improvement suggestions.
    #[serde(default)]
    pub improvement_plan: Vec<String>,
}

impl Feedback {
    /// Note text for a criterion, empty string when absent.
    pub fn note(&self, criterion: Criterion) -> &str {
        self.notes.get(&criterion).map(String::as_str).unwrap_or("")
    }
}

/// Token accounting reported by the model API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost_usd: f64,
}

/// The complete, immutable result of grading one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Unique evaluation identifier.
    pub id: Uuid,
    /// When the evaluation completed.
    pub created_at: DateTime<Utc>,
    /// The task that was graded.
    pub task_type: TaskType,
    /// Overall band: rounded mean of the four criteria. Derived, never
    /// settable independently.
    pub overall: f64,
    /// The validated per-criterion scores.
    pub scores: CriterionSet,
    /// Free-text feedback from the examiner model.
    pub feedback: Feedback,
    /// Whitespace-delimited word count of the graded text.
    pub word_count: usize,
    /// Whether rubric excerpts were injected into the grading prompt.
    pub used_rubric: bool,
    /// Whether the consistency adjuster changed any score.
    pub adjusted: bool,
    /// Transcript, for speaking submissions.
    #[serde(default)]
    pub transcript: Option<String>,
    /// Model that produced the verdict.
    pub model: String,
    /// Token usage for the grading call.
    pub token_usage: TokenUsage,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
}

impl Evaluation {
    /// Save the evaluation as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize evaluation")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write evaluation to {}", path.display()))?;
        Ok(())
    }

    /// Load an evaluation from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read evaluation from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse evaluation JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_display_and_parse() {
        assert_eq!(TaskType::Task2.to_string(), "task_2");
        assert_eq!("task_2".parse::<TaskType>().unwrap(), TaskType::Task2);
        assert_eq!(
            "Academic_Task_1".parse::<TaskType>().unwrap(),
            TaskType::AcademicTask1
        );
        assert!("task_3".parse::<TaskType>().is_err());
        // Serde and Display agree on the wire form.
        assert_eq!(
            serde_json::to_string(&TaskType::AcademicTask1).unwrap(),
            "\"academic_task_1\""
        );
    }

    #[test]
    fn min_words_per_task() {
        assert_eq!(TaskType::Task2.min_words(), Some(250));
        assert_eq!(TaskType::AcademicTask1.min_words(), Some(150));
        assert_eq!(TaskType::GeneralTask1.min_words(), Some(150));
        assert_eq!(TaskType::Speaking.min_words(), None);
    }

    #[test]
    fn tr_label_varies_by_task() {
        assert_eq!(TaskType::Task2.tr_label(), "Task Response");
        assert_eq!(TaskType::AcademicTask1.tr_label(), "Task Achievement");
    }

    #[test]
    fn criterion_set_rejects_missing_criterion() {
        let mut scores = BTreeMap::new();
        scores.insert(Criterion::TaskResponse, 6.0);
        scores.insert(Criterion::Coherence, 6.0);
        scores.insert(Criterion::Lexical, 6.0);
        assert!(CriterionSet::new(Modality::Writing, scores).is_err());
    }

    #[test]
    fn criterion_set_rejects_wrong_modality() {
        let mut scores = BTreeMap::new();
        scores.insert(Criterion::TaskResponse, 6.0);
        scores.insert(Criterion::Coherence, 6.0);
        scores.insert(Criterion::Lexical, 6.0);
        scores.insert(Criterion::Grammar, 6.0);
        assert!(CriterionSet::new(Modality::Speaking, scores).is_err());
    }

    #[test]
    fn criterion_set_iterates_in_canonical_order() {
        let mut scores = BTreeMap::new();
        scores.insert(Criterion::Grammar, 5.0);
        scores.insert(Criterion::TaskResponse, 6.0);
        scores.insert(Criterion::Coherence, 7.0);
        scores.insert(Criterion::Lexical, 8.0);
        let set = CriterionSet::new(Modality::Writing, scores).unwrap();
        let order: Vec<Criterion> = set.iter().map(|(c, _)| c).collect();
        assert_eq!(
            order,
            vec![
                Criterion::TaskResponse,
                Criterion::Coherence,
                Criterion::Lexical,
                Criterion::Grammar
            ]
        );
        assert!((set.mean() - 6.5).abs() < f64::EPSILON);
    }

    #[test]
    fn criterion_serializes_to_short_codes() {
        assert_eq!(
            serde_json::to_string(&Criterion::TaskResponse).unwrap(),
            "\"TR\""
        );
        assert_eq!(
            serde_json::to_string(&Criterion::Pronunciation).unwrap(),
            "\"PR\""
        );
        let c: Criterion = serde_json::from_str("\"GRA\"").unwrap();
        assert_eq!(c, Criterion::Grammar);
    }

    #[test]
    fn evaluation_json_roundtrip() {
        let mut scores = BTreeMap::new();
        for c in Modality::Writing.criteria() {
            scores.insert(c, 6.5);
        }
        let eval = Evaluation {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            task_type: TaskType::Task2,
            overall: 6.5,
            scores: CriterionSet::new(Modality::Writing, scores).unwrap(),
            feedback: Feedback::default(),
            word_count: 260,
            used_rubric: false,
            adjusted: false,
            transcript: None,
            model: "test".into(),
            token_usage: TokenUsage::default(),
            latency_ms: 10,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.json");
        eval.save_json(&path).unwrap();
        let loaded = Evaluation::load_json(&path).unwrap();
        assert_eq!(loaded.id, eval.id);
        assert_eq!(loaded.scores.get(Criterion::Lexical), Some(6.5));
    }
}
