//! Strict parsing of the examiner model's JSON reply.
//!
//! The model is instructed to return JSON only, but in practice replies
//! arrive wrapped in markdown fences or with prose around the object. The
//! payload is extracted first, then validated field by field so a failure
//! names the exact field instead of a generic parse error.
//!
//! Parsing is modeled as a tagged outcome (`Verdict`) rather than a thrown
//! error: the caller always gets the raw text back on failure.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::VerdictError;
use crate::model::{Criterion, Modality};

/// A raw, not-yet-validated evaluation as returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvaluation {
    /// Raw criterion scores, exactly the modality's four criteria.
    pub scores: BTreeMap<Criterion, f64>,
    /// Per-criterion notes; missing notes degrade to empty strings.
    pub notes: BTreeMap<Criterion, String>,
    /// Overall comment; empty when absent.
    pub overall_comment: String,
    /// Improvement suggestions; empty when absent.
    pub improvement_plan: Vec<String>,
}

/// Outcome of parsing a model reply.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// All required fields present and well typed.
    Parsed(RawEvaluation),
    /// The reply could not be used. Carries the raw text and every field
    /// problem found, so the caller can log or surface them.
    Unparsable {
        raw: String,
        errors: Vec<VerdictError>,
    },
}

impl Verdict {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Verdict::Parsed(_))
    }
}

/// Pull the JSON object out of a model reply.
///
/// Prefers a ```json fenced block, then any fenced block, then the
/// outermost `{...}` span, then the raw text.
pub fn extract_json_payload(response: &str) -> String {
    let trimmed = response.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }

    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut current = String::new();

    for line in response.lines() {
        let line_trimmed = line.trim();
        if !in_block && line_trimmed.starts_with("```") {
            in_block = true;
            let lang = line_trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            current.clear();
            continue;
        }
        if in_block && line_trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current.clone());
            } else {
                generic_blocks.push(current.clone());
            }
            current.clear();
            continue;
        }
        if in_block {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    // Unclosed fence at end of a truncated reply.
    if in_block && !current.is_empty() {
        if is_json_block {
            json_blocks.push(current);
        } else {
            generic_blocks.push(current);
        }
    }

    if let Some(block) = json_blocks.into_iter().next() {
        return block;
    }
    if let Some(block) = generic_blocks.into_iter().next() {
        return block;
    }

    // Last resort: the outermost brace span.
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}

/// Parse and validate a model reply for the given modality.
pub fn parse_verdict(content: &str, modality: Modality) -> Verdict {
    let payload = extract_json_payload(content);

    let value: Value = match serde_json::from_str(&payload) {
        Ok(v) => v,
        Err(e) => {
            return Verdict::Unparsable {
                raw: content.to_string(),
                errors: vec![VerdictError::Json(e.to_string())],
            }
        }
    };

    let Some(object) = value.as_object() else {
        return Verdict::Unparsable {
            raw: content.to_string(),
            errors: vec![VerdictError::WrongType {
                field: "$".into(),
                expected: "object",
            }],
        };
    };

    let mut errors = Vec::new();
    let mut scores = BTreeMap::new();

    // Criterion scores are hard requirements.
    for criterion in modality.criteria() {
        match object.get(criterion.code()) {
            None => errors.push(VerdictError::MissingField(criterion.code().to_string())),
            Some(v) => match v.as_f64() {
                Some(score) => {
                    scores.insert(criterion, score);
                }
                None => errors.push(VerdictError::WrongType {
                    field: criterion.code().to_string(),
                    expected: "number",
                }),
            },
        }
    }

    if !errors.is_empty() {
        return Verdict::Unparsable {
            raw: content.to_string(),
            errors,
        };
    }

    // Free-text fields degrade to empty values when absent or mistyped.
    let mut notes = BTreeMap::new();
    if let Some(notes_obj) = object.get("notes").and_then(Value::as_object) {
        for criterion in modality.criteria() {
            let text = notes_obj
                .get(criterion.code())
                .and_then(Value::as_str)
                .unwrap_or("");
            notes.insert(criterion, text.to_string());
        }
    }

    let overall_comment = object
        .get("overall_comment")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let improvement_plan = object
        .get("improvement_plan")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Verdict::Parsed(RawEvaluation {
        scores,
        notes,
        overall_comment,
        improvement_plan,
    })
}
