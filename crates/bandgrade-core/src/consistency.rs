//! Score/feedback consistency adjustment.
//!
//! The examiner model sometimes returns a numeric score that contradicts
//! its own feedback text ("excellent vocabulary" next to a 3.0). This
//! module detects keyword sentiment in the notes and nudges scores toward
//! agreement. It is a heuristic safety net over an unreliable external
//! scorer, not a correctness guarantee.
//!
//! The thresholds are configuration, not algorithmic truth: they were
//! retuned more than once in production, so they live in named presets
//! instead of constants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Criterion;
use crate::scoring::round_to_half;

/// Language praising a criterion.
const POSITIVE: &[&str] = &[
    "good",
    "well",
    "clear",
    "effective",
    "appropriate",
    "accurate",
    "strong",
    "wide range",
    "varied",
    "coherent",
    "fluent",
    "natural",
];

/// Intensified praise. Scores this low next to these words are treated as
/// scoring mistakes.
const VERY_POSITIVE: &[&str] = &[
    "excellent",
    "outstanding",
    "exceptional",
    "sophisticated",
    "impressive",
    "masterful",
    "flawless",
    "native-like",
];

/// Language criticizing a criterion.
const NEGATIVE: &[&str] = &[
    "limited",
    "weak",
    "poor",
    "frequent errors",
    "repetitive",
    "unclear",
    "inadequate",
    "basic",
    "insufficient",
    "severe",
    "serious",
];

/// Severity markers. The negative cap only fires when criticism is both
/// repeated and explicitly severe.
const SEVERITY: &[&str] = &["severe", "serious", "major", "significant"];

/// Thresholds for the consistency rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    /// Very-positive language with a score below this triggers a raise.
    pub very_positive_trigger: f64,
    /// Floor applied when the very-positive rule fires.
    pub very_positive_floor: f64,
    /// Ordinary positive language with a score below this triggers a raise.
    pub positive_trigger: f64,
    /// Floor applied when the positive rule fires.
    pub positive_floor: f64,
    /// Negative language only caps scores above this.
    pub negative_trigger: f64,
    /// Cap applied when the negative rule fires.
    pub negative_cap: f64,
    /// Minimum number of negative keyword hits before the cap applies.
    pub negative_repeats: usize,
    /// Very-positive overall comment with a mean below this scales all
    /// four scores up proportionally.
    pub mean_floor: f64,
}

/// Named threshold presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Only fix extreme mismatches. The default.
    Lenient,
    /// Aggressive enforcement: push scores up whenever feedback reads
    /// positive. Matches the earlier, since-retired behavior.
    Strict,
}

impl Default for Preset {
    fn default() -> Self {
        Preset::Lenient
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(Preset::Lenient),
            "strict" => Ok(Preset::Strict),
            other => Err(format!("unknown preset: {other}")),
        }
    }
}

impl ConsistencyConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Lenient => Self {
                very_positive_trigger: 5.0,
                very_positive_floor: 5.5,
                positive_trigger: 2.5,
                positive_floor: 4.0,
                negative_trigger: 7.5,
                negative_cap: 6.5,
                negative_repeats: 3,
                mean_floor: 4.0,
            },
            Preset::Strict => Self {
                very_positive_trigger: 6.0,
                very_positive_floor: 6.5,
                positive_trigger: 4.0,
                positive_floor: 5.0,
                negative_trigger: 6.5,
                negative_cap: 6.0,
                negative_repeats: 2,
                mean_floor: 6.0,
            },
        }
    }
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self::preset(Preset::Lenient)
    }
}

fn count_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().map(|kw| text.matches(kw).count()).sum()
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// Round up to the next half-step. Used for the mean scale-up so the
/// adjusted scores cannot round back below the floor.
fn ceil_to_half(x: f64) -> f64 {
    (x * 2.0).ceil() / 2.0
}

/// Reconcile criterion scores with the sentiment of their feedback text.
///
/// Returns the adjusted scores and whether any score actually changed.
/// Re-running on its own output is a no-op once converged.
pub fn validate_scores(
    scores: &BTreeMap<Criterion, f64>,
    notes: &BTreeMap<Criterion, String>,
    overall_comment: &str,
    config: &ConsistencyConfig,
) -> (BTreeMap<Criterion, f64>, bool) {
    let comment = overall_comment.to_lowercase();
    let comment_very_positive = count_hits(&comment, VERY_POSITIVE);
    let comment_positive = count_hits(&comment, POSITIVE);

    let mut adjusted = scores.clone();
    let mut changed = false;

    for (&criterion, score) in adjusted.iter_mut() {
        let note = notes
            .get(&criterion)
            .map(|n| n.to_lowercase())
            .unwrap_or_default();

        // Positive sentiment counts include the overall comment.
        let very_positive = count_hits(&note, VERY_POSITIVE) + comment_very_positive;
        let positive = count_hits(&note, POSITIVE) + comment_positive;
        let negative = count_hits(&note, NEGATIVE);

        let before = *score;

        if very_positive > 0 && *score < config.very_positive_trigger {
            *score = score.max(config.very_positive_floor);
        }
        if positive > 0 && *score < config.positive_trigger {
            *score = score.max(config.positive_floor);
        }
        if negative >= config.negative_repeats
            && contains_any(&note, SEVERITY)
            && *score > config.negative_trigger
        {
            *score = score.min(config.negative_cap);
        }

        *score = round_to_half(score.clamp(0.0, 9.0));
        if (*score - before).abs() > f64::EPSILON {
            tracing::debug!(
                criterion = %criterion,
                from = before,
                to = *score,
                "consistency adjustment applied"
            );
            changed = true;
        }
    }

    // A glowing overall comment with a collapsed mean scales everything up.
    // Iterated to a fixpoint: the half-step ceil plus the 9.0 clamp can
    // leave the mean short after one pass when a score saturates.
    if comment_very_positive > 0 {
        loop {
            let mean: f64 = adjusted.values().sum::<f64>() / adjusted.len() as f64;
            if mean <= 0.0 || mean >= config.mean_floor {
                break;
            }
            let factor = config.mean_floor / mean;
            let mut any_raised = false;
            for score in adjusted.values_mut() {
                let raised = ceil_to_half(*score * factor).min(9.0);
                if raised > *score {
                    *score = raised;
                    any_raised = true;
                    changed = true;
                }
            }
            if !any_raised {
                break;
            }
        }
    }

    (adjusted, changed)
}
