//! Band score normalization and the length penalty rule.
//!
//! Rounding convention: `round_to_half` uses `f64::round`, which rounds
//! halves away from zero. A raw 6.25 therefore becomes 6.5, not 6.0.

use crate::error::ScoreError;
use crate::model::Criterion;

/// Tolerance when deciding whether a value already sits on a half-step.
const HALF_STEP_EPSILON: f64 = 1e-6;

/// Round to the nearest multiple of 0.5, halves away from zero.
pub fn round_to_half(x: f64) -> f64 {
    (x * 2.0).round() / 2.0
}

/// True iff `x` is within 1e-6 of a multiple of 0.5.
pub fn is_half_step(x: f64) -> bool {
    let doubled = x * 2.0;
    (doubled - doubled.round()).abs() < HALF_STEP_EPSILON
}

/// Overall band: the rounded, unweighted mean of the four criteria.
pub fn compute_overall(tr: f64, cc: f64, lr: f64, gra: f64) -> f64 {
    round_to_half((tr + cc + lr + gra) / 4.0)
}

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cap a criterion score when the submission falls short of the required
/// word count. Below 80% of the minimum the cap is 5.0; below the minimum
/// it is 5.5. Never raises a score.
pub fn apply_length_penalty(score: f64, text: &str, min_words: usize) -> f64 {
    let words = word_count(text) as f64;
    let min_words = min_words as f64;
    if words < 0.8 * min_words {
        score.min(5.0)
    } else if words < min_words {
        score.min(5.5)
    } else {
        score
    }
}

/// Re-round a raw model score if needed and validate the [0, 9] range.
///
/// Out-of-range values are a hard failure, not clamped.
pub fn normalize_score(criterion: Criterion, value: f64) -> Result<f64, ScoreError> {
    let value = if is_half_step(value) {
        value
    } else {
        round_to_half(value)
    };
    if !(0.0..=9.0).contains(&value) {
        return Err(ScoreError::OutOfRange { criterion, value });
    }
    Ok(value)
}
