//! Error types shared across the bandgrade crates.
//!
//! `ProviderError` is defined here so the grading engine can downcast and
//! classify API failures for retry decisions without string matching.

use thiserror::Error;

use crate::model::Criterion;

/// Errors from validating band scores returned by the model.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// A criterion score is outside [0, 9] after half-band rounding.
    ///
    /// This is a hard validation failure; scores are never silently clamped.
    #[error("{criterion} score out of range (0-9): {value}")]
    OutOfRange { criterion: Criterion, value: f64 },
}

/// Errors from validating the structure of a model response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerdictError {
    /// The response body was not valid JSON.
    #[error("response is not valid JSON: {0}")]
    Json(String),

    /// A required field was absent.
    #[error("missing required field `{0}`")]
    MissingField(String),

    /// A field was present but had the wrong JSON type.
    #[error("field `{field}` has wrong type, expected {expected}")]
    WrongType { field: String, expected: &'static str },
}

/// Errors that can occur when interacting with a hosted model API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
