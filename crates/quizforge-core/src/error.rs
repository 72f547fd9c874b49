//! Error types.
//!
//! `ProviderError` covers failures talking to a collaborator backend and is
//! defined here so the agents can downcast and classify errors without string
//! matching. `ValidationError` is the typed failure surfaced by grading.

use thiserror::Error;

/// Errors that can occur when interacting with a text-generation, embedding,
/// or vector-search backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model or collection was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request did not finish before its deadline.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

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
}

/// Failures that abort an entire answer-validation run.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The submission failed shape checks before any grading happened.
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// The grading backend did not answer before the deadline.
    #[error("grading timed out after {secs}s for question {question_id}")]
    Timeout { question_id: String, secs: u64 },

    /// The caller cancelled grading.
    #[error("grading cancelled at question {question_id}")]
    Cancelled { question_id: String },

    /// The grading backend returned an error.
    #[error("grading backend failed for question {question_id}: {source:#}")]
    Backend {
        question_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The grading backend replied, but not with a usable grade.
    #[error("malformed grading response for question {question_id}: {reason}")]
    MalformedResponse { question_id: String, reason: String },
}
