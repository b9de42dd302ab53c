//! Error types for the KnoRoute domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Running out of retries
//! is a normal outcome of the retrieval loop and has no variant here.

use thiserror::Error;

use crate::reasoning::ReasoningTask;
use crate::source::SourceCategory;

/// The top-level error type for all KnoRoute operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input and domain invariant violations ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Reasoning service failures ---
    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    // --- Knowledge store failures ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Request lifecycle ---
    #[error("Query cancelled during {phase}")]
    Cancelled { phase: String },

    #[error("Query deadline exceeded during {phase}")]
    DeadlineExceeded { phase: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("query text must not be empty")]
    EmptyQuery,

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f32),

    #[error("insight text must not be empty")]
    EmptyInsight,

    #[error("an insight must name the query it was learned from")]
    EmptyLearnedFrom,

    #[error("a routing decision must select at least one source")]
    EmptySourceSet,

    #[error("unknown source category: {0}")]
    UnknownSource(String),

    #[error("understanding topic must not be empty")]
    EmptyTopic,

    #[error("an insufficient evaluation must name at least one missing aspect")]
    MissingAspectsRequired,

    #[error("max_retries {requested} exceeds the limit of {limit}")]
    MaxRetriesOutOfRange { requested: u32, limit: u32 },
}

#[derive(Debug, Clone, Error)]
pub enum ReasoningError {
    #[error("invalid {task} output: {reason}")]
    InvalidOutput { task: ReasoningTask, reason: String },

    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),
}

impl ReasoningError {
    pub fn invalid(task: ReasoningTask, reason: impl Into<String>) -> Self {
        Self::InvalidOutput {
            task,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{category} store unavailable: {reason}")]
    Unavailable {
        category: SourceCategory,
        reason: String,
    },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid {category} metadata: {reason}")]
    InvalidMetadata {
        category: SourceCategory,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Reasoning(ReasoningError::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        }));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn invalid_output_names_the_task() {
        let err: Error = ReasoningError::invalid(ReasoningTask::Route, "empty source list").into();
        let text = err.to_string();
        assert!(text.contains("route"));
        assert!(text.contains("empty source list"));
    }

    #[test]
    fn store_error_names_the_category() {
        let err = Error::Retrieval(StoreError::Unavailable {
            category: SourceCategory::Tickets,
            reason: "connection refused".into(),
        });
        assert!(err.to_string().contains("tickets"));
    }
}
