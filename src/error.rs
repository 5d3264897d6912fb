//! Error types for learnflux

use thiserror::Error;

/// Errors returned by the public API.
///
/// Row-level problems never surface here; they are counted and logged by the
/// batch layer (see [`RowError`]).
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid learner id: {0}")]
    InvalidLearnerId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Reasons a single raw row could not become a canonical event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("malformed JSON in `{field}`")]
    MalformedJson { field: &'static str },

    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("unparseable timestamp `{0}`")]
    InvalidTimestamp(String),
}
