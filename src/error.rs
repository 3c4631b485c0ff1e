//! Error types for the ranking engine
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::vector::{VectorError, VectorStorageError};
use thiserror::Error;

/// Main error type for semantic search operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// Request validation errors
    #[error("Invalid search request: {reason}")]
    InvalidRequest { reason: String },

    /// The embedding model failed to initialize; semantic search is off for this process
    #[error("Semantic search is unavailable: {reason}")]
    EncodingUnavailable { reason: String },

    /// A model call failed at request time
    #[error("Failed to encode text: {reason}")]
    EncodingFailure { reason: String },

    /// Persisted cache artifacts could not be trusted
    #[error("Vector cache is corrupted: {reason}")]
    CacheCorrupt { reason: String },

    /// Storage errors
    #[error("Storage error: {message}\nSuggestion: {suggestion}")]
    Storage { message: String, suggestion: String },

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

impl SearchError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::EncodingUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::EncodingFailure { .. } => "ENCODING_FAILURE",
            Self::CacheCorrupt { .. } => "CACHE_CORRUPT",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Vector(_) => "VECTOR_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidRequest { .. } => vec![
                "Queries must be 1 to 200 characters after trimming",
                "num must be 1..=500, chunk_size 10..=500 and min_similarity within [0, 1]",
            ],
            Self::EncodingUnavailable { .. } => vec![
                "Check network access for the first model download",
                "Verify semantic.model in .newsrank/settings.toml names a supported model",
                "Restart the process after fixing the model setup",
            ],
            Self::EncodingFailure { .. } => vec!["Try the request again, it may succeed on retry"],
            Self::CacheCorrupt { .. } => vec![
                "The cache is rebuilt automatically as articles are searched",
                "Run 'newsrank cache clear' to remove the damaged files",
            ],
            Self::Storage { .. } => vec![
                "The cache was rolled back, it is in a consistent state",
                "Check disk space and permissions in the cache directory",
            ],
            Self::Vector(_) => vec![],
        }
    }

    /// True when semantic search as a whole is switched off.
    ///
    /// Callers surface this distinctly from an empty result list.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::EncodingUnavailable { .. })
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

impl From<VectorStorageError> for SearchError {
    fn from(err: VectorStorageError) -> Self {
        match err {
            VectorStorageError::Io(e) => Self::Storage {
                message: e.to_string(),
                suggestion: "Check disk space and file permissions".to_string(),
            },
            VectorStorageError::InvalidFormat(reason) => Self::CacheCorrupt { reason },
            VectorStorageError::Vector(e) => Self::Vector(e),
        }
    }
}

/// Result type alias for ranking operations
pub type RankResult<T> = Result<T, SearchError>;
