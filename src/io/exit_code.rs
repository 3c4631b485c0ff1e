//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - search completed (an empty result list is still success)
//! - `1`: General error - unspecified failure
//! - `2`: Invalid request - a parameter is out of range
//! - `3`: Service unavailable - the embedding model never loaded

use crate::error::SearchError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Request failed validation (code 2)
    InvalidRequest = 2,

    /// Semantic search is unavailable for this process (code 3)
    ServiceUnavailable = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Convert a `SearchError` to the appropriate exit code.
    pub fn from_error(error: &SearchError) -> Self {
        match error {
            SearchError::InvalidRequest { .. } => ExitCode::InvalidRequest,
            SearchError::EncodingUnavailable { .. } => ExitCode::ServiceUnavailable,
            _ => ExitCode::GeneralError,
        }
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::InvalidRequest => "Invalid request",
            ExitCode::ServiceUnavailable => "Semantic search unavailable",
        }
    }
}
