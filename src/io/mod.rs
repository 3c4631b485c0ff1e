//! Input/Output handling for the CLI.
//!
//! This module provides:
//! - Output format selection (text, JSON)
//! - Consistent error envelopes and exit codes

pub mod exit_code;
pub mod format;

pub use exit_code::ExitCode;
pub use format::{ErrorResponse, OutputFormat};
