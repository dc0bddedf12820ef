//! CLI error types.

use thiserror::Error;

/// CLI-specific errors.
///
/// Failed assertions are not errors; they are part of the report and
/// drive the exit code instead.
#[derive(Debug, Error)]
pub enum CliError {
    /// Writing a report to the output stream failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the JSON summary failed.
    #[error("failed to encode JSON summary: {0}")]
    Json(#[from] serde_json::Error),
}
