//! Error types for the ruletest-query crate.

use thiserror::Error;

/// Errors that can occur while parsing or evaluating query expressions.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The expression text could not be parsed.
    #[error("parse error in '{expr}' at offset {offset}: {reason}")]
    Parse {
        /// The full expression as written.
        expr: String,
        /// Byte offset of the offending character.
        offset: usize,
        /// The reason parsing failed.
        reason: String,
    },

    /// The expression parsed but uses a construct the evaluator does not
    /// implement.
    #[error("unsupported query construct: {reason}")]
    Unsupported {
        /// What the expression asked for.
        reason: String,
    },
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
