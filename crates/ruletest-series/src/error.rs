//! Error types for the ruletest-series crate.

use thiserror::Error;

/// Errors that can occur while building synthetic series.
#[derive(Debug, Error)]
pub enum SeriesError {
    /// A series selector string could not be parsed.
    #[error("invalid series selector '{selector}': {reason}")]
    InvalidSelector {
        /// The selector string as written.
        selector: String,
        /// The reason it could not be parsed.
        reason: String,
    },

    /// A value pattern token could not be parsed or expanded.
    #[error("invalid value pattern at '{token}': {reason}")]
    InvalidPattern {
        /// The offending token.
        token: String,
        /// The reason it is invalid.
        reason: String,
    },

    /// A sparse-histogram literal could not be parsed or combined.
    #[error("invalid histogram literal '{literal}': {reason}")]
    InvalidHistogram {
        /// The literal as written.
        literal: String,
        /// The reason it is invalid.
        reason: String,
    },

    /// Two input series in one group resolved to the same label set.
    #[error("duplicate series: {series}")]
    DuplicateSeries {
        /// The duplicated series identity.
        series: String,
    },

    /// The tick interval is not strictly positive.
    #[error("invalid tick interval: {millis} ms")]
    InvalidInterval {
        /// The rejected interval in milliseconds.
        millis: i64,
    },

    /// A compact duration string could not be parsed.
    #[error("invalid duration '{text}': {reason}")]
    InvalidDuration {
        /// The duration string as written.
        text: String,
        /// The reason it is invalid.
        reason: String,
    },
}

/// Result type for series operations.
pub type Result<T> = std::result::Result<T, SeriesError>;
