//! Error types for the ruletest-rules crate.

use thiserror::Error;

/// Errors that can occur while loading or evaluating rules.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule definition failed validation.
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule {
        /// The rule's record or alert name, or its expression if unnamed.
        rule: String,
        /// The reason validation failed.
        reason: String,
    },

    /// A rule group failed validation.
    #[error("invalid rule group '{group}': {reason}")]
    InvalidGroup {
        /// The group name.
        group: String,
        /// The reason validation failed.
        reason: String,
    },

    /// A rule expression could not be parsed.
    #[error("invalid expression in rule '{rule}': {source}")]
    InvalidExpression {
        /// The rule's record or alert name.
        rule: String,
        /// The underlying parse error.
        #[source]
        source: ruletest_query::QueryError,
    },

    /// A rule expression failed to evaluate.
    #[error("evaluation of rule '{rule}' failed: {source}")]
    Evaluation {
        /// The rule's record or alert name.
        rule: String,
        /// The underlying evaluation error.
        #[source]
        source: ruletest_query::QueryError,
    },

    /// Two outputs of one rule resolved to the same series identity
    /// (recording output series or alert instance labels).
    #[error("rule '{rule}' produced duplicate series {series}")]
    DuplicateOutput {
        /// The rule's record or alert name.
        rule: String,
        /// The colliding series identity.
        series: String,
    },

    /// The rule file YAML could not be deserialized.
    #[error("malformed rule file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A rule file could not be read.
    #[error("failed to read rule file {path}: {source}")]
    Io {
        /// The path as given.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
