//! Error types for test-document loading and execution.

use thiserror::Error;

/// Errors that can occur while loading, scheduling, or replaying a test
/// document.
///
/// Assertion mismatches are not errors. They are reported as failures by
/// the runner so that the remaining assertions in a group still run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The test document was not valid YAML or did not match the schema.
    #[error("malformed test file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A test file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document parsed but failed structural validation.
    #[error("invalid test document: {reason}")]
    InvalidDocument {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// `group_eval_order` names a group that no rule file defines.
    #[error("group_eval_order names unknown group '{name}'")]
    UnknownGroupInOrder {
        /// The unmatched group name.
        name: String,
    },

    /// `group_eval_order` names the same group more than once.
    #[error("group_eval_order names group '{name}' more than once")]
    DuplicateGroupInOrder {
        /// The repeated group name.
        name: String,
    },

    /// An explicit `group_eval_order` leaves out a loaded group.
    #[error("group_eval_order does not name group '{name}'")]
    MissingGroupInOrder {
        /// The omitted group name.
        name: String,
    },

    /// The referenced rule files define the same group name twice.
    #[error("rule files define group '{name}' more than once")]
    DuplicateRuleGroup {
        /// The colliding group name.
        name: String,
    },

    /// A rule file failed to load, or a rule failed during replay.
    #[error("rule error: {0}")]
    Rule(#[from] ruletest_rules::RuleError),

    /// An input series could not be seeded into the sample store.
    #[error("input series error: {0}")]
    Series(#[from] ruletest_series::SeriesError),
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
