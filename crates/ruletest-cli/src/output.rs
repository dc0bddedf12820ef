//! Machine-readable report rendering.
//!
//! The JSON view mirrors the plain-text report blocks: one entry per
//! file with its structural errors and assertion failures, plus the
//! run-level counts that drive the exit code. The view structs are
//! owned copies so the wire schema stays stable even when the harness
//! types grow fields.

use serde::Serialize;

use ruletest_harness::{AssertionFailure, FileReport, RunSummary};

/// JSON view of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// One entry per input file, in input order.
    pub files: Vec<JsonFileReport>,
    /// Number of files with at least one error or failure.
    pub failed_files: usize,
    /// True when every file passed.
    pub success: bool,
}

/// JSON view of one test file.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFileReport {
    /// Path (or label) of the test file.
    pub path: String,
    /// True when the file produced no errors and no failures.
    pub passed: bool,
    /// Structural errors; any entry fails the file.
    pub errors: Vec<String>,
    /// Assertion failures; any entry fails the file.
    pub failures: Vec<JsonFailure>,
}

/// JSON view of one failed assertion.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFailure {
    /// Display name of the owning test group.
    pub group: String,
    /// The document list the assertion came from.
    pub list: String,
    /// Zero-based index within that list.
    pub index: usize,
    /// The asserted expression or alert name.
    pub target: String,
    /// Instant the assertion looked at, as a compact duration.
    pub at: String,
    /// One-line mismatch description.
    pub summary: String,
    /// Expected rows, sorted.
    pub expected: Vec<String>,
    /// Actual rows, sorted.
    pub actual: Vec<String>,
}

impl From<&RunSummary> for JsonSummary {
    fn from(summary: &RunSummary) -> Self {
        Self {
            files: summary.reports.iter().map(JsonFileReport::from).collect(),
            failed_files: summary.failed_files(),
            success: summary.is_success(),
        }
    }
}

impl From<&FileReport> for JsonFileReport {
    fn from(report: &FileReport) -> Self {
        Self {
            path: report.path.clone(),
            passed: report.passed(),
            errors: report.errors.clone(),
            failures: report.failures.iter().map(JsonFailure::from).collect(),
        }
    }
}

impl From<&AssertionFailure> for JsonFailure {
    fn from(failure: &AssertionFailure) -> Self {
        Self {
            group: failure.group.clone(),
            list: failure.kind.list_name().to_string(),
            index: failure.index,
            target: failure.target.clone(),
            at: failure.at.to_string(),
            summary: failure.detail.summary.clone(),
            expected: failure.detail.expected.clone(),
            actual: failure.detail.actual.clone(),
        }
    }
}
