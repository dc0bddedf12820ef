//! Failure rendering for test-file reports.
//!
//! Reports are plain text, one block per file, indented so that several
//! files can be concatenated. The optional diff view renders expected
//! and actual rows as a unified line diff, which reads better than two
//! flat lists once an assertion covers more than a handful of series.

#![allow(clippy::format_push_string)]

use ruletest_series::CompactDuration;

use crate::assert::FailureDetail;

/// Which assertion list a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// A `promql_expr_test` entry.
    Query,
    /// An `alert_rule_test` entry.
    Alert,
}

impl AssertionKind {
    /// The document list this assertion came from.
    #[must_use]
    pub const fn list_name(self) -> &'static str {
        match self {
            Self::Query => "promql_expr_test",
            Self::Alert => "alert_rule_test",
        }
    }

    /// The field naming the assertion's target.
    #[must_use]
    pub const fn target_name(self) -> &'static str {
        match self {
            Self::Query => "expr",
            Self::Alert => "alertname",
        }
    }
}

/// One failed assertion with enough context to find it in the file.
#[derive(Debug, Clone)]
pub struct AssertionFailure {
    /// Display name of the owning test group.
    pub group: String,
    /// Query or alert assertion.
    pub kind: AssertionKind,
    /// Zero-based index within the group's assertion list.
    pub index: usize,
    /// The asserted expression or alert name.
    pub target: String,
    /// Instant the assertion looked at.
    pub at: CompactDuration,
    /// What was expected and what actually happened.
    pub detail: FailureDetail,
}

/// Everything the runner learned about one test file.
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Path (or label) of the test file.
    pub path: String,
    /// Structural errors; any entry fails the file.
    pub errors: Vec<String>,
    /// Assertion failures; any entry fails the file.
    pub failures: Vec<AssertionFailure>,
}

impl FileReport {
    /// True when the file produced no errors and no failures.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.failures.is_empty()
    }
}

/// Renders the report block for one test file.
#[must_use]
pub fn format_file_report(report: &FileReport, diff: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Unit Testing: {}\n", report.path));
    if report.passed() {
        out.push_str("  SUCCESS\n");
        return out;
    }
    out.push_str("  FAILED:\n");
    for error in &report.errors {
        out.push_str(&format!("    error: {error}\n"));
    }
    for failure in &report.failures {
        out.push_str(&format_failure(failure, diff));
    }
    out
}

/// Renders one assertion failure as an indented block.
#[must_use]
pub fn format_failure(failure: &AssertionFailure, diff: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "    group '{}', {}[{}], {} '{}' at {}: {}\n",
        failure.group,
        failure.kind.list_name(),
        failure.index,
        failure.kind.target_name(),
        failure.target,
        failure.at,
        failure.detail.summary
    ));
    out.push_str("      expected:\n");
    push_rows(&mut out, &failure.detail.expected);
    out.push_str("      actual:\n");
    push_rows(&mut out, &failure.detail.actual);
    if diff {
        out.push_str("      diff:\n");
        for line in unified_diff(&failure.detail.expected, &failure.detail.actual).lines() {
            out.push_str(&format!("        {line}\n"));
        }
    }
    out
}

/// Renders the end-of-run summary line.
#[must_use]
pub fn format_summary(total: usize, failed: usize) -> String {
    if failed == 0 {
        format!("all {total} test files passed\n")
    } else {
        format!("{failed} of {total} test files failed\n")
    }
}

/// Renders a unified line diff between expected and actual rows.
///
/// Rows arrive pre-sorted, so the longest-common-subsequence walk lines
/// up unchanged rows and marks the rest with `-` (expected only) or `+`
/// (actual only).
#[must_use]
pub fn unified_diff(expected: &[String], actual: &[String]) -> String {
    let rows = expected.len();
    let cols = actual.len();
    let mut common = vec![vec![0_usize; cols + 1]; rows + 1];
    for i in (0..rows).rev() {
        for j in (0..cols).rev() {
            common[i][j] = if expected[i] == actual[j] {
                common[i + 1][j + 1] + 1
            } else {
                common[i + 1][j].max(common[i][j + 1])
            };
        }
    }

    let mut out = String::from("--- expected\n+++ actual\n");
    let (mut i, mut j) = (0, 0);
    while i < rows && j < cols {
        if expected[i] == actual[j] {
            out.push_str(&format!(" {}\n", expected[i]));
            i += 1;
            j += 1;
        } else if common[i + 1][j] >= common[i][j + 1] {
            out.push_str(&format!("-{}\n", expected[i]));
            i += 1;
        } else {
            out.push_str(&format!("+{}\n", actual[j]));
            j += 1;
        }
    }
    while i < rows {
        out.push_str(&format!("-{}\n", expected[i]));
        i += 1;
    }
    while j < cols {
        out.push_str(&format!("+{}\n", actual[j]));
        j += 1;
    }
    out
}

fn push_rows(out: &mut String, rows: &[String]) {
    if rows.is_empty() {
        out.push_str("        (none)\n");
        return;
    }
    for row in rows {
        out.push_str(&format!("        {row}\n"));
    }
}
