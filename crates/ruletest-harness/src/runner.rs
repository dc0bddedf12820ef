//! Test-file execution and report aggregation.
//!
//! Files are independent: each gets its own store, evaluators, and
//! report, so a run fans out across worker threads and merges reports
//! back in input order. Inside a file, a structural error is fatal for
//! its smallest enclosing unit (the file for unreadable rule files, the
//! test group for bad inputs), while assertion failures are collected
//! without stopping the group.

use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use ruletest_query::{DEFAULT_LOOKBACK_MS, QueryEngine};
use ruletest_rules::{RuleGroup, load_path};

use crate::assert::{CheckOutcome, Tolerance, check_alert, check_query};
use crate::document::{TestDocument, TestGroup, load_document, parse_document};
use crate::error::Result;
use crate::orchestrator::replay;
use crate::report::{AssertionFailure, AssertionKind, FileReport};
use crate::schedule::order_groups;

/// Upper bound on concurrently running test files.
const MAX_PARALLEL_FILES: usize = 8;

/// Settings shared by every file in a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Instant-lookup lookback window in milliseconds.
    pub lookback_ms: i64,
    /// Absolute epsilon for value comparison.
    pub abs_epsilon: f64,
    /// Relative epsilon for value comparison.
    pub rel_epsilon: f64,
    /// Render a unified diff under each failed assertion.
    pub diff: bool,
    /// Test-group names to run; empty runs every group.
    pub run_filters: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lookback_ms: DEFAULT_LOOKBACK_MS,
            abs_epsilon: 1e-9,
            rel_epsilon: 1e-6,
            diff: false,
            run_filters: Vec::new(),
        }
    }
}

impl RunConfig {
    fn tolerance(&self) -> Tolerance {
        Tolerance {
            abs: self.abs_epsilon,
            rel: self.rel_epsilon,
        }
    }

    fn selects(&self, group: &TestGroup) -> bool {
        if self.run_filters.is_empty() {
            return true;
        }
        group
            .name
            .as_ref()
            .is_some_and(|name| self.run_filters.iter().any(|filter| filter == name))
    }
}

/// The outcome of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    /// One report per input file, in input order.
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    /// Number of files that failed.
    #[must_use]
    pub fn failed_files(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| !report.passed())
            .count()
    }

    /// True when every file passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_files() == 0
    }
}

/// Runs every test file, fanning out across worker threads.
///
/// Reports come back in input order regardless of which worker finished
/// first, and a failure in one file never stops the others.
#[must_use]
pub fn run_files(paths: &[PathBuf], config: &RunConfig) -> RunSummary {
    let workers = MAX_PARALLEL_FILES.min(paths.len());
    if workers <= 1 {
        let reports = paths.iter().map(|path| run_file(path, config)).collect();
        return RunSummary { reports };
    }

    let queue: Mutex<VecDeque<(usize, &PathBuf)>> = Mutex::new(paths.iter().enumerate().collect());
    let mut indexed: Vec<(usize, FileReport)> = Vec::with_capacity(paths.len());
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(scope.spawn(|| {
                let mut done = Vec::new();
                while let Some((index, path)) = { queue.lock().pop_front() } {
                    done.push((index, run_file(path, config)));
                }
                done
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(done) => indexed.extend(done),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });
    indexed.sort_by_key(|(index, _)| *index);
    RunSummary {
        reports: indexed.into_iter().map(|(_, report)| report).collect(),
    }
}

/// Runs one test file from disk.
#[must_use]
pub fn run_file(path: &Path, config: &RunConfig) -> FileReport {
    let label = path.display().to_string();
    info!(path = %label, "running test file");
    let document = match load_document(path) {
        Ok(document) => document,
        Err(err) => {
            return FileReport {
                path: label,
                errors: vec![err.to_string()],
                failures: Vec::new(),
            };
        }
    };
    let base_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    run_document(&document, &base_dir, &label, config)
}

/// Runs a test document from any reader.
///
/// The source is read to completion before parsing; an unreadable
/// source fails the report the same way an unreadable file does.
#[must_use]
pub fn run_reader(
    mut source: impl Read,
    base_dir: &Path,
    label: &str,
    config: &RunConfig,
) -> FileReport {
    let mut text = String::new();
    match source.read_to_string(&mut text) {
        Ok(_) => run_str(&text, base_dir, label, config),
        Err(err) => FileReport {
            path: label.to_string(),
            errors: vec![format!("failed to read {label}: {err}")],
            failures: Vec::new(),
        },
    }
}

/// Runs a test document given as YAML text.
///
/// Rule-file paths inside the document resolve against `base_dir`;
/// `label` stands in for the file path in the report.
#[must_use]
pub fn run_str(text: &str, base_dir: &Path, label: &str, config: &RunConfig) -> FileReport {
    match parse_document(text) {
        Ok(document) => run_document(&document, base_dir, label, config),
        Err(err) => FileReport {
            path: label.to_string(),
            errors: vec![err.to_string()],
            failures: Vec::new(),
        },
    }
}

/// Runs one already-parsed document.
#[must_use]
pub fn run_document(
    document: &TestDocument,
    base_dir: &Path,
    label: &str,
    config: &RunConfig,
) -> FileReport {
    let mut report = FileReport {
        path: label.to_string(),
        errors: Vec::new(),
        failures: Vec::new(),
    };

    let rule_groups = match load_rule_groups(document, base_dir) {
        Ok(groups) => groups,
        Err(err) => {
            report.errors.push(err.to_string());
            return report;
        }
    };

    let default_interval_ms = document.evaluation_interval.millis();
    for (index, group) in document.tests.iter().enumerate() {
        if !config.selects(group) {
            debug!(group = group.display_name(index), "skipped by run filter");
            continue;
        }
        run_group(
            group,
            index,
            &rule_groups,
            default_interval_ms,
            config,
            &mut report,
        );
    }
    report
}

fn load_rule_groups(document: &TestDocument, base_dir: &Path) -> Result<Vec<RuleGroup>> {
    let mut groups = Vec::new();
    for file in &document.rule_files {
        groups.extend(load_path(&base_dir.join(file))?);
    }
    order_groups(groups, &document.group_eval_order)
}

fn run_group(
    group: &TestGroup,
    index: usize,
    rule_groups: &[RuleGroup],
    default_interval_ms: i64,
    config: &RunConfig,
    report: &mut FileReport,
) {
    let name = group.display_name(index);
    let timeline = match replay(group, rule_groups, default_interval_ms, config.lookback_ms) {
        Ok(timeline) => timeline,
        Err(err) => {
            report.errors.push(format!("group '{name}': {err}"));
            return;
        }
    };

    let engine = QueryEngine::with_lookback(config.lookback_ms);
    for (position, assertion) in group.promql_expr_test.iter().enumerate() {
        match check_query(&engine, timeline.store(), assertion, config.tolerance()) {
            Ok(CheckOutcome::Pass) => {}
            Ok(CheckOutcome::Fail(detail)) => report.failures.push(AssertionFailure {
                group: name.clone(),
                kind: AssertionKind::Query,
                index: position,
                target: assertion.expr.clone(),
                at: assertion.eval_time,
                detail,
            }),
            Err(err) => {
                report.errors.push(format!("group '{name}': {err}"));
                return;
            }
        }
    }
    for (position, assertion) in group.alert_rule_test.iter().enumerate() {
        let firing = timeline.firing_at(assertion.eval_time.millis(), &assertion.alertname);
        if let CheckOutcome::Fail(detail) = check_alert(firing, assertion) {
            report.failures.push(AssertionFailure {
                group: name.clone(),
                kind: AssertionKind::Alert,
                index: position,
                target: assertion.alertname.clone(),
                at: assertion.eval_time,
                detail,
            });
        }
    }
}
