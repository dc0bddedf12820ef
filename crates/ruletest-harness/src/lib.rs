//! Deterministic replay and assertion checking for rule-test documents.
//!
//! `ruletest-harness` turns a YAML test document into a verdict. Each test
//! group seeds synthetic series into a fresh store, replays the referenced
//! rule groups on a virtual clock, and then checks query assertions
//! against the final store and alert assertions against firing-set
//! snapshots taken mid-replay. Files are independent, so a multi-file run
//! fans out across worker threads and merges per-file reports back in
//! input order.
//!
//! # Features
//!
//! - **Documents**: strict serde model for `rule_files`,
//!   `evaluation_interval`, `group_eval_order`, and `tests`, with the
//!   YAML quirks (bare numbers, `- {}` alert entries) smoothed over
//! - **Scheduling**: explicit `group_eval_order` validated as a complete
//!   permutation of the loaded rule groups
//! - **Replay**: per-group virtual clock, rule groups evaluated on their
//!   own interval grid, alert snapshots at the asserted instants
//! - **Assertions**: order-insensitive multiset comparison with
//!   absolute-plus-relative float tolerance and exact annotation matching
//! - **Reports**: plain-text failure blocks with an optional unified diff
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//!
//! use ruletest_harness::{RunConfig, run_str};
//!
//! let report = run_str(
//!     "
//! tests:
//!   - input_series:
//!       - series: 'up{job=\"api\"}'
//!         values: '1x5'
//!     promql_expr_test:
//!       - expr: count(up)
//!         eval_time: 5m
//!         exp_samples:
//!           - labels: '{}'
//!             value: 1
//! ",
//!     Path::new("."),
//!     "inline.yml",
//!     &RunConfig::default(),
//! );
//! assert!(report.passed());
//! ```

#![doc(html_root_url = "https://docs.rs/ruletest-harness/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod assert;
pub mod document;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod schedule;

pub use assert::{CheckOutcome, FailureDetail, Tolerance, check_alert, check_query};
pub use document::{
    AlertAssertion, ExpectedAlert, ExpectedSample, InputSeries, QueryAssertion, TestDocument,
    TestGroup, load_document, parse_document,
};
pub use error::{HarnessError, Result};
pub use orchestrator::{GroupTimeline, replay};
pub use report::{
    AssertionFailure, AssertionKind, FileReport, format_file_report, format_summary, unified_diff,
};
pub use ruletest_series::CompactDuration;
pub use runner::{RunConfig, RunSummary, run_document, run_file, run_files, run_reader, run_str};
pub use schedule::order_groups;
