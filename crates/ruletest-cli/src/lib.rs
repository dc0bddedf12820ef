//! # ruletest-cli
//!
//! Command-line interface for the rule-test runner.
//!
//! The `rtest` binary wraps `ruletest-harness`: the `test` subcommand runs
//! one or more test files, prints one report block per file to stdout, and
//! exits non-zero when any file fails. `--format json` swaps the report
//! blocks for a machine-readable summary. Logs go to stderr, filtered by
//! the `RULETEST_LOG` environment variable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, TestArgs};
pub use commands::TestCommand;
pub use error::CliError;
pub use output::{JsonFailure, JsonFileReport, JsonSummary};
