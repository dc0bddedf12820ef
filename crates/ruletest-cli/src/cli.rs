//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Deterministic unit testing for monitoring rule files.
#[derive(Parser, Debug, Clone)]
#[command(name = "rtest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Plain-text report blocks.
    #[default]
    Text,
    /// JSON summary for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run rule-test files and report failures.
    Test(TestArgs),
}

/// Arguments for the test command.
#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// Test files to run.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Run only test groups with this name; repeatable.
    #[arg(long = "run", value_name = "NAME")]
    pub run: Vec<String>,

    /// Show a unified diff under each failed assertion.
    #[arg(long)]
    pub diff: bool,

    /// Output format for reports.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}
