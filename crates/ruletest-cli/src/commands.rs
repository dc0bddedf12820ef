//! Command implementations.

use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use ruletest_harness::{RunConfig, format_file_report, format_summary, run_files};

use crate::cli::{Format, TestArgs};
use crate::error::CliError;
use crate::output::JsonSummary;

/// Test command executor.
pub struct TestCommand {
    files: Vec<PathBuf>,
    format: Format,
    config: RunConfig,
}

impl TestCommand {
    /// Builds the command from parsed arguments.
    #[must_use]
    pub fn new(args: &TestArgs) -> Self {
        Self {
            files: args.files.clone(),
            format: args.format,
            config: RunConfig {
                diff: args.diff,
                run_filters: args.run.clone(),
                ..RunConfig::default()
            },
        }
    }

    /// Runs every test file and writes the report in the chosen format.
    ///
    /// Returns the number of failed files, which drives the exit code.
    ///
    /// # Errors
    ///
    /// Returns an error when writing to `writer` or encoding the JSON
    /// summary fails.
    pub fn execute<W: Write>(&self, writer: &mut W) -> Result<usize, CliError> {
        let summary = run_files(&self.files, &self.config);
        match self.format {
            Format::Text => {
                for report in &summary.reports {
                    writer.write_all(format_file_report(report, self.config.diff).as_bytes())?;
                }
                writer.write_all(
                    format_summary(summary.reports.len(), summary.failed_files()).as_bytes(),
                )?;
            }
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, &JsonSummary::from(&summary))?;
                writeln!(writer)?;
            }
        }
        debug!(
            files = summary.reports.len(),
            failed = summary.failed_files(),
            "test run finished"
        );
        Ok(summary.failed_files())
    }
}
