//! Serde model for rule-test documents.
//!
//! A test document names the rule files under test, fixes the virtual
//! clock, and lists test groups. Each group seeds synthetic input series
//! and asserts on query results or firing alerts at chosen instants.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use ruletest_series::{CompactDuration, Labels};

use crate::error::{HarnessError, Result};

/// A whole test file: referenced rule files, the default clock interval,
/// an optional explicit group order, and the test groups themselves.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestDocument {
    /// Paths of rule files to load, relative to the test file's directory.
    #[serde(default)]
    pub rule_files: Vec<String>,

    /// Evaluation interval for rule groups that do not set their own.
    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval: CompactDuration,

    /// Explicit total order for the loaded rule groups. When empty, groups
    /// keep load order: rule-file order, then declaration order within a
    /// file.
    #[serde(default)]
    pub group_eval_order: Vec<String>,

    /// The test groups to run.
    #[serde(default)]
    pub tests: Vec<TestGroup>,
}

fn default_evaluation_interval() -> CompactDuration {
    CompactDuration::from_millis(60_000)
}

/// One test group: inputs, assertions, and the template context shared by
/// every rule evaluated inside it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestGroup {
    /// Optional name, used by run filters and in failure reports.
    #[serde(default)]
    pub name: Option<String>,

    /// Clock tick for this group. Defaults to the document's
    /// `evaluation_interval`.
    #[serde(default)]
    pub interval: Option<CompactDuration>,

    /// Synthetic input series seeded into the store before replay.
    #[serde(default)]
    pub input_series: Vec<InputSeries>,

    /// Query assertions, checked against the fully replayed store.
    #[serde(default)]
    pub promql_expr_test: Vec<QueryAssertion>,

    /// Alert assertions, checked against snapshots taken during replay.
    #[serde(default)]
    pub alert_rule_test: Vec<AlertAssertion>,

    /// Labels exposed to annotation templates as `$externalLabels`.
    #[serde(default)]
    pub external_labels: Labels,

    /// Value exposed to annotation templates as `$externalURL`.
    #[serde(default)]
    pub external_url: String,
}

impl TestGroup {
    /// Name used in reports and matched by run filters.
    #[must_use]
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("group {index}"))
    }

    /// Clock tick in milliseconds, falling back to the document default.
    #[must_use]
    pub fn tick_interval_ms(&self, default_ms: i64) -> i64 {
        self.interval.map_or(default_ms, |interval| interval.millis())
    }

    /// Latest instant any assertion in this group looks at. Replay stops
    /// once the clock passes it.
    #[must_use]
    pub fn last_assert_ms(&self) -> i64 {
        let queries = self
            .promql_expr_test
            .iter()
            .map(|assertion| assertion.eval_time.millis());
        let alerts = self
            .alert_rule_test
            .iter()
            .map(|assertion| assertion.eval_time.millis());
        queries.chain(alerts).max().unwrap_or(0)
    }
}

/// One synthetic input series: a selector plus a value pattern.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSeries {
    /// Series selector, e.g. `up{job="prometheus", instance="localhost:9090"}`.
    pub series: String,

    /// Space-separated value pattern, e.g. `0+1x10 stale 3`.
    #[serde(deserialize_with = "string_or_number")]
    pub values: String,
}

/// One query assertion: an expression, an instant, and the expected rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryAssertion {
    /// Query to evaluate against the replayed store.
    pub expr: String,

    /// Instant on the virtual clock to evaluate at.
    pub eval_time: CompactDuration,

    /// Expected result rows, in any order.
    #[serde(default)]
    pub exp_samples: Vec<ExpectedSample>,
}

/// One expected result row of a query assertion.
///
/// Exactly one of `value` and `histogram` must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedSample {
    /// Expected label set in selector syntax; empty means no labels.
    #[serde(default)]
    pub labels: String,

    /// Expected float value.
    #[serde(default)]
    pub value: Option<f64>,

    /// Expected native histogram in compact text form.
    #[serde(default)]
    pub histogram: Option<String>,
}

/// One alert assertion: the instances expected to fire for an alert name
/// at an instant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertAssertion {
    /// Instant on the virtual clock to check at.
    pub eval_time: CompactDuration,

    /// Alert name to collect firing instances for.
    pub alertname: String,

    /// Expected firing instances; empty means the alert must not fire.
    #[serde(default)]
    pub exp_alerts: Vec<ExpectedAlert>,
}

/// One expected firing instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedAlert {
    /// Expected labels. `alertname` is filled in from the assertion, so a
    /// bare `- {}` entry expects one instance with only the alert name.
    #[serde(default)]
    pub exp_labels: BTreeMap<String, String>,

    /// Expected annotations after template expansion.
    #[serde(default)]
    pub exp_annotations: BTreeMap<String, String>,
}

/// YAML writes a single bare sample (`values: 1`) as a number, not a
/// string. Accept both spellings.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => format!("{number}"),
    })
}

/// Parses a test document from YAML text and validates its structure.
///
/// # Errors
///
/// Returns [`HarnessError::Yaml`] when the text is not valid YAML or does
/// not match the schema, and [`HarnessError::InvalidDocument`] when a
/// field has an out-of-range value.
pub fn parse_document(text: &str) -> Result<TestDocument> {
    let document: TestDocument = serde_yaml::from_str(text)?;
    validate(&document)?;
    Ok(document)
}

/// Reads and parses a test document from disk.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] when the file cannot be read, plus every
/// error [`parse_document`] can return.
pub fn load_document(path: &Path) -> Result<TestDocument> {
    let text = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let document = parse_document(&text)?;
    debug!(
        path = %path.display(),
        groups = document.tests.len(),
        "loaded test document"
    );
    Ok(document)
}

fn validate(document: &TestDocument) -> Result<()> {
    if document.evaluation_interval.is_zero() {
        return Err(HarnessError::InvalidDocument {
            reason: "evaluation_interval must be positive".to_string(),
        });
    }
    for (index, group) in document.tests.iter().enumerate() {
        let name = group.display_name(index);
        if group.interval.is_some_and(|interval| interval.is_zero()) {
            return Err(HarnessError::InvalidDocument {
                reason: format!("interval must be positive in {name}"),
            });
        }
        for assertion in &group.promql_expr_test {
            for sample in &assertion.exp_samples {
                match (sample.value, &sample.histogram) {
                    (Some(_), Some(_)) => {
                        return Err(HarnessError::InvalidDocument {
                            reason: format!(
                                "an expected sample for '{}' sets both value and histogram in {name}",
                                assertion.expr
                            ),
                        });
                    }
                    (None, None) => {
                        return Err(HarnessError::InvalidDocument {
                            reason: format!(
                                "an expected sample for '{}' sets neither value nor histogram in {name}",
                                assertion.expr
                            ),
                        });
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}
