//! Expected-vs-actual comparison for query and alert assertions.
//!
//! Result rows and firing sets are compared as multisets keyed by label
//! set: declaration order never matters, every expected row must be
//! matched, and every actual row must be accounted for. Float values
//! compare under a configurable absolute-plus-relative tolerance;
//! histograms compare field-wise under the same rule; alert annotations
//! compare exactly.

use std::collections::BTreeMap;

use ruletest_query::QueryEngine;
use ruletest_rules::{ALERT_NAME_LABEL, AlertInstance};
use ruletest_series::{Labels, SampleStore, SampleValue, SparseHistogram};

use crate::document::{AlertAssertion, ExpectedSample, QueryAssertion};
use crate::error::Result;

/// Comparison tolerance for float and histogram values.
///
/// Two values match when `|a − b| ≤ max(abs, rel · max(|a|, |b|))`.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Absolute epsilon.
    pub abs: f64,
    /// Relative epsilon.
    pub rel: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            abs: 1e-9,
            rel: 1e-6,
        }
    }
}

/// Outcome of checking one assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Expected and actual agree.
    Pass,
    /// They differ; the detail says how.
    Fail(FailureDetail),
}

impl CheckOutcome {
    /// True for [`CheckOutcome::Pass`].
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// What a failed assertion expected and what it got, rendered one line
/// per row and sorted for stable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    /// Short description of the failure class.
    pub summary: String,
    /// Rendered expected rows.
    pub expected: Vec<String>,
    /// Rendered actual rows.
    pub actual: Vec<String>,
}

/// Checks one query assertion against the replayed store.
///
/// A query that fails to parse or evaluate is an assertion failure, not
/// an error: the test asserted something about an expression that has no
/// result.
///
/// # Errors
///
/// Returns [`HarnessError::Series`](crate::HarnessError::Series) when an
/// expected sample's labels or histogram literal are malformed. That is
/// a defect in the test document itself and aborts the group.
pub fn check_query(
    engine: &QueryEngine,
    store: &SampleStore,
    assertion: &QueryAssertion,
    tolerance: Tolerance,
) -> Result<CheckOutcome> {
    let expected = expected_samples(&assertion.exp_samples)?;
    let expected_lines = render_sorted(
        expected
            .iter()
            .map(|(labels, value)| render_sample(labels, value)),
    );

    let rows = match engine.query(store, &assertion.expr, assertion.eval_time.millis()) {
        Ok(rows) => rows,
        Err(err) => {
            return Ok(CheckOutcome::Fail(FailureDetail {
                summary: format!("query failed: {err}"),
                expected: expected_lines,
                actual: Vec::new(),
            }));
        }
    };
    let actual: Vec<(Labels, SampleValue)> = rows
        .into_iter()
        .map(|row| (row.labels, row.value))
        .collect();

    if multiset_matches(&expected, &actual, |want, got| {
        want.approx_eq(got, tolerance.abs, tolerance.rel)
    }) {
        return Ok(CheckOutcome::Pass);
    }
    Ok(CheckOutcome::Fail(FailureDetail {
        summary: "unexpected result set".to_string(),
        expected: expected_lines,
        actual: render_sorted(
            actual
                .iter()
                .map(|(labels, value)| render_sample(labels, value)),
        ),
    }))
}

/// Checks one alert assertion against the firing set snapshotted for it.
///
/// The expected labels are completed with the assertion's `alertname`
/// before matching, so test documents never repeat it. An empty
/// `exp_alerts` list expects an empty firing set.
#[must_use]
pub fn check_alert(firing: &[AlertInstance], assertion: &AlertAssertion) -> CheckOutcome {
    let expected: Vec<(Labels, BTreeMap<String, String>)> = assertion
        .exp_alerts
        .iter()
        .map(|alert| {
            let mut labels: Labels = alert
                .exp_labels
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            labels.set(ALERT_NAME_LABEL, &assertion.alertname);
            (labels, alert.exp_annotations.clone())
        })
        .collect();
    let actual: Vec<(Labels, BTreeMap<String, String>)> = firing
        .iter()
        .map(|instance| (instance.labels.clone(), instance.annotations.clone()))
        .collect();

    if multiset_matches(&expected, &actual, |want, got| want == got) {
        return CheckOutcome::Pass;
    }
    CheckOutcome::Fail(FailureDetail {
        summary: "firing alerts do not match".to_string(),
        expected: render_sorted(
            expected
                .iter()
                .map(|(labels, annotations)| render_alert(labels, annotations)),
        ),
        actual: render_sorted(
            actual
                .iter()
                .map(|(labels, annotations)| render_alert(labels, annotations)),
        ),
    })
}

/// Converts the declared expectations into comparable label/value pairs.
fn expected_samples(samples: &[ExpectedSample]) -> Result<Vec<(Labels, SampleValue)>> {
    let mut expected = Vec::with_capacity(samples.len());
    for sample in samples {
        let labels = Labels::parse(&sample.labels)?;
        let value = match (&sample.histogram, sample.value) {
            (Some(literal), _) => SampleValue::Histogram(SparseHistogram::parse(literal)?),
            (None, value) => SampleValue::Float(value.unwrap_or(0.0)),
        };
        expected.push((labels, value));
    }
    Ok(expected)
}

/// True when every expected entry can be paired with a distinct actual
/// entry carrying the same labels and a matching payload.
fn multiset_matches<E, A>(
    expected: &[(Labels, E)],
    actual: &[(Labels, A)],
    ok: impl Fn(&E, &A) -> bool,
) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    let mut used = vec![false; actual.len()];
    'outer: for (labels, want) in expected {
        for (index, (got_labels, got)) in actual.iter().enumerate() {
            if !used[index] && labels == got_labels && ok(want, got) {
                used[index] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

fn render_sorted(lines: impl Iterator<Item = String>) -> Vec<String> {
    let mut rendered: Vec<String> = lines.collect();
    rendered.sort();
    rendered
}

fn render_sample(labels: &Labels, value: &SampleValue) -> String {
    match value {
        SampleValue::Float(number) => format!("{labels} => {number}"),
        SampleValue::Histogram(histogram) => format!("{labels} => {histogram}"),
        SampleValue::Stale => format!("{labels} => stale"),
    }
}

fn render_alert(labels: &Labels, annotations: &BTreeMap<String, String>) -> String {
    if annotations.is_empty() {
        return labels.to_string();
    }
    let rendered: Vec<String> = annotations
        .iter()
        .map(|(name, value)| format!("{name}={value:?}"))
        .collect();
    format!("{labels} annotations {{{}}}", rendered.join(", "))
}
