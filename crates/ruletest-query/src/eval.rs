//! Instant-query evaluation against a sample store.
//!
//! Evaluation is deterministic: selector results follow the store's sorted
//! series order and aggregation groups are emitted in sorted label order, so
//! repeated runs over the same store produce identical result sets.

use std::collections::BTreeMap;

use ruletest_series::{Labels, SampleStore, SampleValue};
use tracing::trace;

use crate::ast::{AggOp, BinOp, Expr, RangeFunc, VectorSelector};
use crate::error::{QueryError, Result};
use crate::parser::parse;

/// Default lookback window for instant lookups, in milliseconds.
pub const DEFAULT_LOOKBACK_MS: i64 = 300_000;

/// One row of an instant-query result set.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The row's label set.
    pub labels: Labels,
    /// The result timestamp (the evaluation instant), in milliseconds.
    pub timestamp_ms: i64,
    /// The scalar or histogram value.
    pub value: SampleValue,
}

/// Either result shape an expression can produce.
enum Evaluated {
    Scalar(f64),
    Vector(Vec<QueryResult>),
}

/// Evaluates expressions against a [`SampleStore`] at an instant.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    lookback_ms: i64,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    /// Creates an engine with the default 5-minute lookback window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lookback_ms: DEFAULT_LOOKBACK_MS,
        }
    }

    /// Creates an engine with a custom lookback window.
    #[must_use]
    pub fn with_lookback(lookback_ms: i64) -> Self {
        Self { lookback_ms }
    }

    /// The configured lookback window in milliseconds.
    #[must_use]
    pub const fn lookback_ms(&self) -> i64 {
        self.lookback_ms
    }

    /// Parses and evaluates `expr` at `at_ms`.
    ///
    /// A scalar-typed expression yields a single row with an empty label
    /// set.
    pub fn query(
        &self,
        store: &SampleStore,
        expr: &str,
        at_ms: i64,
    ) -> Result<Vec<QueryResult>> {
        let parsed = parse(expr)?;
        trace!(expr, at_ms, "evaluating instant query");
        self.evaluate(store, &parsed, at_ms)
    }

    /// Evaluates a pre-parsed expression at `at_ms`.
    pub fn evaluate(
        &self,
        store: &SampleStore,
        expr: &Expr,
        at_ms: i64,
    ) -> Result<Vec<QueryResult>> {
        match self.eval_inner(store, expr, at_ms)? {
            Evaluated::Scalar(value) => Ok(vec![QueryResult {
                labels: Labels::new(),
                timestamp_ms: at_ms,
                value: SampleValue::Float(value),
            }]),
            Evaluated::Vector(rows) => Ok(rows),
        }
    }

    fn eval_inner(&self, store: &SampleStore, expr: &Expr, at_ms: i64) -> Result<Evaluated> {
        match expr {
            Expr::Number(value) => Ok(Evaluated::Scalar(*value)),
            Expr::Selector(selector) => {
                Ok(Evaluated::Vector(self.eval_selector(store, selector, at_ms)))
            }
            Expr::RangeCall {
                func,
                selector,
                range,
            } => Ok(Evaluated::Vector(self.eval_range(
                store,
                *func,
                selector,
                range.millis(),
                at_ms,
            )?)),
            Expr::Timestamp(arg) => {
                Ok(Evaluated::Vector(self.eval_timestamp(store, arg, at_ms)?))
            }
            Expr::VectorLift(arg) => {
                let value = self.eval_scalar(store, arg, at_ms)?;
                Ok(Evaluated::Vector(vec![QueryResult {
                    labels: Labels::new(),
                    timestamp_ms: at_ms,
                    value: SampleValue::Float(value),
                }]))
            }
            Expr::Aggregate { op, by, arg } => {
                let rows = self.eval_vector(store, arg, at_ms)?;
                Ok(Evaluated::Vector(aggregate(*op, by, rows, at_ms)?))
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval_inner(store, lhs, at_ms)?;
                let rhs = self.eval_inner(store, rhs, at_ms)?;
                eval_binary(*op, lhs, rhs)
            }
            Expr::Neg(inner) => match self.eval_inner(store, inner, at_ms)? {
                Evaluated::Scalar(value) => Ok(Evaluated::Scalar(-value)),
                Evaluated::Vector(rows) => {
                    let negated = rows
                        .into_iter()
                        .map(|row| {
                            let value = float_value(&row.value, "negating")?;
                            Ok(QueryResult {
                                labels: row.labels.without_metric(),
                                timestamp_ms: row.timestamp_ms,
                                value: SampleValue::Float(-value),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Evaluated::Vector(negated))
                }
            },
        }
    }

    /// Evaluates an expression that must be vector-typed.
    fn eval_vector(
        &self,
        store: &SampleStore,
        expr: &Expr,
        at_ms: i64,
    ) -> Result<Vec<QueryResult>> {
        match self.eval_inner(store, expr, at_ms)? {
            Evaluated::Vector(rows) => Ok(rows),
            Evaluated::Scalar(_) => Err(QueryError::Unsupported {
                reason: "expected a vector expression".to_string(),
            }),
        }
    }

    /// Evaluates an expression that must be scalar-typed.
    fn eval_scalar(&self, store: &SampleStore, expr: &Expr, at_ms: i64) -> Result<f64> {
        match self.eval_inner(store, expr, at_ms)? {
            Evaluated::Scalar(value) => Ok(value),
            Evaluated::Vector(_) => Err(QueryError::Unsupported {
                reason: "expected a scalar expression".to_string(),
            }),
        }
    }

    fn eval_selector(
        &self,
        store: &SampleStore,
        selector: &VectorSelector,
        at_ms: i64,
    ) -> Vec<QueryResult> {
        let mut rows = Vec::new();
        for labels in store.series() {
            if !selector.matches(&labels) {
                continue;
            }
            if let Some(sample) = store.latest(&labels, at_ms, self.lookback_ms) {
                rows.push(QueryResult {
                    labels,
                    timestamp_ms: at_ms,
                    value: sample.value,
                });
            }
        }
        rows
    }

    fn eval_range(
        &self,
        store: &SampleStore,
        func: RangeFunc,
        selector: &VectorSelector,
        range_ms: i64,
        at_ms: i64,
    ) -> Result<Vec<QueryResult>> {
        let mut rows = Vec::new();
        for labels in store.series() {
            if !selector.matches(&labels) {
                continue;
            }
            let samples = store.window(&labels, at_ms - range_ms, at_ms);
            if samples.is_empty() {
                continue;
            }

            let value = match func {
                RangeFunc::CountOverTime => Some(samples.len() as f64),
                RangeFunc::SumOverTime
                | RangeFunc::AvgOverTime
                | RangeFunc::MinOverTime
                | RangeFunc::MaxOverTime => {
                    let mut sum = 0.0;
                    let mut min = f64::INFINITY;
                    let mut max = f64::NEG_INFINITY;
                    for sample in &samples {
                        let v = float_value(&sample.value, func.name())?;
                        sum += v;
                        min = min.min(v);
                        max = max.max(v);
                    }
                    Some(match func {
                        RangeFunc::SumOverTime => sum,
                        RangeFunc::AvgOverTime => sum / samples.len() as f64,
                        RangeFunc::MinOverTime => min,
                        _ => max,
                    })
                }
                RangeFunc::Rate | RangeFunc::Increase => {
                    rate_value(func, &samples)?
                }
            };

            if let Some(value) = value {
                rows.push(QueryResult {
                    labels: labels.without_metric(),
                    timestamp_ms: at_ms,
                    value: SampleValue::Float(value),
                });
            }
        }
        Ok(rows)
    }

    /// `timestamp()` over a plain selector reports the underlying sample's
    /// own timestamp, which is how lookback age becomes observable; over a
    /// computed vector every sample is synthesized at the evaluation
    /// instant.
    fn eval_timestamp(
        &self,
        store: &SampleStore,
        arg: &Expr,
        at_ms: i64,
    ) -> Result<Vec<QueryResult>> {
        if let Expr::Selector(selector) = arg {
            let mut rows = Vec::new();
            for labels in store.series() {
                if !selector.matches(&labels) {
                    continue;
                }
                if let Some(sample) = store.latest(&labels, at_ms, self.lookback_ms) {
                    rows.push(QueryResult {
                        labels: labels.without_metric(),
                        timestamp_ms: at_ms,
                        value: SampleValue::Float(sample.timestamp_ms as f64 / 1000.0),
                    });
                }
            }
            return Ok(rows);
        }

        let rows = self.eval_vector(store, arg, at_ms)?;
        Ok(rows
            .into_iter()
            .map(|row| QueryResult {
                labels: row.labels.without_metric(),
                timestamp_ms: row.timestamp_ms,
                value: SampleValue::Float(at_ms as f64 / 1000.0),
            })
            .collect())
    }
}

/// Delta-based rate/increase over the samples actually present in the
/// window. Returns `None` (no output row) when fewer than two samples exist
/// or they share one timestamp.
fn rate_value(func: RangeFunc, samples: &[ruletest_series::Sample]) -> Result<Option<f64>> {
    if samples.len() < 2 {
        return Ok(None);
    }
    let first = &samples[0];
    let last = &samples[samples.len() - 1];
    let span_ms = last.timestamp_ms - first.timestamp_ms;
    if span_ms == 0 {
        return Ok(None);
    }
    let delta = float_value(&last.value, func.name())? - float_value(&first.value, func.name())?;
    let value = match func {
        RangeFunc::Rate => delta / (span_ms as f64 / 1000.0),
        _ => delta,
    };
    Ok(Some(value))
}

fn aggregate(
    op: AggOp,
    by: &[String],
    rows: Vec<QueryResult>,
    at_ms: i64,
) -> Result<Vec<QueryResult>> {
    let mut groups: BTreeMap<Labels, Vec<f64>> = BTreeMap::new();
    for row in rows {
        let value = float_value(&row.value, op.name())?;
        groups
            .entry(row.labels.restricted(by))
            .or_default()
            .push(value);
    }

    let mut out = Vec::with_capacity(groups.len());
    for (labels, values) in groups {
        let value = match op {
            AggOp::Sum => values.iter().sum(),
            AggOp::Count => values.len() as f64,
            AggOp::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        out.push(QueryResult {
            labels,
            timestamp_ms: at_ms,
            value: SampleValue::Float(value),
        });
    }
    Ok(out)
}

fn eval_binary(op: BinOp, lhs: Evaluated, rhs: Evaluated) -> Result<Evaluated> {
    match (lhs, rhs) {
        (Evaluated::Scalar(a), Evaluated::Scalar(b)) => {
            if op.is_comparison() {
                return Err(QueryError::Unsupported {
                    reason: "comparison between two scalars".to_string(),
                });
            }
            Ok(Evaluated::Scalar(arithmetic(op, a, b)))
        }
        (Evaluated::Vector(rows), Evaluated::Scalar(scalar)) => {
            binary_rows(op, rows, scalar, false)
        }
        (Evaluated::Scalar(scalar), Evaluated::Vector(rows)) => {
            binary_rows(op, rows, scalar, true)
        }
        (Evaluated::Vector(_), Evaluated::Vector(_)) => Err(QueryError::Unsupported {
            reason: "binary operation between two vectors".to_string(),
        }),
    }
}

/// Applies a vector/scalar binary operation. Comparisons filter the vector
/// and keep its labels (metric name included); arithmetic rewrites values
/// and drops the metric name.
fn binary_rows(
    op: BinOp,
    rows: Vec<QueryResult>,
    scalar: f64,
    scalar_on_left: bool,
) -> Result<Evaluated> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let value = float_value(&row.value, op.symbol())?;
        let (a, b) = if scalar_on_left {
            (scalar, value)
        } else {
            (value, scalar)
        };
        if op.is_comparison() {
            if compare(op, a, b) {
                out.push(row);
            }
        } else {
            out.push(QueryResult {
                labels: row.labels.without_metric(),
                timestamp_ms: row.timestamp_ms,
                value: SampleValue::Float(arithmetic(op, a, b)),
            });
        }
    }
    Ok(Evaluated::Vector(out))
}

fn arithmetic(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        // Comparisons never reach here; they filter in binary_rows.
        _ => f64::NAN,
    }
}

// Comparison filters use exact float equality.
#[allow(clippy::float_cmp)]
fn compare(op: BinOp, a: f64, b: f64) -> bool {
    match op {
        BinOp::Eq => a == b,
        BinOp::Ne => a != b,
        BinOp::Gt => a > b,
        BinOp::Lt => a < b,
        BinOp::Ge => a >= b,
        BinOp::Le => a <= b,
        _ => false,
    }
}

fn float_value(value: &SampleValue, context: &str) -> Result<f64> {
    value.as_float().ok_or_else(|| QueryError::Unsupported {
        reason: format!("{context} over histogram samples"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruletest_series::SparseHistogram;

    fn store_with(series: &[(&str, &str)]) -> SampleStore {
        let store = SampleStore::new();
        for (selector, values) in series {
            store.seed_series(selector, values, 60_000, 16).unwrap();
        }
        store
    }

    fn single_float(rows: &[QueryResult]) -> f64 {
        assert_eq!(rows.len(), 1, "expected one row, got {rows:?}");
        match rows[0].value {
            SampleValue::Float(v) => v,
            ref other => panic!("expected float, got {other:?}"),
        }
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn selector_returns_value_at_tick() {
            let store = store_with(&[("up{job=\"api\"}", "0+10x9")]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "up", 300_000).unwrap();
            assert_eq!(single_float(&rows), 50.0);
            assert_eq!(rows[0].labels.metric(), Some("up"));
            assert_eq!(rows[0].labels.get("job"), Some("api"));
            assert_eq!(rows[0].timestamp_ms, 300_000);
        }

        #[test]
        fn lookback_expires_after_five_minutes() {
            let store = store_with(&[("m", "1")]);
            let engine = QueryEngine::new();
            assert_eq!(engine.query(&store, "m", 300_000).unwrap().len(), 1);
            assert!(engine.query(&store, "m", 300_001).unwrap().is_empty());
        }

        #[test]
        fn custom_lookback_is_honored() {
            let store = store_with(&[("m", "1")]);
            let engine = QueryEngine::with_lookback(60_000);
            assert_eq!(engine.query(&store, "m", 60_000).unwrap().len(), 1);
            assert!(engine.query(&store, "m", 60_001).unwrap().is_empty());
        }

        #[test]
        fn stale_marker_hides_the_series() {
            let store = store_with(&[("m", "0 stale")]);
            let engine = QueryEngine::new();
            assert_eq!(single_float(&engine.query(&store, "m", 59_000).unwrap()), 0.0);
            assert!(engine.query(&store, "m", 60_000).unwrap().is_empty());
        }

        #[test]
        fn regex_matcher_filters_series() {
            let store = store_with(&[("up{job=\"api\"}", "1"), ("up{job=\"db\"}", "3")]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "up{job=~\"a.*\"}", 0).unwrap();
            assert_eq!(single_float(&rows), 1.0);
        }

        #[test]
        fn missing_label_matches_empty_value() {
            let store = store_with(&[("up{job=\"api\"}", "1"), ("up{job=\"db\"}", "3")]);
            let engine = QueryEngine::new();
            assert_eq!(engine.query(&store, "up{env=\"\"}", 0).unwrap().len(), 2);
            assert!(engine.query(&store, "up{env!=\"\"}", 0).unwrap().is_empty());
        }

        #[test]
        fn rows_follow_sorted_series_order() {
            let store = store_with(&[("up{job=\"db\"}", "3"), ("up{job=\"api\"}", "1")]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "up", 0).unwrap();
            assert_eq!(rows[0].labels.get("job"), Some("api"));
            assert_eq!(rows[1].labels.get("job"), Some("db"));
        }
    }

    mod range_tests {
        use super::*;

        #[test]
        fn count_over_time_includes_both_window_edges() {
            let store = store_with(&[("m", "1x60")]);
            let engine = QueryEngine::new();
            let rows = engine
                .query(&store, "count_over_time(m[1h])", 3_600_000)
                .unwrap();
            assert_eq!(single_float(&rows), 61.0);
            assert!(rows[0].labels.is_empty());
        }

        #[test]
        fn rate_is_per_second_over_the_sample_span() {
            let store = store_with(&[("req", "0+60x10")]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "rate(req[10m])", 600_000).unwrap();
            assert!((single_float(&rows) - 1.0).abs() < 1e-12);
        }

        #[test]
        fn increase_is_the_span_delta() {
            let store = store_with(&[("req", "0+60x10")]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "increase(req[10m])", 600_000).unwrap();
            assert!((single_float(&rows) - 600.0).abs() < 1e-12);
        }

        #[test]
        fn rate_needs_at_least_two_samples() {
            let store = store_with(&[("m", "1")]);
            let engine = QueryEngine::new();
            assert!(engine.query(&store, "rate(m[5m])", 60_000).unwrap().is_empty());
        }

        #[test]
        fn over_time_family() {
            let store = store_with(&[("m", "1 2 3")]);
            let engine = QueryEngine::new();
            for (expr, expected) in [
                ("sum_over_time(m[5m])", 6.0),
                ("avg_over_time(m[5m])", 2.0),
                ("min_over_time(m[5m])", 1.0),
                ("max_over_time(m[5m])", 3.0),
            ] {
                let rows = engine.query(&store, expr, 120_000).unwrap();
                assert!(
                    (single_float(&rows) - expected).abs() < 1e-12,
                    "for {expr}"
                );
            }
        }

        #[test]
        fn empty_window_yields_no_rows() {
            let store = store_with(&[("m", "1")]);
            let engine = QueryEngine::new();
            let rows = engine
                .query(&store, "count_over_time(m[1m])", 600_000)
                .unwrap();
            assert!(rows.is_empty());
        }
    }

    mod timestamp_tests {
        use super::*;

        #[test]
        fn timestamp_reports_sample_time_in_seconds() {
            let store = store_with(&[("m", "0 _ _ _ _ _ _ 0")]);
            let engine = QueryEngine::new();

            let rows = engine.query(&store, "timestamp(m)", 300_000).unwrap();
            assert_eq!(single_float(&rows), 0.0);
            assert!(rows[0].labels.is_empty());

            assert!(engine.query(&store, "timestamp(m)", 301_000).unwrap().is_empty());

            let late = engine.query(&store, "timestamp(m)", 420_000).unwrap();
            assert_eq!(single_float(&late), 420.0);
        }

        #[test]
        fn timestamp_of_computed_vector_is_the_instant() {
            let store = SampleStore::new();
            let engine = QueryEngine::new();
            let rows = engine
                .query(&store, "timestamp(vector(0))", 60_000)
                .unwrap();
            assert_eq!(single_float(&rows), 60.0);
        }
    }

    mod scalar_tests {
        use super::*;

        #[test]
        fn scalar_expression_yields_one_labelless_row() {
            let store = SampleStore::new();
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "1 + 2 * 3", 0).unwrap();
            assert_eq!(single_float(&rows), 7.0);
            assert!(rows[0].labels.is_empty());
        }

        #[test]
        fn vector_lift_produces_a_labelless_series() {
            let store = SampleStore::new();
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "vector(3)", 0).unwrap();
            assert_eq!(single_float(&rows), 3.0);
            assert!(rows[0].labels.is_empty());
        }

        #[test]
        fn unary_minus_on_scalars() {
            let store = SampleStore::new();
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "-1 + 2", 0).unwrap();
            assert_eq!(single_float(&rows), 1.0);
        }
    }

    mod aggregation_tests {
        use super::*;

        fn two_jobs() -> SampleStore {
            store_with(&[("up{job=\"api\"}", "1"), ("up{job=\"db\"}", "3")])
        }

        #[test]
        fn sum_collapses_to_one_group() {
            let engine = QueryEngine::new();
            let rows = engine.query(&two_jobs(), "sum(up)", 0).unwrap();
            assert_eq!(single_float(&rows), 4.0);
            assert!(rows[0].labels.is_empty());
        }

        #[test]
        fn sum_by_keeps_group_labels() {
            let engine = QueryEngine::new();
            let rows = engine.query(&two_jobs(), "sum by (job) (up)", 0).unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].labels.get("job"), Some("api"));
            assert_eq!(rows[1].labels.get("job"), Some("db"));
            assert_eq!(rows[0].labels.metric(), None);
        }

        #[test]
        fn count_avg_min_max() {
            let engine = QueryEngine::new();
            let store = two_jobs();
            for (expr, expected) in [
                ("count(up)", 2.0),
                ("avg(up)", 2.0),
                ("min(up)", 1.0),
                ("max(up)", 3.0),
            ] {
                let rows = engine.query(&store, expr, 0).unwrap();
                assert!(
                    (single_float(&rows) - expected).abs() < f64::EPSILON,
                    "for {expr}"
                );
            }
        }

        #[test]
        fn aggregation_over_range_call() {
            let store = store_with(&[
                ("req{job=\"api\"}", "0+60x10"),
                ("req{job=\"db\"}", "0+120x10"),
            ]);
            let engine = QueryEngine::new();
            let rows = engine
                .query(&store, "sum(rate(req[10m]))", 600_000)
                .unwrap();
            assert!((single_float(&rows) - 3.0).abs() < 1e-12);
        }
    }

    mod binary_tests {
        use super::*;

        fn two_jobs() -> SampleStore {
            store_with(&[("up{job=\"api\"}", "1"), ("up{job=\"db\"}", "3")])
        }

        #[test]
        fn arithmetic_drops_the_metric_name() {
            let engine = QueryEngine::new();
            let rows = engine.query(&two_jobs(), "up * 2", 0).unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].labels.metric(), None);
            assert_eq!(rows[0].value.as_float(), Some(2.0));
            assert_eq!(rows[1].value.as_float(), Some(6.0));
        }

        #[test]
        fn comparison_filters_and_keeps_labels() {
            let engine = QueryEngine::new();
            let rows = engine.query(&two_jobs(), "up > 2", 0).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].labels.metric(), Some("up"));
            assert_eq!(rows[0].labels.get("job"), Some("db"));
            assert_eq!(rows[0].value.as_float(), Some(3.0));
        }

        #[test]
        fn scalar_on_the_left_of_a_comparison() {
            let engine = QueryEngine::new();
            let rows = engine.query(&two_jobs(), "2 < up", 0).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].labels.get("job"), Some("db"));
        }

        #[test]
        fn scalar_on_the_left_of_subtraction() {
            let store = store_with(&[("m", "1")]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "10 - m", 0).unwrap();
            assert_eq!(single_float(&rows), 9.0);
        }

        #[test]
        fn vector_to_vector_operations_are_unsupported() {
            let engine = QueryEngine::new();
            match engine.query(&two_jobs(), "up + up", 0) {
                Err(QueryError::Unsupported { .. }) => {}
                other => panic!("expected unsupported, got {other:?}"),
            }
        }

        #[test]
        fn equality_filter_passes_exact_matches() {
            let engine = QueryEngine::new();
            let rows = engine.query(&two_jobs(), "up == 1", 0).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].labels.get("job"), Some("api"));
        }
    }

    mod histogram_tests {
        use super::*;

        #[test]
        fn selector_returns_histogram_values() {
            let store = store_with(&[("h", "{{schema:0 sum:3 count:2 buckets:[2]}}")]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "h", 0).unwrap();
            assert_eq!(rows.len(), 1);
            let hist = rows[0].value.as_histogram().unwrap();
            assert!((hist.sum - 3.0).abs() < f64::EPSILON);
            assert!((hist.count - 2.0).abs() < f64::EPSILON);
        }

        #[test]
        fn additive_pattern_accumulates_by_tick() {
            let store = store_with(&[(
                "h",
                "{{sum:3 count:2 buckets:[2]}}+{{sum:1.3 count:1.1 buckets:[1.1]}}x4",
            )]);
            let engine = QueryEngine::new();
            let rows = engine.query(&store, "h", 60_000).unwrap();
            let expected =
                SparseHistogram::parse("{{sum:4.3 count:3.1 buckets:[3.1]}}").unwrap();
            let actual = rows[0].value.as_histogram().unwrap();
            assert!(actual.approx_eq(&expected, 1e-9, 1e-6));
        }

        #[test]
        fn histograms_cannot_be_aggregated() {
            let store = store_with(&[("h", "{{sum:3 count:2 buckets:[2]}}")]);
            let engine = QueryEngine::new();
            match engine.query(&store, "sum(h)", 0) {
                Err(QueryError::Unsupported { .. }) => {}
                other => panic!("expected unsupported, got {other:?}"),
            }
        }

        #[test]
        fn histograms_cannot_be_scaled() {
            let store = store_with(&[("h", "{{sum:3 count:2 buckets:[2]}}")]);
            let engine = QueryEngine::new();
            match engine.query(&store, "h * 2", 0) {
                Err(QueryError::Unsupported { .. }) => {}
                other => panic!("expected unsupported, got {other:?}"),
            }
        }
    }
}
