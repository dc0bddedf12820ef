//! Per-tick rule-group evaluation.
//!
//! A [`GroupEvaluator`] owns one rule group plus the state its alerting
//! rules carry between ticks. Rules run in definition order within a tick:
//! recording outputs are written back to the store immediately, so a later
//! rule's expression sees an earlier rule's result at the same timestamp.
//! Active alert instances additionally surface in the store as the
//! synthetic `ALERTS` series, one row per instance per evaluation, with
//! stale markers closing out rows whose instance resolved or changed
//! state.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use ruletest_query::QueryEngine;
use ruletest_series::{Labels, METRIC_NAME_LABEL, Sample, SampleStore};

use crate::error::{Result, RuleError};
use crate::template::{TemplateContext, expand};
use crate::types::{
    ALERTS_METRIC, ALERT_NAME_LABEL, ALERT_STATE_LABEL, AlertInstance, AlertState, AlertingRule,
    RecordingRule, Rule, RuleGroup,
};

/// One tracked instance of an alerting rule.
#[derive(Debug, Clone)]
struct ActiveAlert {
    state: AlertState,
    active_since_ms: i64,
    value: f64,
    annotations: BTreeMap<String, String>,
}

/// State one rule carries from tick to tick.
#[derive(Debug, Default)]
struct RuleState {
    /// Active alert instances keyed by resolved label set. Stays empty
    /// for recording rules.
    active: HashMap<Labels, ActiveAlert>,
    /// Series written at the previous evaluation; anything absent from
    /// the next evaluation gets a stale marker so lookback stops
    /// surfacing it.
    emitted: HashSet<Labels>,
}

/// Steps one rule group forward in time against a sample store.
#[derive(Debug)]
pub struct GroupEvaluator {
    group: RuleGroup,
    states: Vec<RuleState>,
    engine: QueryEngine,
    external_labels: Labels,
    external_url: String,
}

impl GroupEvaluator {
    // ============ Construction ============

    /// Creates an evaluator with fresh state for every rule.
    #[must_use]
    pub fn new(
        group: RuleGroup,
        engine: QueryEngine,
        external_labels: Labels,
        external_url: String,
    ) -> Self {
        let states = group.rules.iter().map(|_| RuleState::default()).collect();
        Self {
            group,
            states,
            engine,
            external_labels,
            external_url,
        }
    }

    /// The group's name.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group.name
    }

    /// The group's evaluation interval, falling back to `default_ms`.
    #[must_use]
    pub fn interval_ms(&self, default_ms: i64) -> i64 {
        self.group.interval_ms.unwrap_or(default_ms)
    }

    // ============ Evaluation ============

    /// Runs every rule in the group once at `at_ms`.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::Evaluation` when a rule's expression fails and
    /// `RuleError::DuplicateOutput` when two outputs of one rule resolve
    /// to the same series identity.
    pub fn evaluate(&mut self, store: &SampleStore, at_ms: i64) -> Result<()> {
        trace!(group = %self.group.name, at_ms, "evaluating rule group");
        for (rule, state) in self.group.rules.iter().zip(self.states.iter_mut()) {
            match rule {
                Rule::Recording(recording) => {
                    evaluate_recording(&self.engine, recording, state, store, at_ms)?;
                }
                Rule::Alerting(alerting) => {
                    evaluate_alerting(
                        &self.engine,
                        alerting,
                        state,
                        store,
                        at_ms,
                        &self.external_labels,
                        &self.external_url,
                    )?;
                }
            }
        }
        Ok(())
    }

    // ============ Alert access ============

    /// Returns all active instances (pending and firing) of the named
    /// alert, sorted by label set.
    #[must_use]
    pub fn active_alerts(&self, alert_name: &str) -> Vec<AlertInstance> {
        self.collect_alerts(alert_name, |_| true)
    }

    /// Returns the firing instances of the named alert, sorted by label
    /// set.
    #[must_use]
    pub fn firing_alerts(&self, alert_name: &str) -> Vec<AlertInstance> {
        self.collect_alerts(alert_name, |alert| alert.state.is_firing())
    }

    fn collect_alerts(
        &self,
        alert_name: &str,
        keep: impl Fn(&ActiveAlert) -> bool,
    ) -> Vec<AlertInstance> {
        let mut out = Vec::new();
        for (rule, state) in self.group.rules.iter().zip(self.states.iter()) {
            let Rule::Alerting(alerting) = rule else {
                continue;
            };
            if alerting.name != alert_name {
                continue;
            }
            for (labels, alert) in &state.active {
                if keep(alert) {
                    out.push(AlertInstance {
                        labels: labels.clone(),
                        annotations: alert.annotations.clone(),
                        state: alert.state,
                        active_since_ms: alert.active_since_ms,
                        value: alert.value,
                    });
                }
            }
        }
        out.sort_by(|a, b| a.labels.cmp(&b.labels));
        out
    }
}

// ============ Recording rules ============

fn evaluate_recording(
    engine: &QueryEngine,
    rule: &RecordingRule,
    state: &mut RuleState,
    store: &SampleStore,
    at_ms: i64,
) -> Result<()> {
    let rows = engine
        .evaluate(store, &rule.expr, at_ms)
        .map_err(|source| RuleError::Evaluation {
            rule: rule.metric.clone(),
            source,
        })?;

    let mut emitted = HashSet::with_capacity(rows.len());
    for row in rows {
        let mut labels = row.labels.merged(&rule.labels);
        labels.set(METRIC_NAME_LABEL, rule.metric.clone());
        if !emitted.insert(labels.clone()) {
            return Err(RuleError::DuplicateOutput {
                rule: rule.metric.clone(),
                series: labels.to_string(),
            });
        }
        store.insert(&labels, Sample::new(at_ms, row.value));
    }
    mark_departed(store, &state.emitted, &emitted, at_ms);
    trace!(rule = %rule.metric, series = emitted.len(), "recorded rule outputs");
    state.emitted = emitted;
    Ok(())
}

// ============ Alerting rules ============

fn evaluate_alerting(
    engine: &QueryEngine,
    rule: &AlertingRule,
    state: &mut RuleState,
    store: &SampleStore,
    at_ms: i64,
    external_labels: &Labels,
    external_url: &str,
) -> Result<()> {
    let rows = engine
        .evaluate(store, &rule.expr, at_ms)
        .map_err(|source| RuleError::Evaluation {
            rule: rule.name.clone(),
            source,
        })?;

    // Resolve each row to an instance identity. Two rows collapsing onto
    // the same resolved labels would make instance state ambiguous.
    let mut current: HashMap<Labels, f64> = HashMap::with_capacity(rows.len());
    for row in &rows {
        let value = row.value.as_float().unwrap_or(f64::NAN);
        let labels = resolve_labels(rule, &row.labels, value, external_labels, external_url);
        if current.insert(labels.clone(), value).is_some() {
            return Err(RuleError::DuplicateOutput {
                rule: rule.name.clone(),
                series: labels.to_string(),
            });
        }
    }

    // Advance the state machine: new instances start pending, departed
    // instances resolve immediately, held instances fire once the hold
    // duration has elapsed.
    for (labels, value) in &current {
        match state.active.get_mut(labels) {
            Some(alert) => alert.value = *value,
            None => {
                debug!(alert = %rule.name, instance = %labels, "alert instance pending");
                state.active.insert(
                    labels.clone(),
                    ActiveAlert {
                        state: AlertState::Pending,
                        active_since_ms: at_ms,
                        value: *value,
                        annotations: BTreeMap::new(),
                    },
                );
            }
        }
    }
    state.active.retain(|labels, _| {
        let keep = current.contains_key(labels);
        if !keep {
            debug!(alert = %rule.name, instance = %labels, "alert instance resolved");
        }
        keep
    });
    for (labels, alert) in &mut state.active {
        if !alert.state.is_firing() && at_ms - alert.active_since_ms >= rule.for_ms {
            alert.state = AlertState::Firing;
            debug!(alert = %rule.name, instance = %labels, "alert instance firing");
        }
        // Annotations see the fully resolved labels, alertname included.
        let ctx = TemplateContext {
            labels,
            value: alert.value,
            external_labels,
            external_url,
        };
        alert.annotations = rule
            .annotations
            .iter()
            .map(|(name, template)| (name.clone(), expand(template, &ctx)))
            .collect();
    }

    // Surface the instances as the ALERTS meta-series. A state change
    // moves the instance to a different ALERTS series, so the old row is
    // staled just like a resolved instance's.
    let mut emitted = HashSet::with_capacity(state.active.len());
    for (labels, alert) in &state.active {
        let mut series = labels.clone();
        series.set(METRIC_NAME_LABEL, ALERTS_METRIC);
        series.set(ALERT_STATE_LABEL, alert.state.as_str());
        store.insert(&series, Sample::float(at_ms, 1.0));
        emitted.insert(series);
    }
    mark_departed(store, &state.emitted, &emitted, at_ms);
    state.emitted = emitted;
    Ok(())
}

/// Rule label values are templated against the matched row, then the
/// merged set gets the reserved `alertname` label, which always wins.
fn resolve_labels(
    rule: &AlertingRule,
    row_labels: &Labels,
    value: f64,
    external_labels: &Labels,
    external_url: &str,
) -> Labels {
    let ctx = TemplateContext {
        labels: row_labels,
        value,
        external_labels,
        external_url,
    };
    let mut resolved = row_labels.without_metric();
    for (name, template) in rule.labels.iter() {
        resolved.set(name, expand(template, &ctx));
    }
    resolved.set(ALERT_NAME_LABEL, rule.name.clone());
    resolved
}

/// Writes stale markers for series emitted last evaluation but not this
/// one.
fn mark_departed(
    store: &SampleStore,
    previous: &HashSet<Labels>,
    current: &HashSet<Labels>,
    at_ms: i64,
) {
    for labels in previous.difference(current) {
        store.insert(labels, Sample::stale(at_ms));
    }
}
