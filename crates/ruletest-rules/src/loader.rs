//! Rule file loading.
//!
//! Parses the YAML rule-file format into typed [`RuleGroup`]s. Every
//! expression is parsed up front so evaluation can never hit a syntax
//! error mid-run, and structural mistakes (a rule that is both recording
//! and alerting, a `for` on a recording rule) are rejected here.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use ruletest_query::parse;
use ruletest_series::{CompactDuration, Labels, METRIC_NAME_LABEL};

use crate::error::{Result, RuleError};
use crate::types::{AlertingRule, RecordingRule, Rule, RuleGroup};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFileDoc {
    groups: Vec<RuleGroupDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleGroupDoc {
    name: String,
    #[serde(default)]
    interval: Option<CompactDuration>,
    rules: Vec<RuleDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDoc {
    #[serde(default)]
    record: Option<String>,
    #[serde(default)]
    alert: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    expr: String,
    #[serde(rename = "for", default)]
    hold: Option<CompactDuration>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

/// Constant expressions are usually written unquoted (`expr: 1`), which
/// YAML hands over as a number rather than a string. Accept both spellings.
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

/// Parses rule groups from YAML text.
///
/// # Errors
///
/// Returns `RuleError::Yaml` for malformed YAML and `RuleError::InvalidRule`
/// / `RuleError::InvalidGroup` / `RuleError::InvalidExpression` for
/// structurally invalid definitions.
pub fn parse_str(text: &str) -> Result<Vec<RuleGroup>> {
    let doc: RuleFileDoc = serde_yaml::from_str(text)?;
    let mut seen = HashSet::new();
    let mut groups = Vec::with_capacity(doc.groups.len());
    for group in doc.groups {
        if group.name.is_empty() {
            return Err(RuleError::InvalidGroup {
                group: group.name,
                reason: "group name is empty".to_string(),
            });
        }
        if !seen.insert(group.name.clone()) {
            return Err(RuleError::InvalidGroup {
                group: group.name,
                reason: "group name appears more than once".to_string(),
            });
        }
        groups.push(convert_group(group)?);
    }
    Ok(groups)
}

/// Reads and parses a rule file from disk.
///
/// # Errors
///
/// Returns `RuleError::Io` when the file cannot be read, plus everything
/// [`parse_str`] can return.
pub fn load_path(path: &Path) -> Result<Vec<RuleGroup>> {
    let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let groups = parse_str(&text)?;
    debug!(path = %path.display(), groups = groups.len(), "loaded rule file");
    Ok(groups)
}

fn convert_group(doc: RuleGroupDoc) -> Result<RuleGroup> {
    if let Some(interval) = doc.interval {
        if interval.is_zero() {
            return Err(RuleError::InvalidGroup {
                group: doc.name,
                reason: "interval must be positive".to_string(),
            });
        }
    }
    let mut rules = Vec::with_capacity(doc.rules.len());
    for rule in doc.rules {
        rules.push(convert_rule(rule)?);
    }
    Ok(RuleGroup {
        name: doc.name,
        interval_ms: doc.interval.map(CompactDuration::millis),
        rules,
    })
}

fn convert_rule(doc: RuleDoc) -> Result<Rule> {
    let name = doc
        .record
        .clone()
        .or_else(|| doc.alert.clone())
        .unwrap_or_else(|| doc.expr.clone());
    let invalid = |reason: &str| RuleError::InvalidRule {
        rule: name.clone(),
        reason: reason.to_string(),
    };

    if doc.record.is_some() && doc.alert.is_some() {
        return Err(invalid("a rule cannot set both 'record' and 'alert'"));
    }
    if doc.labels.contains_key(METRIC_NAME_LABEL) {
        return Err(invalid("labels cannot set __name__"));
    }

    let expr = parse(&doc.expr).map_err(|source| RuleError::InvalidExpression {
        rule: name.clone(),
        source,
    })?;
    let labels: Labels = doc.labels.into_iter().collect();

    if let Some(metric) = doc.record {
        if !is_valid_metric_name(&metric) {
            return Err(invalid("record is not a valid metric name"));
        }
        if doc.hold.is_some() {
            return Err(invalid("recording rules cannot set 'for'"));
        }
        if !doc.annotations.is_empty() {
            return Err(invalid("recording rules cannot set annotations"));
        }
        return Ok(Rule::Recording(RecordingRule {
            metric,
            expr_text: doc.expr,
            expr,
            labels,
        }));
    }

    let Some(alert) = doc.alert else {
        return Err(invalid("a rule must set either 'record' or 'alert'"));
    };
    if alert.is_empty() {
        return Err(invalid("alert name is empty"));
    }
    Ok(Rule::Alerting(AlertingRule {
        name: alert,
        expr_text: doc.expr,
        expr,
        for_ms: doc.hold.map_or(0, CompactDuration::millis),
        labels,
        annotations: doc.annotations,
    }))
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == ':') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
