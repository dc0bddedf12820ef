//! Rule definitions and active-alert types.

use std::collections::BTreeMap;
use std::fmt;

use ruletest_query::Expr;
use ruletest_series::Labels;

/// Reserved label carrying the alert name on instances and `ALERTS` rows.
pub const ALERT_NAME_LABEL: &str = "alertname";

/// Synthetic metric under which active alerts are recorded every
/// evaluation.
pub const ALERTS_METRIC: &str = "ALERTS";

/// Label on [`ALERTS_METRIC`] rows carrying the instance state.
pub const ALERT_STATE_LABEL: &str = "alertstate";

/// The lifecycle state of an active alert instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertState {
    /// The expression has results but not yet for the rule's full `for`
    /// duration.
    Pending,
    /// The expression has held results for at least the `for` duration.
    Firing,
}

impl AlertState {
    /// Returns the state as the string used in the `alertstate` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Firing => "firing",
        }
    }

    /// Returns `true` for firing instances.
    #[must_use]
    pub const fn is_firing(self) -> bool {
        matches!(self, Self::Firing)
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule that records its query result under a new metric name.
#[derive(Debug, Clone)]
pub struct RecordingRule {
    /// The metric name the result is written to.
    pub metric: String,
    /// The expression as written in the rule file.
    pub expr_text: String,
    /// The pre-parsed expression.
    pub expr: Expr,
    /// Labels overriding the result's labels on output.
    pub labels: Labels,
}

/// A rule that raises alert instances while its expression has results.
#[derive(Debug, Clone)]
pub struct AlertingRule {
    /// The alert name, attached to every instance as `alertname`.
    pub name: String,
    /// The expression as written in the rule file.
    pub expr_text: String,
    /// The pre-parsed expression.
    pub expr: Expr,
    /// How long the expression must keep producing a row before an
    /// instance fires; zero fires on the first evaluation.
    pub for_ms: i64,
    /// Labels overriding the matched series labels; values may contain
    /// templates.
    pub labels: Labels,
    /// Annotation templates resolved per instance.
    pub annotations: BTreeMap<String, String>,
}

/// Either kind of rule, kept in group order.
#[derive(Debug, Clone)]
pub enum Rule {
    /// A recording rule.
    Recording(RecordingRule),
    /// An alerting rule.
    Alerting(AlertingRule),
}

impl Rule {
    /// The rule's record or alert name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Recording(rule) => &rule.metric,
            Self::Alerting(rule) => &rule.name,
        }
    }

    /// The rule's expression as written.
    #[must_use]
    pub fn expr_text(&self) -> &str {
        match self {
            Self::Recording(rule) => &rule.expr_text,
            Self::Alerting(rule) => &rule.expr_text,
        }
    }
}

/// A named set of rules evaluated together at one cadence.
#[derive(Debug, Clone)]
pub struct RuleGroup {
    /// The group name, unique within its rule file.
    pub name: String,
    /// The group's own evaluation interval; `None` falls back to the
    /// caller's default.
    pub interval_ms: Option<i64>,
    /// The rules, evaluated in order within one tick.
    pub rules: Vec<Rule>,
}

/// One active instance of an alerting rule.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertInstance {
    /// Resolved labels: matched series labels (metric name dropped),
    /// overridden by rule labels, plus `alertname`.
    pub labels: Labels,
    /// Annotations with templates expanded.
    pub annotations: BTreeMap<String, String>,
    /// Pending or firing.
    pub state: AlertState,
    /// When the instance first became active, in milliseconds.
    pub active_since_ms: i64,
    /// The value of the row that most recently kept the instance active.
    pub value: f64,
}
