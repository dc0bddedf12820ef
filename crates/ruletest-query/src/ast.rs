//! Typed expression tree for the instant-query dialect.

use regex::Regex;
use ruletest_series::{CompactDuration, Labels, METRIC_NAME_LABEL};

/// How a label matcher compares the label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// `=` exact equality.
    Equal,
    /// `!=` exact inequality.
    NotEqual,
    /// `=~` anchored regex match.
    Regex,
    /// `!~` anchored regex non-match.
    NotRegex,
}

/// A single label matcher inside a vector selector.
///
/// Regex matchers are fully anchored, and a label missing from a series
/// matches as if its value were the empty string.
#[derive(Debug, Clone)]
pub struct Matcher {
    /// The label name being matched.
    pub label: String,
    /// The comparison operator.
    pub op: MatchOp,
    /// The value or regex source as written.
    pub value: String,
    pattern: Option<Regex>,
}

impl Matcher {
    /// Builds a matcher, compiling the anchored regex for `=~`/`!~` ops.
    pub fn new(
        label: impl Into<String>,
        op: MatchOp,
        value: impl Into<String>,
    ) -> std::result::Result<Self, regex::Error> {
        let value = value.into();
        let pattern = match op {
            MatchOp::Regex | MatchOp::NotRegex => Some(Regex::new(&format!("^(?:{value})$"))?),
            MatchOp::Equal | MatchOp::NotEqual => None,
        };
        Ok(Self {
            label: label.into(),
            op,
            value,
            pattern,
        })
    }

    /// Returns `true` when the label set satisfies the matcher.
    #[must_use]
    pub fn matches(&self, labels: &Labels) -> bool {
        let actual = labels.get(&self.label).unwrap_or("");
        match (self.op, &self.pattern) {
            (MatchOp::Equal, _) => actual == self.value,
            (MatchOp::NotEqual, _) => actual != self.value,
            (MatchOp::Regex, Some(pattern)) => pattern.is_match(actual),
            (MatchOp::NotRegex, Some(pattern)) => !pattern.is_match(actual),
            // new() always compiles a pattern for the regex ops.
            (MatchOp::Regex | MatchOp::NotRegex, None) => false,
        }
    }
}

/// An instant vector selector: a metric name and/or label matchers.
#[derive(Debug, Clone)]
pub struct VectorSelector {
    /// The matchers, including the metric-name matcher when present.
    pub matchers: Vec<Matcher>,
}

impl VectorSelector {
    /// Returns `true` when every matcher accepts the label set.
    #[must_use]
    pub fn matches(&self, labels: &Labels) -> bool {
        self.matchers.iter().all(|matcher| matcher.matches(labels))
    }

    /// The metric name demanded by an equality matcher, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| m.label == METRIC_NAME_LABEL && m.op == MatchOp::Equal)
            .map(|m| m.value.as_str())
    }
}

/// Functions that reduce a range of samples to one value per series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFunc {
    /// Per-second delta between the first and last sample in the range.
    Rate,
    /// Delta between the first and last sample in the range.
    Increase,
    /// Number of samples in the range.
    CountOverTime,
    /// Sum of sample values in the range.
    SumOverTime,
    /// Mean of sample values in the range.
    AvgOverTime,
    /// Smallest sample value in the range.
    MinOverTime,
    /// Largest sample value in the range.
    MaxOverTime,
}

impl RangeFunc {
    /// Maps a function name to its operation.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rate" => Some(Self::Rate),
            "increase" => Some(Self::Increase),
            "count_over_time" => Some(Self::CountOverTime),
            "sum_over_time" => Some(Self::SumOverTime),
            "avg_over_time" => Some(Self::AvgOverTime),
            "min_over_time" => Some(Self::MinOverTime),
            "max_over_time" => Some(Self::MaxOverTime),
            _ => None,
        }
    }

    /// The function name as written in expressions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::Increase => "increase",
            Self::CountOverTime => "count_over_time",
            Self::SumOverTime => "sum_over_time",
            Self::AvgOverTime => "avg_over_time",
            Self::MinOverTime => "min_over_time",
            Self::MaxOverTime => "max_over_time",
        }
    }
}

/// Aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    /// Sum of all values in a group.
    Sum,
    /// Number of series in a group.
    Count,
    /// Mean of all values in a group.
    Avg,
    /// Smallest value in a group.
    Min,
    /// Largest value in a group.
    Max,
}

impl AggOp {
    /// Maps an aggregation name to its operation.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// The aggregation name as written in expressions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
}

impl BinOp {
    /// Returns `true` for the comparison operators, which filter rather
    /// than compute.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Lt | Self::Ge | Self::Le
        )
    }

    /// The operator as written in expressions.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

/// A parsed query expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal number, including `Inf` and `NaN` word forms.
    Number(f64),
    /// An instant vector selector like `up{job="api"}`.
    Selector(VectorSelector),
    /// A range function applied to a selector over a trailing window.
    RangeCall {
        /// The function to apply.
        func: RangeFunc,
        /// The series the range is read from.
        selector: VectorSelector,
        /// The window extent, ending at the evaluation instant.
        range: CompactDuration,
    },
    /// `timestamp(<vector>)`: the sample timestamp in seconds, per series.
    Timestamp(Box<Expr>),
    /// `vector(<scalar>)`: lifts a scalar into a single labelless series.
    VectorLift(Box<Expr>),
    /// An aggregation with optional `by (...)` grouping labels.
    Aggregate {
        /// The aggregation operator.
        op: AggOp,
        /// Labels retained as the group key; empty collapses to one group.
        by: Vec<String>,
        /// The aggregated vector expression.
        arg: Box<Expr>,
    },
    /// A binary arithmetic or comparison operation.
    Binary {
        /// The operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Unary negation.
    Neg(Box<Expr>),
}

impl Expr {
    /// Whether the expression is scalar-typed. Scalar-ness is syntactic:
    /// numbers are scalars, and arithmetic over scalars stays scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        match self {
            Self::Number(_) => true,
            Self::Neg(inner) => inner.is_scalar(),
            Self::Binary { lhs, rhs, .. } => lhs.is_scalar() && rhs.is_scalar(),
            _ => false,
        }
    }
}
