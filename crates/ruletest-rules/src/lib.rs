//! Recording and alerting rules evaluated over a simulated timeline.
//!
//! `ruletest-rules` loads rule-group YAML into typed definitions and steps
//! groups forward tick by tick. Recording rules write their results back
//! into the store under the record name, so later rules and later ticks see
//! them like any other series. Alerting rules run a per-instance state
//! machine (pending until the `for` duration has elapsed, firing after,
//! resolved when the expression stops matching) and mirror every active
//! instance into the synthetic `ALERTS` series so expressions can query
//! alert state directly.
//!
//! # Features
//!
//! - **Loading**: `groups:` YAML with `record:`/`alert:` rules, compact
//!   durations, structural validation, and expressions parsed up front
//! - **Recording**: output label resolution (rule labels override, the
//!   record name always wins) and duplicate-series detection
//! - **Alerting**: hold-duration state machine keyed by resolved label
//!   set, `ALERTS{alertname=…, alertstate=…} = 1` emission with stale
//!   markers on every transition
//! - **Templating**: `{{ $labels.x }}`, `{{ $value }}`,
//!   `{{ $externalLabels.x }}`, `{{ $externalURL }}` in labels and
//!   annotations
//!
//! # Example
//!
//! ```rust
//! use ruletest_query::QueryEngine;
//! use ruletest_rules::{GroupEvaluator, parse_str};
//! use ruletest_series::{Labels, SampleStore};
//!
//! let store = SampleStore::new();
//! store.seed_series("up{job=\"api\"}", "0", 60_000, 1)?;
//!
//! let mut groups = parse_str(
//!     "groups:\n  - name: alerts\n    rules:\n      - alert: InstanceDown\n        expr: up == 0\n",
//! )?;
//! let mut evaluator = GroupEvaluator::new(
//!     groups.remove(0),
//!     QueryEngine::new(),
//!     Labels::new(),
//!     String::new(),
//! );
//! evaluator.evaluate(&store, 0)?;
//! assert_eq!(evaluator.firing_alerts("InstanceDown").len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![doc(html_root_url = "https://docs.rs/ruletest-rules/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod engine;
pub mod error;
pub mod loader;
pub mod template;
pub mod types;

// Re-export main types at crate root. Template expansion stays under
// `template::` so its `expand` cannot shadow the pattern expander in
// `ruletest_series`.
pub use engine::GroupEvaluator;
pub use error::{Result, RuleError};
pub use loader::{load_path, parse_str};
pub use types::{
    ALERTS_METRIC, ALERT_NAME_LABEL, ALERT_STATE_LABEL, AlertInstance, AlertState, AlertingRule,
    RecordingRule, Rule, RuleGroup,
};
