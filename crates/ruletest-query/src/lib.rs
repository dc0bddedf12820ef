//! Instant-query dialect for monitoring-rule unit tests.
//!
//! `ruletest-query` parses and evaluates the expression subset the rule
//! harness needs: vector selectors with the four matcher operators, the
//! `*_over_time` range functions plus `rate`/`increase`, `timestamp` and
//! `vector`, the five basic aggregations with `by` grouping, and
//! vector-scalar arithmetic and comparison filters. Results are
//! deterministic for a given store, which is what makes assertions on them
//! stable.
//!
//! # Features
//!
//! - **Selectors**: `up{job="api", env=~"prod|stage"}` with anchored
//!   regexes, evaluated with lookback against a [`ruletest_series::SampleStore`]
//! - **Range functions**: `rate`, `increase`, `count_over_time`,
//!   `sum_over_time`, `avg_over_time`, `min_over_time`, `max_over_time`
//! - **Aggregations**: `sum`, `count`, `avg`, `min`, `max` with prefix or
//!   postfix `by (...)`
//! - **Scalars**: literals, arithmetic, and `vector()` to lift a scalar
//!   into a series
//!
//! # Example
//!
//! ```rust
//! use ruletest_query::QueryEngine;
//! use ruletest_series::SampleStore;
//!
//! let store = SampleStore::new();
//! store.seed_series("up{job=\"api\"}", "0+10x5", 60_000, 6)?;
//!
//! let engine = QueryEngine::new();
//! let rows = engine.query(&store, "up * 2", 120_000)?;
//! assert_eq!(rows[0].value.as_float(), Some(40.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![doc(html_root_url = "https://docs.rs/ruletest-query/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;

// Re-export main types at crate root
pub use ast::{AggOp, BinOp, Expr, MatchOp, Matcher, RangeFunc, VectorSelector};
pub use error::{QueryError, Result};
pub use eval::{DEFAULT_LOOKBACK_MS, QueryEngine, QueryResult};
pub use parser::parse;
