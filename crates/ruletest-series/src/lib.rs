//! Synthetic time-series primitives for monitoring-rule unit tests.
//!
//! `ruletest-series` supplies the data layer of the rule test harness: label
//! sets, sample values (floats and sparse histograms), the compact value
//! mini-language that turns pattern strings like `"0+10x5"` into per-tick
//! sample sequences, and an in-memory sample store with lookback and
//! staleness semantics.
//!
//! # Features
//!
//! - **Value patterns**: expand `"1+1x4"`, gaps (`_`), `stale` markers, and
//!   sparse-histogram literals into concrete per-tick samples
//! - **Sparse histograms**: compact `{{sum:3 count:2 buckets:[2]}}` literals
//!   with additive combination for `+`-delta patterns
//! - **Deterministic store**: samples keyed by full label set, instant
//!   lookups honoring a configurable lookback window and explicit staleness
//!
//! # Example
//!
//! ```rust
//! use ruletest_series::{PatternStep, SampleStore, expand};
//!
//! // Three ticks of value 1 followed by a gap.
//! let steps = expand("1x2", 4).unwrap();
//! assert_eq!(steps.len(), 4);
//! assert!(matches!(steps[3], PatternStep::Gap));
//!
//! // Seed a store at a 60s tick interval and look a sample up.
//! let store = SampleStore::new();
//! let labels = store
//!     .seed_series("up{job=\"api\"}", "1x2", 60_000, 3)
//!     .unwrap();
//! let sample = store.latest(&labels, 120_000, 300_000).unwrap();
//! assert_eq!(sample.timestamp_ms, 120_000);
//! ```

#![doc(html_root_url = "https://docs.rs/ruletest-series/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod duration;
pub mod error;
pub mod histogram;
pub mod labels;
pub mod pattern;
pub mod store;
pub mod value;

// Re-export main types at crate root
pub use duration::CompactDuration;
pub use error::{Result, SeriesError};
pub use histogram::SparseHistogram;
pub use labels::{Labels, METRIC_NAME_LABEL};
pub use pattern::{MAX_EXPANSION, expand};
pub use store::SampleStore;
pub use value::{PatternStep, Sample, SampleValue};
