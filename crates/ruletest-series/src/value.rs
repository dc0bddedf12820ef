//! Sample values and timestamped samples.

use std::fmt;

use crate::histogram::SparseHistogram;

/// A sample value: a float, a sparse histogram, or the explicit stale marker.
///
/// The stale marker is a real store entry (it supersedes older values at its
/// timestamp), but queries never return it: an instant lookup that lands on a
/// stale marker reports the series as absent.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// A scalar float sample.
    Float(f64),
    /// A sparse-histogram sample.
    Histogram(SparseHistogram),
    /// The explicit staleness marker.
    Stale,
}

impl SampleValue {
    /// Returns the float value, if this is a float sample.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the histogram, if this is a histogram sample.
    #[must_use]
    pub fn as_histogram(&self) -> Option<&SparseHistogram> {
        match self {
            Self::Histogram(h) => Some(h),
            _ => None,
        }
    }

    /// Returns `true` if this is the stale marker.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    /// Compares two values within the given absolute/relative tolerance.
    ///
    /// Floats match when both are NaN or when
    /// `|a − b| ≤ max(abs_eps, rel_eps · max(|a|, |b|))`; histograms compare
    /// field-wise under the same rule; the stale marker only equals itself.
    /// A float never matches a histogram.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, abs_eps: f64, rel_eps: f64) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => almost_eq(*a, *b, abs_eps, rel_eps),
            (Self::Histogram(a), Self::Histogram(b)) => a.approx_eq(b, abs_eps, rel_eps),
            (Self::Stale, Self::Stale) => true,
            _ => false,
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<SparseHistogram> for SampleValue {
    fn from(h: SparseHistogram) -> Self {
        Self::Histogram(h)
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Histogram(h) => write!(f, "{h}"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// Tolerance-aware float comparison. NaN equals NaN so expected NaN results
/// can be asserted.
#[must_use]
pub fn almost_eq(a: f64, b: f64, abs_eps: f64, rel_eps: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    diff <= abs_eps.max(rel_eps * a.abs().max(b.abs()))
}

/// A single timestamped sample in a synthetic series.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Milliseconds from the simulated epoch (tick zero).
    pub timestamp_ms: i64,
    /// The sample value, possibly the stale marker.
    pub value: SampleValue,
}

impl Sample {
    /// Creates a sample at the given timestamp.
    #[must_use]
    pub const fn new(timestamp_ms: i64, value: SampleValue) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }

    /// Creates a float sample.
    #[must_use]
    pub const fn float(timestamp_ms: i64, value: f64) -> Self {
        Self::new(timestamp_ms, SampleValue::Float(value))
    }

    /// Creates a stale-marker sample.
    #[must_use]
    pub const fn stale(timestamp_ms: i64) -> Self {
        Self::new(timestamp_ms, SampleValue::Stale)
    }
}

/// One tick of an expanded value pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternStep {
    /// No sample at this tick; lookback may still surface an older one.
    Gap,
    /// A sample at this tick (possibly the stale marker).
    Sample(SampleValue),
}

impl PatternStep {
    /// Returns the sample value, if this step carries one.
    #[must_use]
    pub fn value(&self) -> Option<&SampleValue> {
        match self {
            Self::Gap => None,
            Self::Sample(v) => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod almost_eq_tests {
        use super::*;

        #[test]
        fn exact_values_match() {
            assert!(almost_eq(1.0, 1.0, 0.0, 0.0));
            assert!(almost_eq(0.0, 0.0, 0.0, 0.0));
        }

        #[test]
        fn within_absolute_tolerance() {
            assert!(almost_eq(1.0, 1.0 + 1e-10, 1e-9, 0.0));
            assert!(!almost_eq(1.0, 1.0 + 1e-8, 1e-9, 0.0));
        }

        #[test]
        fn within_relative_tolerance() {
            assert!(almost_eq(1e12, 1e12 + 1.0, 0.0, 1e-6));
            assert!(!almost_eq(1e12, 1e12 + 1e8, 0.0, 1e-6));
        }

        #[test]
        fn nan_equals_nan() {
            assert!(almost_eq(f64::NAN, f64::NAN, 0.0, 0.0));
            assert!(!almost_eq(f64::NAN, 1.0, 1e9, 1e9));
        }

        #[test]
        fn infinities_match_themselves() {
            assert!(almost_eq(f64::INFINITY, f64::INFINITY, 0.0, 0.0));
            assert!(!almost_eq(f64::INFINITY, f64::NEG_INFINITY, 0.0, 0.0));
        }
    }

    mod sample_value_tests {
        use super::*;

        #[test]
        fn float_accessors() {
            let v = SampleValue::Float(3.5);
            assert_eq!(v.as_float(), Some(3.5));
            assert!(v.as_histogram().is_none());
            assert!(!v.is_stale());
        }

        #[test]
        fn stale_accessors() {
            let v = SampleValue::Stale;
            assert!(v.is_stale());
            assert_eq!(v.as_float(), None);
        }

        #[test]
        fn approx_eq_float_vs_histogram_never_matches() {
            let f = SampleValue::Float(0.0);
            let h = SampleValue::Histogram(SparseHistogram::default());
            assert!(!f.approx_eq(&h, 1.0, 1.0));
        }

        #[test]
        fn approx_eq_stale_only_matches_stale() {
            assert!(SampleValue::Stale.approx_eq(&SampleValue::Stale, 0.0, 0.0));
            assert!(!SampleValue::Stale.approx_eq(&SampleValue::Float(0.0), 1.0, 1.0));
        }

        #[test]
        fn display_forms() {
            assert_eq!(SampleValue::Float(3.0).to_string(), "3");
            assert_eq!(SampleValue::Float(2.5).to_string(), "2.5");
            assert_eq!(SampleValue::Stale.to_string(), "stale");
        }
    }

    mod sample_tests {
        use super::*;

        #[test]
        fn constructors() {
            let s = Sample::float(60_000, 1.0);
            assert_eq!(s.timestamp_ms, 60_000);
            assert_eq!(s.value.as_float(), Some(1.0));

            let s = Sample::stale(120_000);
            assert!(s.value.is_stale());
        }

        #[test]
        fn pattern_step_value() {
            assert_eq!(PatternStep::Gap.value(), None);
            let step = PatternStep::Sample(SampleValue::Float(1.0));
            assert_eq!(step.value(), Some(&SampleValue::Float(1.0)));
        }
    }
}
