//! Sparse-histogram values and their compact literal syntax.
//!
//! Test fixtures write histograms as brace-delimited field lists, e.g.
//! `{{schema:0 count:2 sum:3 buckets:[2]}}`. Bucket spans are stored as a
//! starting offset plus a dense run of counts; two histograms combine by
//! aligning spans on absolute bucket index and adding element-wise.

use std::fmt;

use crate::error::{Result, SeriesError};
use crate::value::almost_eq;

/// A structured sparse-histogram value.
///
/// Field names in the literal syntax map as: `z_bucket` → [`zero_count`],
/// `z_bucket_w` → [`zero_threshold`], `buckets`/`offset` → the positive span,
/// `n_buckets`/`n_offset` → the negative span.
///
/// [`zero_count`]: SparseHistogram::zero_count
/// [`zero_threshold`]: SparseHistogram::zero_threshold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseHistogram {
    /// Bucket resolution factor; buckets grow by `2^(2^-schema)`.
    pub schema: i32,
    /// Total observation count.
    pub count: f64,
    /// Sum of all observations.
    pub sum: f64,
    /// Count of observations in the zero bucket.
    pub zero_count: f64,
    /// Width of the zero bucket.
    pub zero_threshold: f64,
    /// Absolute index of the first positive bucket.
    pub positive_offset: i32,
    /// Positive bucket counts, starting at `positive_offset`.
    pub positive: Vec<f64>,
    /// Absolute index of the first negative bucket.
    pub negative_offset: i32,
    /// Negative bucket counts, starting at `negative_offset`.
    pub negative: Vec<f64>,
}

impl SparseHistogram {
    /// Parses a brace-delimited literal, e.g. `{{count:2 sum:3 buckets:[2]}}`.
    ///
    /// Omitted fields default to zero/empty; unrecognized fields fail.
    ///
    /// # Errors
    ///
    /// Returns `SeriesError::InvalidHistogram` on malformed input.
    pub fn parse(literal: &str) -> Result<Self> {
        let inner = literal
            .strip_prefix("{{")
            .and_then(|s| s.strip_suffix("}}"))
            .ok_or_else(|| invalid(literal, "literal must be delimited by '{{' and '}}'"))?;

        let mut hist = Self::default();
        let mut rest = inner.trim_start();
        while !rest.is_empty() {
            let colon = rest
                .find(':')
                .ok_or_else(|| invalid(literal, "expected 'field:value'"))?;
            let name = &rest[..colon];
            rest = &rest[colon + 1..];

            let raw;
            if rest.starts_with('[') {
                let close = rest
                    .find(']')
                    .ok_or_else(|| invalid(literal, "unterminated bucket list"))?;
                raw = &rest[..=close];
                rest = &rest[close + 1..];
            } else {
                let end = rest
                    .find(char::is_whitespace)
                    .unwrap_or(rest.len());
                raw = &rest[..end];
                rest = &rest[end..];
            }
            rest = rest.trim_start();

            match name {
                "schema" => hist.schema = parse_int(literal, name, raw)?,
                "count" => hist.count = parse_float(literal, name, raw)?,
                "sum" => hist.sum = parse_float(literal, name, raw)?,
                "z_bucket" => hist.zero_count = parse_float(literal, name, raw)?,
                "z_bucket_w" => hist.zero_threshold = parse_float(literal, name, raw)?,
                "offset" => hist.positive_offset = parse_int(literal, name, raw)?,
                "buckets" => hist.positive = parse_list(literal, name, raw)?,
                "n_offset" => hist.negative_offset = parse_int(literal, name, raw)?,
                "n_buckets" => hist.negative = parse_list(literal, name, raw)?,
                other => {
                    return Err(invalid(literal, &format!("unrecognized field '{other}'")));
                }
            }
        }
        Ok(hist)
    }

    /// Returns the field-wise sum of `self` and `other`.
    ///
    /// Sums, counts, and zero-bucket counts add; the zero-bucket width takes
    /// `other`'s value (the more recent literal); bucket spans add
    /// element-wise after aligning on absolute index, widening to the union
    /// of both spans.
    ///
    /// # Errors
    ///
    /// Returns `SeriesError::InvalidHistogram` if the schemas differ.
    pub fn combine(&self, other: &Self) -> Result<Self> {
        if self.schema != other.schema {
            return Err(invalid(
                &other.to_string(),
                &format!("schema {} does not match {}", other.schema, self.schema),
            ));
        }
        let (positive_offset, positive) = add_spans(
            self.positive_offset,
            &self.positive,
            other.positive_offset,
            &other.positive,
        );
        let (negative_offset, negative) = add_spans(
            self.negative_offset,
            &self.negative,
            other.negative_offset,
            &other.negative,
        );
        Ok(Self {
            schema: self.schema,
            count: self.count + other.count,
            sum: self.sum + other.sum,
            zero_count: self.zero_count + other.zero_count,
            zero_threshold: other.zero_threshold,
            positive_offset,
            positive,
            negative_offset,
            negative,
        })
    }

    /// Compares two histograms field-wise within the given tolerance.
    ///
    /// Schemas compare exactly; bucket spans compare over the union of both
    /// index ranges, so differing offsets with zero padding are equal.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, abs_eps: f64, rel_eps: f64) -> bool {
        self.schema == other.schema
            && almost_eq(self.count, other.count, abs_eps, rel_eps)
            && almost_eq(self.sum, other.sum, abs_eps, rel_eps)
            && almost_eq(self.zero_count, other.zero_count, abs_eps, rel_eps)
            && almost_eq(self.zero_threshold, other.zero_threshold, abs_eps, rel_eps)
            && spans_approx_eq(
                self.positive_offset,
                &self.positive,
                other.positive_offset,
                &other.positive,
                abs_eps,
                rel_eps,
            )
            && spans_approx_eq(
                self.negative_offset,
                &self.negative,
                other.negative_offset,
                &other.negative,
                abs_eps,
                rel_eps,
            )
    }
}

impl fmt::Display for SparseHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if self.schema != 0 {
            fields.push(format!("schema:{}", self.schema));
        }
        if self.count != 0.0 {
            fields.push(format!("count:{}", self.count));
        }
        if self.sum != 0.0 {
            fields.push(format!("sum:{}", self.sum));
        }
        if self.zero_count != 0.0 {
            fields.push(format!("z_bucket:{}", self.zero_count));
        }
        if self.zero_threshold != 0.0 {
            fields.push(format!("z_bucket_w:{}", self.zero_threshold));
        }
        if !self.positive.is_empty() {
            if self.positive_offset != 0 {
                fields.push(format!("offset:{}", self.positive_offset));
            }
            fields.push(format!("buckets:{}", format_list(&self.positive)));
        }
        if !self.negative.is_empty() {
            if self.negative_offset != 0 {
                fields.push(format!("n_offset:{}", self.negative_offset));
            }
            fields.push(format!("n_buckets:{}", format_list(&self.negative)));
        }
        write!(f, "{{{{{}}}}}", fields.join(" "))
    }
}

fn invalid(literal: &str, reason: &str) -> SeriesError {
    SeriesError::InvalidHistogram {
        literal: literal.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_float(literal: &str, field: &str, raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| invalid(literal, &format!("invalid number '{raw}' for field '{field}'")))
}

fn parse_int(literal: &str, field: &str, raw: &str) -> Result<i32> {
    raw.parse()
        .map_err(|_| invalid(literal, &format!("invalid integer '{raw}' for field '{field}'")))
}

fn parse_list(literal: &str, field: &str, raw: &str) -> Result<Vec<f64>> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| invalid(literal, &format!("field '{field}' expects '[v1,v2,…]'")))?;
    let inner = inner.trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| parse_float(literal, field, part.trim()))
        .collect()
}

fn format_list(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Adds two bucket spans after aligning on absolute index; the result covers
/// the union of both index ranges.
fn add_spans(a_offset: i32, a: &[f64], b_offset: i32, b: &[f64]) -> (i32, Vec<f64>) {
    if a.is_empty() && b.is_empty() {
        return (0, Vec::new());
    }
    if a.is_empty() {
        return (b_offset, b.to_vec());
    }
    if b.is_empty() {
        return (a_offset, a.to_vec());
    }
    let start = a_offset.min(b_offset);
    let end = (a_offset + a.len() as i32).max(b_offset + b.len() as i32);
    let mut out = vec![0.0; (end - start) as usize];
    for (i, v) in a.iter().enumerate() {
        out[(a_offset - start) as usize + i] += v;
    }
    for (i, v) in b.iter().enumerate() {
        out[(b_offset - start) as usize + i] += v;
    }
    (start, out)
}

fn spans_approx_eq(
    a_offset: i32,
    a: &[f64],
    b_offset: i32,
    b: &[f64],
    abs_eps: f64,
    rel_eps: f64,
) -> bool {
    if a.is_empty() && b.is_empty() {
        return true;
    }
    let start = if a.is_empty() {
        b_offset
    } else if b.is_empty() {
        a_offset
    } else {
        a_offset.min(b_offset)
    };
    let a_end = a_offset + a.len() as i32;
    let b_end = b_offset + b.len() as i32;
    let end = if a.is_empty() {
        b_end
    } else if b.is_empty() {
        a_end
    } else {
        a_end.max(b_end)
    };
    for idx in start..end {
        let av = bucket_at(a_offset, a, idx);
        let bv = bucket_at(b_offset, b, idx);
        if !almost_eq(av, bv, abs_eps, rel_eps) {
            return false;
        }
    }
    true
}

fn bucket_at(offset: i32, span: &[f64], idx: i32) -> f64 {
    let rel = idx - offset;
    if rel < 0 {
        return 0.0;
    }
    span.get(rel as usize).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn empty_literal_is_default() {
            let hist = SparseHistogram::parse("{{}}").unwrap();
            assert_eq!(hist, SparseHistogram::default());
        }

        #[test]
        fn simple_fields() {
            let hist = SparseHistogram::parse("{{count:2 sum:3 buckets:[2]}}").unwrap();
            assert!((hist.count - 2.0).abs() < f64::EPSILON);
            assert!((hist.sum - 3.0).abs() < f64::EPSILON);
            assert_eq!(hist.positive, vec![2.0]);
            assert_eq!(hist.positive_offset, 0);
        }

        #[test]
        fn all_fields() {
            let hist = SparseHistogram::parse(
                "{{schema:1 sum:-0.3 count:3.1 z_bucket:7.1 z_bucket_w:0.05 \
                 buckets:[5.1, 10, 7] offset:-3 n_buckets:[4.1, 5] n_offset:-5}}",
            )
            .unwrap();
            assert_eq!(hist.schema, 1);
            assert!((hist.sum - (-0.3)).abs() < f64::EPSILON);
            assert!((hist.count - 3.1).abs() < f64::EPSILON);
            assert!((hist.zero_count - 7.1).abs() < f64::EPSILON);
            assert!((hist.zero_threshold - 0.05).abs() < f64::EPSILON);
            assert_eq!(hist.positive, vec![5.1, 10.0, 7.0]);
            assert_eq!(hist.positive_offset, -3);
            assert_eq!(hist.negative, vec![4.1, 5.0]);
            assert_eq!(hist.negative_offset, -5);
        }

        #[test]
        fn empty_bucket_list() {
            let hist = SparseHistogram::parse("{{buckets:[]}}").unwrap();
            assert!(hist.positive.is_empty());
        }

        #[test]
        fn unrecognized_field_fails() {
            let result = SparseHistogram::parse("{{weird:1}}");
            match result {
                Err(SeriesError::InvalidHistogram { reason, .. }) => {
                    assert!(reason.contains("unrecognized field 'weird'"));
                }
                _ => panic!("expected InvalidHistogram error"),
            }
        }

        #[test]
        fn missing_delimiters_fail() {
            assert!(SparseHistogram::parse("{count:1}").is_err());
            assert!(SparseHistogram::parse("{{count:1}").is_err());
        }

        #[test]
        fn bad_number_fails() {
            let result = SparseHistogram::parse("{{sum:abc}}");
            match result {
                Err(SeriesError::InvalidHistogram { reason, .. }) => {
                    assert!(reason.contains("invalid number"));
                }
                _ => panic!("expected InvalidHistogram error"),
            }
        }

        #[test]
        fn float_offset_fails() {
            assert!(SparseHistogram::parse("{{offset:1.5}}").is_err());
        }

        #[test]
        fn unterminated_list_fails() {
            let result = SparseHistogram::parse("{{buckets:[1,2}}");
            match result {
                Err(SeriesError::InvalidHistogram { reason, .. }) => {
                    assert!(reason.contains("unterminated"));
                }
                _ => panic!("expected InvalidHistogram error"),
            }
        }

        #[test]
        fn display_parse_roundtrip() {
            let text = "{{schema:1 sum:-0.3 count:3.1 z_bucket:7.1 z_bucket_w:0.05 \
                        buckets:[5.1, 10, 7] offset:-3 n_buckets:[4.1, 5] n_offset:-5}}";
            let hist = SparseHistogram::parse(text).unwrap();
            let reparsed = SparseHistogram::parse(&hist.to_string()).unwrap();
            assert_eq!(hist, reparsed);
        }
    }

    mod combine_tests {
        use super::*;

        #[test]
        fn sums_counts_and_buckets_add() {
            let a = SparseHistogram::parse("{{sum:3 count:2 buckets:[2]}}").unwrap();
            let b = SparseHistogram::parse("{{sum:1.3 count:1 buckets:[1]}}").unwrap();
            let combined = a.combine(&b).unwrap();
            assert!((combined.sum - 4.3).abs() < 1e-12);
            assert!((combined.count - 3.0).abs() < f64::EPSILON);
            assert_eq!(combined.positive, vec![3.0]);

            let twice = combined.combine(&b).unwrap();
            assert!((twice.sum - 5.6).abs() < 1e-12);
            assert!((twice.count - 4.0).abs() < f64::EPSILON);
            assert_eq!(twice.positive, vec![4.0]);
        }

        #[test]
        fn spans_align_on_absolute_index() {
            let a = SparseHistogram::parse("{{buckets:[1, 1]}}").unwrap();
            let b = SparseHistogram::parse("{{buckets:[2] offset:2}}").unwrap();
            let combined = a.combine(&b).unwrap();
            assert_eq!(combined.positive_offset, 0);
            assert_eq!(combined.positive, vec![1.0, 1.0, 2.0]);
        }

        #[test]
        fn negative_offsets_widen_the_span() {
            let a = SparseHistogram::parse("{{buckets:[1] offset:-1}}").unwrap();
            let b = SparseHistogram::parse("{{buckets:[1] offset:1}}").unwrap();
            let combined = a.combine(&b).unwrap();
            assert_eq!(combined.positive_offset, -1);
            assert_eq!(combined.positive, vec![1.0, 0.0, 1.0]);
        }

        #[test]
        fn zero_threshold_takes_more_recent() {
            let a = SparseHistogram::parse("{{z_bucket_w:0.001}}").unwrap();
            let b = SparseHistogram::parse("{{z_bucket_w:0.05}}").unwrap();
            let combined = a.combine(&b).unwrap();
            assert!((combined.zero_threshold - 0.05).abs() < f64::EPSILON);
        }

        #[test]
        fn zero_counts_add() {
            let a = SparseHistogram::parse("{{z_bucket:2}}").unwrap();
            let b = SparseHistogram::parse("{{z_bucket:3}}").unwrap();
            let combined = a.combine(&b).unwrap();
            assert!((combined.zero_count - 5.0).abs() < f64::EPSILON);
        }

        #[test]
        fn schema_mismatch_fails() {
            let a = SparseHistogram::parse("{{schema:0 count:1}}").unwrap();
            let b = SparseHistogram::parse("{{schema:1 count:1}}").unwrap();
            match a.combine(&b) {
                Err(SeriesError::InvalidHistogram { reason, .. }) => {
                    assert!(reason.contains("schema"));
                }
                _ => panic!("expected InvalidHistogram error"),
            }
        }

        #[test]
        fn combine_with_empty_span_keeps_other() {
            let a = SparseHistogram::parse("{{buckets:[1, 2] offset:3}}").unwrap();
            let b = SparseHistogram::parse("{{count:1}}").unwrap();
            let combined = a.combine(&b).unwrap();
            assert_eq!(combined.positive_offset, 3);
            assert_eq!(combined.positive, vec![1.0, 2.0]);
        }
    }

    mod approx_eq_tests {
        use super::*;

        #[test]
        fn identical_histograms_match() {
            let a = SparseHistogram::parse("{{count:2 sum:3 buckets:[2]}}").unwrap();
            assert!(a.approx_eq(&a.clone(), 0.0, 0.0));
        }

        #[test]
        fn zero_padded_spans_match() {
            let a = SparseHistogram::parse("{{buckets:[0, 3] offset:0}}").unwrap();
            let b = SparseHistogram::parse("{{buckets:[3] offset:1}}").unwrap();
            assert!(a.approx_eq(&b, 0.0, 0.0));
        }

        #[test]
        fn differing_schema_never_matches() {
            let a = SparseHistogram::parse("{{schema:0}}").unwrap();
            let b = SparseHistogram::parse("{{schema:2}}").unwrap();
            assert!(!a.approx_eq(&b, 1e9, 1e9));
        }

        #[test]
        fn bucket_difference_beyond_tolerance_fails() {
            let a = SparseHistogram::parse("{{buckets:[2]}}").unwrap();
            let b = SparseHistogram::parse("{{buckets:[2.5]}}").unwrap();
            assert!(!a.approx_eq(&b, 1e-9, 1e-6));
            assert!(a.approx_eq(&b, 1.0, 0.0));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_histogram() -> impl Strategy<Value = SparseHistogram> {
            (
                0.0..100.0f64,
                0.0..100.0f64,
                0.0..10.0f64,
                -4..4i32,
                proptest::collection::vec(0.0..10.0f64, 0..5),
                -4..4i32,
                proptest::collection::vec(0.0..10.0f64, 0..5),
            )
                .prop_map(
                    |(count, sum, zero_count, p_off, positive, n_off, negative)| {
                        SparseHistogram {
                            schema: 0,
                            count,
                            sum,
                            zero_count,
                            zero_threshold: 0.001,
                            positive_offset: p_off,
                            positive,
                            negative_offset: n_off,
                            negative,
                        }
                    },
                )
        }

        proptest! {
            #[test]
            fn combine_is_commutative(a in arb_histogram(), b in arb_histogram()) {
                let ab = a.combine(&b).unwrap();
                let ba = b.combine(&a).unwrap();
                prop_assert!(ab.approx_eq(&ba, 1e-9, 1e-9));
            }

            #[test]
            fn combine_is_associative(
                a in arb_histogram(),
                b in arb_histogram(),
                c in arb_histogram(),
            ) {
                let left = a.combine(&b).unwrap().combine(&c).unwrap();
                let right = a.combine(&b.combine(&c).unwrap()).unwrap();
                prop_assert!(left.approx_eq(&right, 1e-9, 1e-9));
            }
        }
    }
}
