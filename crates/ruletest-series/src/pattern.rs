//! The compact value mini-language.
//!
//! A pattern is a sequence of whitespace-separated steps, consumed left to
//! right, each producing one or more per-tick samples:
//!
//! - `3.14` — one float sample
//! - `_` — one gap (no sample)
//! - `stale` — one explicit stale marker
//! - `1+2x3` / `5-1x3` / `1x3` — arithmetic series: `count + 1` samples
//!   starting at the base, stepping by the (optional, signed) delta
//! - `{{count:1 sum:2}}` — one histogram sample, with `x count` repeat or
//!   `{{A}}+{{B}}x count` additive expansion
//!
//! The repeat suffix may be written attached (`1x3`) or spaced (`1 x 3`).
//! Each repeated step emits `count + 1` slots, so `1x2` covers ticks 0..=2.

use crate::error::{Result, SeriesError};
use crate::histogram::SparseHistogram;
use crate::value::{PatternStep, SampleValue};

/// Upper bound on the number of slots a single pattern may expand to.
///
/// Guards against a mistyped repeat count allocating unbounded memory; a
/// pattern exceeding the bound is a structural error.
pub const MAX_EXPANSION: usize = 1 << 20;

/// Expands a value pattern into per-tick steps.
///
/// The result holds at least `min_slots` entries; if the pattern is exhausted
/// first, the remaining slots are gaps. A pattern may legitimately produce
/// more slots than requested (samples past the last assertion are harmless).
///
/// # Errors
///
/// Returns `SeriesError::InvalidPattern` for malformed steps and
/// `SeriesError::InvalidHistogram` for malformed histogram literals; both are
/// fatal for the owning test group.
pub fn expand(pattern: &str, min_slots: usize) -> Result<Vec<PatternStep>> {
    let mut steps = PatternParser::new(pattern).parse()?;
    while steps.len() < min_slots {
        steps.push(PatternStep::Gap);
    }
    Ok(steps)
}

struct PatternParser<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    index: usize,
    step_start: usize,
}

impl<'a> PatternParser<'a> {
    fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
            chars: pattern.chars().collect(),
            index: 0,
            step_start: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<PatternStep>> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            if self.peek().is_none() {
                return Ok(out);
            }
            self.step_start = self.index;
            self.parse_step(&mut out)?;
        }
    }

    fn parse_step(&mut self, out: &mut Vec<PatternStep>) -> Result<()> {
        match self.peek() {
            Some('_') => {
                self.index += 1;
                let repeats = self.parse_repeat()?.unwrap_or(0);
                self.check_boundary()?;
                self.push_repeated(out, repeats + 1, &PatternStep::Gap)
            }
            Some('{') => self.parse_histogram_step(out),
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.scan_word();
                if word == "stale" {
                    let repeats = self.parse_repeat()?.unwrap_or(0);
                    self.check_boundary()?;
                    self.push_repeated(out, repeats + 1, &PatternStep::Sample(SampleValue::Stale))
                } else if let Ok(value) = word.parse::<f64>() {
                    // Inf / NaN word forms.
                    self.parse_scalar_tail(out, value)
                } else {
                    Err(self.error(&format!("invalid value '{word}'")))
                }
            }
            Some(_) => {
                let base = self.scan_number()?;
                self.parse_scalar_tail(out, base)
            }
            None => Ok(()),
        }
    }

    /// Parses the optional `±delta` and `x count` suffix of a scalar step and
    /// emits the resulting samples.
    fn parse_scalar_tail(&mut self, out: &mut Vec<PatternStep>, base: f64) -> Result<()> {
        let mut delta = None;
        if matches!(self.peek(), Some('+' | '-')) {
            let negative = self.peek() == Some('-');
            self.index += 1;
            let magnitude = self.scan_number()?;
            delta = Some(if negative { -magnitude } else { magnitude });
        }

        let repeats = self.parse_repeat()?;
        self.check_boundary()?;

        match (delta, repeats) {
            (Some(d), Some(n)) => {
                self.check_budget(out.len(), n + 1)?;
                for k in 0..=n {
                    let value = base + (k as f64) * d;
                    out.push(PatternStep::Sample(SampleValue::Float(value)));
                }
                Ok(())
            }
            (Some(_), None) => Err(self.error("expected 'x<count>' after delta")),
            (None, Some(n)) => {
                self.push_repeated(out, n + 1, &PatternStep::Sample(SampleValue::Float(base)))
            }
            (None, None) => {
                out.push(PatternStep::Sample(SampleValue::Float(base)));
                Ok(())
            }
        }
    }

    fn parse_histogram_step(&mut self, out: &mut Vec<PatternStep>) -> Result<()> {
        let first = self.scan_histogram()?;

        let mut delta = None;
        if self.consume_if('+') {
            if self.peek() != Some('{') {
                return Err(self.error("expected histogram literal after '+'"));
            }
            delta = Some(self.scan_histogram()?);
        } else if self.peek() == Some('-') {
            return Err(self.error("histogram deltas only support '+'"));
        }

        let repeats = self.parse_repeat()?;
        self.check_boundary()?;

        match (delta, repeats) {
            (Some(d), Some(n)) => {
                self.check_budget(out.len(), n + 1)?;
                let mut current = first;
                out.push(PatternStep::Sample(SampleValue::Histogram(current.clone())));
                for _ in 0..n {
                    current = current.combine(&d)?;
                    out.push(PatternStep::Sample(SampleValue::Histogram(current.clone())));
                }
                Ok(())
            }
            (Some(_), None) => Err(self.error("expected 'x<count>' after histogram delta")),
            (None, Some(n)) => self.push_repeated(
                out,
                n + 1,
                &PatternStep::Sample(SampleValue::Histogram(first)),
            ),
            (None, None) => {
                out.push(PatternStep::Sample(SampleValue::Histogram(first)));
                Ok(())
            }
        }
    }

    /// Parses `x<count>`, also accepting whitespace around the `x`.
    /// Restores the cursor and returns `None` when no repeat follows.
    fn parse_repeat(&mut self) -> Result<Option<u64>> {
        let save = self.index;
        self.skip_ws();
        if !self.consume_if('x') {
            self.index = save;
            return Ok(None);
        }
        self.skip_ws();
        let start = self.index;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.index += 1;
        }
        if self.index == start {
            return Err(self.error("expected count after 'x'"));
        }
        let digits: String = self.chars[start..self.index].iter().collect();
        let count = digits
            .parse::<u64>()
            .map_err(|_| self.error(&format!("repeat count '{digits}' is out of range")))?;
        Ok(Some(count))
    }

    /// Scans a number: optional sign, digits/dots, optional exponent, or the
    /// word forms `inf`/`infinity`/`nan` (any case).
    fn scan_number(&mut self) -> Result<f64> {
        let start = self.index;
        if matches!(self.peek(), Some('+' | '-')) {
            self.index += 1;
        }
        if matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
                self.index += 1;
            }
        } else {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                self.index += 1;
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.index += 1;
                if matches!(self.peek(), Some('+' | '-')) {
                    self.index += 1;
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.index += 1;
                }
            }
        }
        let raw: String = self.chars[start..self.index].iter().collect();
        raw.parse()
            .map_err(|_| self.error(&format!("invalid number '{raw}'")))
    }

    fn scan_word(&mut self) -> String {
        let start = self.index;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.index += 1;
        }
        self.chars[start..self.index].iter().collect()
    }

    /// Scans a complete `{{…}}` literal and parses it.
    fn scan_histogram(&mut self) -> Result<SparseHistogram> {
        let start = self.index;
        if !(self.consume_if('{') && self.consume_if('{')) {
            return Err(self.error("histogram literal must start with '{{'"));
        }
        loop {
            match self.next() {
                Some('}') if self.peek() == Some('}') => {
                    self.index += 1;
                    break;
                }
                Some(_) => {}
                None => return Err(self.error("unterminated histogram literal")),
            }
        }
        let literal: String = self.chars[start..self.index].iter().collect();
        SparseHistogram::parse(&literal)
    }

    fn push_repeated(
        &self,
        out: &mut Vec<PatternStep>,
        total: u64,
        step: &PatternStep,
    ) -> Result<()> {
        self.check_budget(out.len(), total)?;
        for _ in 0..total {
            out.push(step.clone());
        }
        Ok(())
    }

    fn check_budget(&self, have: usize, add: u64) -> Result<()> {
        if add > MAX_EXPANSION as u64 || have + add as usize > MAX_EXPANSION {
            return Err(self.error(&format!("expansion exceeds {MAX_EXPANSION} slots")));
        }
        Ok(())
    }

    /// A step must be followed by whitespace or the end of the pattern.
    fn check_boundary(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(c) if c.is_whitespace() => Ok(()),
            Some(c) => Err(self.error(&format!("unexpected character '{c}'"))),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.index += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        Some(c)
    }

    fn consume_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: &str) -> SeriesError {
        let end = self.index.max(self.step_start + 1).min(self.chars.len());
        let token: String = self.chars[self.step_start..end].iter().collect();
        SeriesError::InvalidPattern {
            token,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(pattern: &str) -> Vec<f64> {
        expand(pattern, 0)
            .unwrap()
            .into_iter()
            .map(|step| match step {
                PatternStep::Sample(SampleValue::Float(v)) => v,
                other => panic!("expected float step, got {other:?}"),
            })
            .collect()
    }

    mod scalar_tests {
        use super::*;

        #[test]
        fn bare_values() {
            assert_eq!(floats("1 2 3"), vec![1.0, 2.0, 3.0]);
        }

        #[test]
        fn float_forms() {
            assert_eq!(floats("1.5 2e3 -0.5 1e-2"), vec![1.5, 2000.0, -0.5, 0.01]);
        }

        #[test]
        fn inf_and_nan() {
            let steps = expand("Inf -Inf NaN", 0).unwrap();
            let values: Vec<f64> = steps
                .iter()
                .map(|s| s.value().and_then(SampleValue::as_float).unwrap())
                .collect();
            assert_eq!(values[0], f64::INFINITY);
            assert_eq!(values[1], f64::NEG_INFINITY);
            assert!(values[2].is_nan());
        }

        #[test]
        fn repeat_emits_count_plus_one() {
            assert_eq!(floats("1x2"), vec![1.0, 1.0, 1.0]);
        }

        #[test]
        fn increase_series() {
            assert_eq!(floats("1+1x2"), vec![1.0, 2.0, 3.0]);
        }

        #[test]
        fn decrease_series() {
            assert_eq!(floats("5-2x2"), vec![5.0, 3.0, 1.0]);
        }

        #[test]
        fn negative_base_with_delta() {
            assert_eq!(floats("-5+1x1"), vec![-5.0, -4.0]);
        }

        #[test]
        fn zero_delta_long_run() {
            let values = floats("0+0x1440");
            assert_eq!(values.len(), 1441);
            assert!(values.iter().all(|v| *v == 0.0));
        }

        #[test]
        fn spaced_repeat_forms() {
            assert_eq!(floats("1 x 2"), vec![1.0, 1.0, 1.0]);
            assert_eq!(floats("1+1 x 2"), vec![1.0, 2.0, 3.0]);
        }
    }

    mod gap_and_stale_tests {
        use super::*;

        #[test]
        fn underscore_is_gap() {
            let steps = expand("0 _ _ 0", 0).unwrap();
            assert_eq!(steps.len(), 4);
            assert!(matches!(steps[1], PatternStep::Gap));
            assert!(matches!(steps[2], PatternStep::Gap));
        }

        #[test]
        fn stale_marker() {
            let steps = expand("0 stale", 0).unwrap();
            assert_eq!(steps[1], PatternStep::Sample(SampleValue::Stale));
        }

        #[test]
        fn gap_repeat() {
            let steps = expand("_x3", 0).unwrap();
            assert_eq!(steps.len(), 4);
            assert!(steps.iter().all(|s| matches!(s, PatternStep::Gap)));
        }

        #[test]
        fn stale_repeat() {
            let steps = expand("stale x1", 0).unwrap();
            assert_eq!(steps.len(), 2);
            assert!(steps.iter().all(|s| s.value().is_some_and(SampleValue::is_stale)));
        }

        #[test]
        fn short_pattern_pads_with_gaps() {
            let steps = expand("1", 4).unwrap();
            assert_eq!(steps.len(), 4);
            assert!(matches!(steps[0], PatternStep::Sample(_)));
            assert!(steps[1..].iter().all(|s| matches!(s, PatternStep::Gap)));
        }

        #[test]
        fn empty_pattern_is_all_gaps() {
            let steps = expand("", 3).unwrap();
            assert_eq!(steps.len(), 3);
            assert!(steps.iter().all(|s| matches!(s, PatternStep::Gap)));
        }

        #[test]
        fn longer_pattern_is_not_truncated() {
            let steps = expand("1 2 3", 1).unwrap();
            assert_eq!(steps.len(), 3);
        }
    }

    mod histogram_tests {
        use super::*;

        fn histograms(pattern: &str) -> Vec<SparseHistogram> {
            expand(pattern, 0)
                .unwrap()
                .into_iter()
                .map(|step| match step {
                    PatternStep::Sample(SampleValue::Histogram(h)) => h,
                    other => panic!("expected histogram step, got {other:?}"),
                })
                .collect()
        }

        #[test]
        fn single_literal() {
            let hists = histograms("{{count:2 sum:3 buckets:[2]}}");
            assert_eq!(hists.len(), 1);
            assert!((hists[0].count - 2.0).abs() < f64::EPSILON);
        }

        #[test]
        fn repeat_produces_identical_values() {
            let hists = histograms("{{sum:3 count:2 buckets:[2]}}x2");
            assert_eq!(hists.len(), 3);
            assert_eq!(hists[0], hists[2]);
        }

        #[test]
        fn additive_expansion() {
            let hists =
                histograms("{{sum:3 count:2 buckets:[2]}}+{{sum:1.3 count:1 buckets:[1]}}x2");
            assert_eq!(hists.len(), 3);
            assert!((hists[2].sum - 5.6).abs() < 1e-9);
            assert!((hists[2].count - 4.0).abs() < f64::EPSILON);
            assert_eq!(hists[2].positive, vec![4.0]);
        }

        #[test]
        fn mixed_with_scalars() {
            let steps = expand("{{count:1}} 5", 0).unwrap();
            assert_eq!(steps.len(), 2);
            assert!(steps[0].value().is_some_and(|v| v.as_histogram().is_some()));
            assert_eq!(steps[1].value().and_then(SampleValue::as_float), Some(5.0));
        }
    }

    mod error_tests {
        use super::*;
        use test_case::test_case;

        #[test_case("foo", "invalid value"; "bare word")]
        #[test_case("1+2", "expected 'x<count>' after delta"; "delta without repeat")]
        #[test_case("1x", "expected count after 'x'"; "repeat without count")]
        #[test_case("_5", "unexpected character"; "gap glued to value")]
        #[test_case("1.2.3", "invalid number"; "double dot")]
        #[test_case("{{count:1}", "unterminated histogram literal"; "missing close")]
        #[test_case("{{count:1}}-{{count:1}}x1", "only support '+'"; "histogram minus")]
        #[test_case("{{count:1}}+{{count:2}}", "after histogram delta"; "histogram delta without repeat")]
        #[test_case("{{count:1}}+5x1", "expected histogram literal"; "histogram plus scalar")]
        fn malformed_patterns(pattern: &str, reason_part: &str) {
            match expand(pattern, 0) {
                Err(SeriesError::InvalidPattern { reason, .. }) => {
                    assert!(
                        reason.contains(reason_part),
                        "reason '{reason}' missing '{reason_part}'"
                    );
                }
                other => panic!("expected InvalidPattern, got {other:?}"),
            }
        }

        #[test]
        fn bad_histogram_field_is_a_histogram_error() {
            match expand("{{weird:1}}", 0) {
                Err(SeriesError::InvalidHistogram { reason, .. }) => {
                    assert!(reason.contains("unrecognized"));
                }
                other => panic!("expected InvalidHistogram, got {other:?}"),
            }
        }

        #[test]
        fn expansion_budget_enforced() {
            match expand("1x2000000", 0) {
                Err(SeriesError::InvalidPattern { reason, .. }) => {
                    assert!(reason.contains("exceeds"));
                }
                other => panic!("expected InvalidPattern, got {other:?}"),
            }
        }

        #[test]
        fn error_reports_offending_token() {
            match expand("1 2 boom 4", 0) {
                Err(SeriesError::InvalidPattern { token, .. }) => {
                    assert_eq!(token, "boom");
                }
                other => panic!("expected InvalidPattern, got {other:?}"),
            }
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arithmetic_series_shape(
                base in -1.0e6..1.0e6f64,
                magnitude in 0.0..1.0e3f64,
                negative in proptest::bool::ANY,
                count in 0u64..200,
            ) {
                let op = if negative { '-' } else { '+' };
                let pattern = format!("{base}{op}{magnitude}x{count}");
                let steps = expand(&pattern, 0).unwrap();
                prop_assert_eq!(steps.len(), (count + 1) as usize);
                let delta = if negative { -magnitude } else { magnitude };
                for (k, step) in steps.iter().enumerate() {
                    let value = step.value().and_then(SampleValue::as_float).unwrap();
                    let expected = base + (k as f64) * delta;
                    prop_assert!((value - expected).abs() <= 1e-9 * expected.abs().max(1.0));
                }
            }

            #[test]
            fn bare_sequence_length_matches(values in proptest::collection::vec(-100.0..100.0f64, 0..20)) {
                let pattern = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                let steps = expand(&pattern, 0).unwrap();
                prop_assert_eq!(steps.len(), values.len());
            }
        }
    }
}
