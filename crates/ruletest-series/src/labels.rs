//! Label sets identifying time series.
//!
//! A [`Labels`] value is a sorted name/value map. The metric name, when
//! present, is stored under the reserved [`METRIC_NAME_LABEL`] key so that a
//! full series identity is a single map and ordering/equality/hashing come
//! from one place.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeriesError};

/// Reserved label holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A sorted set of label name/value pairs identifying one series.
///
/// Equality, ordering, and hashing are derived from the sorted pair list, so
/// `Labels` can key maps directly. The `Display` form is the usual selector
/// syntax: `name{key="value", …}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parses a series selector of the form `name{key="value", …}`.
    ///
    /// The metric name, the brace block, or both may be omitted; `{}` and the
    /// empty string parse to an empty label set. Label values support the
    /// escapes `\\`, `\"`, `\n`, `\t`, and `\r`.
    ///
    /// # Errors
    ///
    /// Returns `SeriesError::InvalidSelector` on malformed input.
    pub fn parse(selector: &str) -> Result<Self> {
        SelectorParser::new(selector).parse()
    }

    /// Adds a label and returns self for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Sets a label in place, replacing any existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Returns the value of a label, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the metric name, if present.
    #[must_use]
    pub fn metric(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    /// Returns a copy with the given label removed.
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        let mut out = self.clone();
        out.0.remove(name);
        out
    }

    /// Returns a copy with the metric name removed.
    ///
    /// Derived values (function results, arithmetic) are no longer the raw
    /// metric, so evaluators strip `__name__` from their outputs.
    #[must_use]
    pub fn without_metric(&self) -> Self {
        self.without(METRIC_NAME_LABEL)
    }

    /// Returns the union of `self` and `other`, with `other` winning on
    /// conflicting names.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (name, value) in &other.0 {
            out.0.insert(name.clone(), value.clone());
        }
        out
    }

    /// Returns a copy restricted to the given label names.
    #[must_use]
    pub fn restricted(&self, names: &[String]) -> Self {
        let mut out = Self::new();
        for name in names {
            if let Some(value) = self.get(name) {
                out.set(name.clone(), value.to_string());
            }
        }
        out
    }

    /// Iterates label pairs in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of labels (including `__name__` if set).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no labels are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.metric().unwrap_or("");
        let pairs: Vec<String> = self
            .0
            .iter()
            .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
            .map(|(k, v)| format!("{k}={v:?}"))
            .collect();
        if pairs.is_empty() {
            if name.is_empty() {
                write!(f, "{{}}")
            } else {
                write!(f, "{name}")
            }
        } else {
            write!(f, "{name}{{{}}}", pairs.join(", "))
        }
    }
}

impl FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_metric_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct SelectorParser<'a> {
    selector: &'a str,
    chars: Vec<char>,
    index: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(selector: &'a str) -> Self {
        Self {
            selector,
            chars: selector.chars().collect(),
            index: 0,
        }
    }

    fn parse(mut self) -> Result<Labels> {
        let mut labels = Labels::new();
        self.skip_ws();

        if let Some(c) = self.peek() {
            if is_name_start(c) {
                let name = self.scan_while(is_metric_char);
                labels.set(METRIC_NAME_LABEL, name);
            }
        }

        self.skip_ws();
        if self.consume_if('{') {
            self.parse_pairs(&mut labels)?;
            if !self.consume_if('}') {
                return Err(self.error("missing closing '}'"));
            }
        }

        self.skip_ws();
        if self.peek().is_some() {
            return Err(self.error("unexpected trailing characters"));
        }
        Ok(labels)
    }

    fn parse_pairs(&mut self, labels: &mut Labels) -> Result<()> {
        loop {
            self.skip_ws();
            match self.peek() {
                Some('}') | None => return Ok(()),
                Some(c) if is_name_start(c) => {}
                Some(c) => return Err(self.error(&format!("unexpected character '{c}'"))),
            }
            let name = self.scan_while(is_label_char);
            self.skip_ws();
            if !self.consume_if('=') {
                return Err(self.error("expected '=' after label name"));
            }
            self.skip_ws();
            let value = self.parse_string()?;
            labels.set(name, value);
            self.skip_ws();
            // A trailing comma before '}' is accepted.
            if !self.consume_if(',') {
                return Ok(());
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        if !self.consume_if('"') {
            return Err(self.error("expected '\"' to open label value"));
        }
        let mut out = String::new();
        loop {
            match self.next() {
                Some('"') => return Ok(out),
                Some('\\') => match self.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return Err(self.error("incomplete escape in label value")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated label value")),
            }
        }
    }

    fn scan_while(&mut self, pred: fn(char) -> bool) -> String {
        let start = self.index;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.index += 1;
        }
        self.chars[start..self.index].iter().collect()
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
        SeriesError::InvalidSelector {
            selector: self.selector.to_string(),
            reason: reason.to_string(),
        }
    }
}
