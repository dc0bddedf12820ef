//! Annotation and label template expansion.
//!
//! Rule files may reference the matched series and test context inside
//! annotation and label values: `{{ $labels.instance }}`, `{{ $value }}`,
//! `{{ $externalLabels.cluster }}`, and `{{ $externalURL }}`. A placeholder
//! referencing anything else is left as written, so unsupported template
//! constructs surface verbatim in diffs instead of silently vanishing.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use ruletest_series::Labels;

/// Matches one `{{ ... }}` placeholder span.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap_or_else(|_| unreachable!()));

/// Values a template can reference.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// The alert instance's resolved labels.
    pub labels: &'a Labels,
    /// The value of the row that activated the instance.
    pub value: f64,
    /// External labels supplied by the test group.
    pub external_labels: &'a Labels,
    /// External URL supplied by the test group.
    pub external_url: &'a str,
}

/// Expands every recognized placeholder in `template`.
#[must_use]
pub fn expand(template: &str, ctx: &TemplateContext<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            resolve(&caps[1], ctx).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn resolve(reference: &str, ctx: &TemplateContext<'_>) -> Option<String> {
    if reference == "$value" {
        return Some(format!("{}", ctx.value));
    }
    if reference == "$externalURL" {
        return Some(ctx.external_url.to_string());
    }
    if let Some(name) = reference.strip_prefix("$labels.") {
        return Some(ctx.labels.get(name).unwrap_or("").to_string());
    }
    if let Some(name) = reference.strip_prefix("$externalLabels.") {
        return Some(ctx.external_labels.get(name).unwrap_or("").to_string());
    }
    None
}
