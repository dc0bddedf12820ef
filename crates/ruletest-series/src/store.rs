//! In-memory sample storage for one test group.
//!
//! The [`SampleStore`] holds every synthetic input series plus any samples
//! rule evaluation writes back. Each test group owns a private store, so the
//! store never outlives a single group's simulated timeline.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, SeriesError};
use crate::labels::Labels;
use crate::pattern::expand;
use crate::value::Sample;

/// Thread-safe in-memory storage for timestamped samples keyed by label set.
///
/// Samples per series are kept sorted by timestamp. Instant lookups honor a
/// lookback window and explicit staleness: a stale marker is a real entry
/// that hides the series from queries at or after its timestamp until a
/// later concrete value supersedes it.
#[derive(Debug)]
pub struct SampleStore {
    data: Arc<RwLock<HashMap<Labels, Vec<Sample>>>>,
}

impl SampleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Expands a value pattern and inserts its samples at `tick × interval`.
    ///
    /// Gaps produce no entry; stale markers are stored explicitly. Returns
    /// the parsed series identity.
    ///
    /// # Errors
    ///
    /// Returns `SeriesError::InvalidInterval` for a non-positive interval,
    /// `SeriesError::DuplicateSeries` if the store already holds a series
    /// with the same label set, and pattern/selector errors from parsing.
    pub fn seed_series(
        &self,
        series: &str,
        values: &str,
        interval_ms: i64,
        min_slots: usize,
    ) -> Result<Labels> {
        if interval_ms <= 0 {
            return Err(SeriesError::InvalidInterval {
                millis: interval_ms,
            });
        }
        let labels = Labels::parse(series)?;
        let steps = expand(values, min_slots)?;

        let mut samples = Vec::new();
        for (tick, step) in steps.iter().enumerate() {
            if let Some(value) = step.value() {
                samples.push(Sample::new(tick as i64 * interval_ms, value.clone()));
            }
        }

        let mut data = self.data.write();
        if data.contains_key(&labels) {
            return Err(SeriesError::DuplicateSeries {
                series: labels.to_string(),
            });
        }
        debug!(
            series = %labels,
            samples = samples.len(),
            interval_ms,
            "seeded synthetic series"
        );
        data.insert(labels.clone(), samples);
        Ok(labels)
    }

    /// Inserts one sample, keeping the series sorted by timestamp.
    ///
    /// A sample at an already-occupied timestamp replaces the existing entry
    /// (rule evaluation re-writes an output series at the current tick).
    pub fn insert(&self, labels: &Labels, sample: Sample) {
        let mut data = self.data.write();
        let samples = data.entry(labels.clone()).or_default();
        match samples.binary_search_by_key(&sample.timestamp_ms, |s| s.timestamp_ms) {
            Ok(pos) => samples[pos] = sample,
            Err(pos) => samples.insert(pos, sample),
        }
    }

    /// Returns the newest sample visible at `at_ms` under the lookback rule.
    ///
    /// A sample at `ts` is visible when `at_ms − lookback_ms ≤ ts ≤ at_ms`.
    /// Returns `None` when no sample is in the window or when the newest
    /// in-window entry is a stale marker.
    #[must_use]
    pub fn latest(&self, labels: &Labels, at_ms: i64, lookback_ms: i64) -> Option<Sample> {
        let data = self.data.read();
        let samples = data.get(labels)?;
        let idx = samples.partition_point(|s| s.timestamp_ms <= at_ms);
        if idx == 0 {
            return None;
        }
        let candidate = &samples[idx - 1];
        if candidate.timestamp_ms < at_ms - lookback_ms {
            return None;
        }
        if candidate.value.is_stale() {
            return None;
        }
        Some(candidate.clone())
    }

    /// Returns all concrete samples with `from_ms ≤ ts ≤ to_ms`, in
    /// timestamp order. Stale markers are skipped.
    #[must_use]
    pub fn window(&self, labels: &Labels, from_ms: i64, to_ms: i64) -> Vec<Sample> {
        let data = self.data.read();
        data.get(labels).map_or_else(Vec::new, |samples| {
            samples
                .iter()
                .filter(|s| {
                    s.timestamp_ms >= from_ms && s.timestamp_ms <= to_ms && !s.value.is_stale()
                })
                .cloned()
                .collect()
        })
    }

    /// Returns every series identity in the store, sorted, for deterministic
    /// iteration.
    #[must_use]
    pub fn series(&self) -> Vec<Labels> {
        let data = self.data.read();
        let mut out: Vec<Labels> = data.keys().cloned().collect();
        out.sort();
        out
    }

    /// Returns the number of distinct series.
    #[must_use]
    pub fn series_count(&self) -> usize {
        let data = self.data.read();
        data.len()
    }

    /// Returns the number of stored samples for a series (stale markers
    /// included), or 0 if the series is absent.
    #[must_use]
    pub fn sample_count(&self, labels: &Labels) -> usize {
        let data = self.data.read();
        data.get(labels).map_or(0, Vec::len)
    }

    /// Removes all series.
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
    }
}

impl Clone for SampleStore {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}
