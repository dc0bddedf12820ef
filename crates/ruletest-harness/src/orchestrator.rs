//! Simulated-clock replay of one test group.
//!
//! Replay seeds the synthetic input series, then walks a virtual clock
//! from zero to the last asserted instant in group-tick steps. At each
//! tick every rule group whose own interval divides the clock evaluates,
//! in scheduler order, reading and writing the shared store. Firing-alert
//! snapshots are taken mid-replay because alert state is transient; query
//! assertions run afterwards against the fully replayed store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use ruletest_query::QueryEngine;
use ruletest_rules::{AlertInstance, GroupEvaluator, RuleGroup};
use ruletest_series::SampleStore;

use crate::document::TestGroup;
use crate::error::Result;

/// The observable outcome of replaying one test group: the final store
/// and the firing-alert snapshots its assertions asked for.
#[derive(Debug)]
pub struct GroupTimeline {
    store: SampleStore,
    snapshots: HashMap<(i64, String), Vec<AlertInstance>>,
    interval_ms: i64,
}

impl GroupTimeline {
    /// The fully replayed store: inputs plus every recorded output.
    #[must_use]
    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Clock tick the group replayed at, in milliseconds.
    #[must_use]
    pub const fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Firing instances snapshotted for `alertname` at `at_ms`, sorted by
    /// labels.
    ///
    /// Empty when nothing fired, and also when no alert assertion
    /// requested that instant and name.
    #[must_use]
    pub fn firing_at(&self, at_ms: i64, alertname: &str) -> &[AlertInstance] {
        self.snapshots
            .get(&(at_ms, alertname.to_string()))
            .map_or(&[], Vec::as_slice)
    }
}

/// Replays `group` against the already-ordered rule groups.
///
/// An alert assertion at time `T` observes the state left by the last
/// tick at or before `T`, so snapshots are taken for every requested
/// instant in `[tick, tick + interval)` right after the tick evaluates.
///
/// # Errors
///
/// Returns [`HarnessError::Series`](crate::HarnessError::Series) when an
/// input series fails to seed and
/// [`HarnessError::Rule`](crate::HarnessError::Rule) when a rule fails
/// during evaluation. Both abort the group.
pub fn replay(
    group: &TestGroup,
    rule_groups: &[RuleGroup],
    default_interval_ms: i64,
    lookback_ms: i64,
) -> Result<GroupTimeline> {
    let tick_ms = group.tick_interval_ms(default_interval_ms);
    let last_ms = group.last_assert_ms();
    let slots = usize::try_from(last_ms / tick_ms + 1).unwrap_or(1);

    let store = SampleStore::new();
    for input in &group.input_series {
        store.seed_series(&input.series, &input.values, tick_ms, slots)?;
    }

    let mut evaluators: Vec<GroupEvaluator> = rule_groups
        .iter()
        .map(|rules| {
            GroupEvaluator::new(
                rules.clone(),
                QueryEngine::with_lookback(lookback_ms),
                group.external_labels.clone(),
                group.external_url.clone(),
            )
        })
        .collect();

    let mut wanted: BTreeMap<i64, BTreeSet<&str>> = BTreeMap::new();
    for assertion in &group.alert_rule_test {
        wanted
            .entry(assertion.eval_time.millis())
            .or_default()
            .insert(assertion.alertname.as_str());
    }

    let mut snapshots = HashMap::new();
    let mut clock_ms = 0;
    while clock_ms <= last_ms {
        for evaluator in &mut evaluators {
            if clock_ms % evaluator.interval_ms(default_interval_ms) == 0 {
                trace!(
                    group = evaluator.group_name(),
                    clock_ms,
                    "evaluating rule group"
                );
                evaluator.evaluate(&store, clock_ms)?;
            }
        }
        for (&at_ms, names) in wanted.range(clock_ms..clock_ms + tick_ms) {
            for name in names {
                let mut instances: Vec<AlertInstance> = evaluators
                    .iter()
                    .flat_map(|evaluator| evaluator.firing_alerts(name))
                    .collect();
                instances.sort_by(|a, b| a.labels.cmp(&b.labels));
                snapshots.insert((at_ms, (*name).to_string()), instances);
            }
        }
        clock_ms += tick_ms;
    }
    debug!(
        ticks = last_ms / tick_ms + 1,
        series = store.series_count(),
        snapshots = snapshots.len(),
        "replayed test group"
    );

    Ok(GroupTimeline {
        store,
        snapshots,
        interval_ms: tick_ms,
    })
}
