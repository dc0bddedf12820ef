//! Rule-group evaluation ordering.
//!
//! Rule files are loaded in declaration order. A document may override
//! that with `group_eval_order`, which must then be a complete
//! permutation of the loaded group names: a partial order would silently
//! leave some groups at an unspecified position, so incompleteness is an
//! error rather than a best-effort sort.

use std::collections::{HashMap, HashSet};

use ruletest_rules::RuleGroup;

use crate::error::{HarnessError, Result};

/// Applies an explicit total order to the loaded rule groups.
///
/// With an empty `order` the groups keep load order. A non-empty `order`
/// must name every loaded group exactly once.
///
/// # Errors
///
/// Returns [`HarnessError::DuplicateRuleGroup`] when two rule files
/// define the same group name, [`HarnessError::DuplicateGroupInOrder`]
/// or [`HarnessError::UnknownGroupInOrder`] when the order repeats or
/// invents a name, and [`HarnessError::MissingGroupInOrder`] when a
/// loaded group is left out.
pub fn order_groups(groups: Vec<RuleGroup>, order: &[String]) -> Result<Vec<RuleGroup>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(groups.len());
    for group in &groups {
        if !seen.insert(group.name.as_str()) {
            return Err(HarnessError::DuplicateRuleGroup {
                name: group.name.clone(),
            });
        }
    }
    if order.is_empty() {
        return Ok(groups);
    }

    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(order.len());
    for (position, name) in order.iter().enumerate() {
        if positions.insert(name.as_str(), position).is_some() {
            return Err(HarnessError::DuplicateGroupInOrder { name: name.clone() });
        }
        if !groups.iter().any(|group| group.name == *name) {
            return Err(HarnessError::UnknownGroupInOrder { name: name.clone() });
        }
    }
    for group in &groups {
        if !positions.contains_key(group.name.as_str()) {
            return Err(HarnessError::MissingGroupInOrder {
                name: group.name.clone(),
            });
        }
    }

    let mut ordered = groups;
    ordered.sort_by_key(|group| {
        positions
            .get(group.name.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
    Ok(ordered)
}
