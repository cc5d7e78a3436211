//! Flatten cycle records into one usage record per server.

use std::collections::BTreeMap;

use super::types::{UsageCycle, UsagePayload};

/// Usage of a single server within its most recent cycle
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUsage {
    /// Server id from the payload
    pub id: String,
    /// Server display name, matched against host labels
    pub name: String,
    /// Bytes used
    pub used: f64,
    /// Byte quota
    pub max: f64,
    /// Cycle display name
    pub cycle_label: String,
    /// Period start (raw)
    pub from: String,
    /// Period end (raw)
    pub to: String,
    /// Next scheduled update (raw), if reported
    pub next_update: Option<String>,
}

/// Resolve every server mentioned in the payload to a single record.
///
/// Cycles are visited in [`cycle_order`] and a later cycle replaces an
/// earlier one for the same server name. Records lacking a name, used bytes,
/// quota or period bounds are dropped.
pub fn flatten_cycles(payload: &UsagePayload) -> BTreeMap<String, EntityUsage> {
    let mut resolved = BTreeMap::new();

    for cycle in cycle_order(payload) {
        let (Some(max), Some(from), Some(to)) = (cycle.max, cycle.from.as_ref(), cycle.to.as_ref())
        else {
            continue;
        };

        for (id, name) in &cycle.server_name {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let Some(&used) = cycle.transfer.get(id) else {
                continue;
            };

            resolved.insert(
                name.to_string(),
                EntityUsage {
                    id: id.clone(),
                    name: name.to_string(),
                    used,
                    max,
                    cycle_label: cycle.name.clone().unwrap_or_default(),
                    from: from.clone(),
                    to: to.clone(),
                    next_update: cycle.next_update.get(id).cloned(),
                },
            );
        }
    }

    resolved
}

/// Cycles in the order the dashboard enumerates them: integer ids first in
/// ascending numeric order, then the remaining ids by name.
pub fn cycle_order(payload: &UsagePayload) -> Vec<&UsageCycle> {
    let mut cycles: Vec<(&String, &UsageCycle)> = payload.iter().collect();
    cycles.sort_by(|(a, _), (b, _)| {
        integer_rank(a)
            .cmp(&integer_rank(b))
            .then_with(|| a.cmp(b))
    });
    cycles.into_iter().map(|(_, cycle)| cycle).collect()
}

/// `(0, n)` for canonical integer ids, `(1, 0)` for everything else
fn integer_rank(id: &str) -> (u8, u64) {
    match id.parse::<u64>() {
        Ok(n) if n.to_string() == id => (0, n),
        _ => (1, 0),
    }
}
