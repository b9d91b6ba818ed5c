//! Applying a reconciliation result to a collection

use std::collections::{HashMap, HashSet};

use super::{Policy, ReconciliationResult};
use crate::error::{Error, Result};
use crate::models::{Direction, Record, RecordId, Side};

/// Build the merged collection for `target` under `policy`.
///
/// `target` is not modified. Output keeps `target` order with conflicting ids
/// replaced in place, then appends remote-only additions missing from
/// `target` in result order. Local-only additions are never re-added: they
/// travel only by pushing, and one missing from `target` was deleted after
/// the reconciliation. A manual policy missing any decision fails with
/// [`Error::Policy`] before anything is built.
pub fn apply_resolution<P: Clone>(
    target: &[Record<P>],
    result: &ReconciliationResult<P>,
    policy: &Policy,
) -> Result<Vec<Record<P>>> {
    let missing = policy.missing_decisions(&result.conflicts);
    if !missing.is_empty() {
        let ids = missing
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::Policy(format!(
            "manual policy is missing decisions for: {ids}"
        )));
    }

    if let Policy::Manual(decisions) = policy {
        for id in decisions.keys() {
            if result.conflict(id).is_none() {
                tracing::debug!("Ignoring decision for non-conflicting id {}", id);
            }
        }
    }

    let mut seen: HashSet<&RecordId> = HashSet::with_capacity(target.len());
    for record in target {
        if !seen.insert(&record.id) {
            return Err(Error::DuplicateKey {
                side: Side::Local,
                id: record.id.clone(),
            });
        }
    }

    let mut chosen: HashMap<&RecordId, &Record<P>> = HashMap::with_capacity(result.conflicts.len());
    let mut decided_sides = Vec::with_capacity(result.conflicts.len());
    for conflict in &result.conflicts {
        let side = policy
            .decision_for(conflict)
            .ok_or_else(|| Error::Policy(format!("no decision for {}", conflict.id)))?;
        chosen.insert(&conflict.id, conflict.record_for(side));
        decided_sides.push((conflict, side));
    }

    let mut merged = target
        .iter()
        .map(|record| {
            chosen
                .get(&record.id)
                .map_or_else(|| record.clone(), |winner| (*winner).clone())
        })
        .collect::<Vec<_>>();

    // A conflicting id gone from the target was removed locally after the
    // reconciliation; only a remote decision brings it back.
    for (conflict, side) in decided_sides {
        if side == Side::Remote && seen.insert(&conflict.id) {
            merged.push(conflict.remote.clone());
        }
    }

    for addition in result.additions_toward(Direction::RemoteToLocal) {
        if seen.insert(&addition.record.id) {
            merged.push(addition.record.clone());
        }
    }

    Ok(merged)
}
