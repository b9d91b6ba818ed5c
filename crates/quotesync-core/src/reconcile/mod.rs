//! Two-way reconciliation of record collections.
//!
//! [`reconcile`] classifies every id in the union of a local and a remote
//! collection as an addition, a conflict, or unchanged. It is pure: no I/O and
//! no clock. [`apply_resolution`] turns a classification into a merged
//! collection under a [`Policy`].

mod apply;
mod policy;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Direction, Record, RecordId, Side};

pub use apply::apply_resolution;
pub use policy::Policy;

/// Side that wins a conflict whose copies carry the same `updated_at`.
pub const DEFAULT_TIE_BREAKER: Side = Side::Remote;

/// A record present on exactly one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addition<P> {
    pub record: Record<P>,
    pub direction: Direction,
}

/// Two copies of the same id whose payloads differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict<P> {
    pub id: RecordId,
    pub local: Record<P>,
    pub remote: Record<P>,
    /// Side with the strictly later `updated_at`, or the tie-breaker
    pub winner: Side,
}

impl<P> Conflict<P> {
    /// The copy held by `side`
    pub const fn record_for(&self, side: Side) -> &Record<P> {
        match side {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }

    /// The copy chosen by timestamp comparison
    pub const fn newest(&self) -> &Record<P> {
        self.record_for(self.winner)
    }
}

/// Output of one reconciliation pass. Computed fresh per sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult<P> {
    pub additions: Vec<Addition<P>>,
    pub conflicts: Vec<Conflict<P>>,
    pub unchanged: Vec<Record<P>>,
}

impl<P> Default for ReconciliationResult<P> {
    fn default() -> Self {
        Self {
            additions: Vec::new(),
            conflicts: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<P> ReconciliationResult<P> {
    /// True when no conflict needs a decision
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of distinct ids classified
    pub fn len(&self) -> usize {
        self.additions.len() + self.conflicts.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a conflict by id
    pub fn conflict(&self, id: &RecordId) -> Option<&Conflict<P>> {
        self.conflicts.iter().find(|conflict| &conflict.id == id)
    }

    /// Additions travelling in `direction`
    pub fn additions_toward(&self, direction: Direction) -> impl Iterator<Item = &Addition<P>> {
        self.additions
            .iter()
            .filter(move |addition| addition.direction == direction)
    }
}

/// Reconciler with a configurable tie-breaking rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    tie_breaker: Side,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    /// Reconciler using [`DEFAULT_TIE_BREAKER`]
    pub const fn new() -> Self {
        Self {
            tie_breaker: DEFAULT_TIE_BREAKER,
        }
    }

    pub const fn with_tie_breaker(tie_breaker: Side) -> Self {
        Self { tie_breaker }
    }

    pub const fn tie_breaker(&self) -> Side {
        self.tie_breaker
    }

    /// Pick the side with the later timestamp; equal timestamps go to the
    /// tie-breaker.
    pub const fn winner(&self, local_updated_at: i64, remote_updated_at: i64) -> Side {
        if local_updated_at > remote_updated_at {
            Side::Local
        } else if remote_updated_at > local_updated_at {
            Side::Remote
        } else {
            self.tie_breaker
        }
    }

    /// Classify every id in the union of `local` and `remote`.
    ///
    /// Output order follows the first appearance of each id in `remote`, then
    /// in `local`. Fails with [`Error::DuplicateKey`] when either side repeats
    /// an id.
    pub fn reconcile<P: Clone + PartialEq>(
        &self,
        local: &[Record<P>],
        remote: &[Record<P>],
    ) -> Result<ReconciliationResult<P>> {
        let local_index = index_by_id(local, Side::Local)?;
        let remote_index = index_by_id(remote, Side::Remote)?;

        let mut result = ReconciliationResult::default();

        for remote_record in remote {
            match local_index.get(&remote_record.id) {
                None => result.additions.push(Addition {
                    record: remote_record.clone(),
                    direction: Direction::RemoteToLocal,
                }),
                Some(local_record) if local_record.payload == remote_record.payload => {
                    result.unchanged.push((*local_record).clone());
                }
                Some(local_record) => result.conflicts.push(Conflict {
                    id: remote_record.id.clone(),
                    local: (*local_record).clone(),
                    remote: remote_record.clone(),
                    winner: self.winner(local_record.updated_at, remote_record.updated_at),
                }),
            }
        }

        for local_record in local {
            if !remote_index.contains_key(&local_record.id) {
                result.additions.push(Addition {
                    record: local_record.clone(),
                    direction: Direction::LocalToRemote,
                });
            }
        }

        tracing::debug!(
            additions = result.additions.len(),
            conflicts = result.conflicts.len(),
            unchanged = result.unchanged.len(),
            "Reconciled collections"
        );

        Ok(result)
    }
}

/// Reconcile with the default tie-breaker (remote wins ties).
pub fn reconcile<P: Clone + PartialEq>(
    local: &[Record<P>],
    remote: &[Record<P>],
) -> Result<ReconciliationResult<P>> {
    Reconciler::new().reconcile(local, remote)
}

/// Return the first id that appears more than once, if any.
pub fn find_duplicate_id<P>(records: &[Record<P>]) -> Option<&RecordId> {
    let mut seen = std::collections::HashSet::with_capacity(records.len());
    records
        .iter()
        .map(|record| &record.id)
        .find(|id| !seen.insert(*id))
}

fn index_by_id<P>(records: &[Record<P>], side: Side) -> Result<HashMap<&RecordId, &Record<P>>> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        if index.insert(&record.id, record).is_some() {
            return Err(Error::DuplicateKey {
                side,
                id: record.id.clone(),
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn rec(id: &str, payload: &str, updated_at: i64) -> Record<String> {
        Record::new(id, payload.to_string(), updated_at)
    }

    #[test]
    fn identical_collections_are_unchanged() {
        let records = vec![rec("a", "X", 1), rec("b", "Y", 2)];
        let result = reconcile(&records, &records).unwrap();

        assert!(result.additions.is_empty());
        assert!(result.conflicts.is_empty());
        assert_eq!(result.unchanged, records);
    }

    #[test]
    fn classifies_worked_example() {
        let local = vec![rec("a", "X", 100)];
        let remote = vec![rec("a", "Y", 200), rec("b", "Z", 50)];

        let result = reconcile(&local, &remote).unwrap();

        assert_eq!(
            result.additions,
            vec![Addition {
                record: rec("b", "Z", 50),
                direction: Direction::RemoteToLocal,
            }]
        );
        assert_eq!(
            result.conflicts,
            vec![Conflict {
                id: RecordId::new("a"),
                local: rec("a", "X", 100),
                remote: rec("a", "Y", 200),
                winner: Side::Remote,
            }]
        );
        assert!(result.unchanged.is_empty());
    }

    #[test]
    fn local_only_records_travel_to_remote() {
        let local = vec![rec("mine", "X", 1)];
        let result = reconcile(&local, &[]).unwrap();

        assert_eq!(result.additions.len(), 1);
        assert_eq!(result.additions[0].direction, Direction::LocalToRemote);
        assert_eq!(
            result
                .additions_toward(Direction::RemoteToLocal)
                .count(),
            0
        );
    }

    #[test]
    fn newest_side_wins_and_ties_go_to_remote() {
        let reconciler = Reconciler::new();
        assert_eq!(reconciler.winner(200, 100), Side::Local);
        assert_eq!(reconciler.winner(100, 200), Side::Remote);
        assert_eq!(reconciler.winner(100, 100), Side::Remote);
    }

    #[test]
    fn tie_breaker_is_configurable() {
        let reconciler = Reconciler::with_tie_breaker(Side::Local);
        let result = reconciler
            .reconcile(&[rec("a", "X", 5)], &[rec("a", "Y", 5)])
            .unwrap();
        assert_eq!(result.conflicts[0].winner, Side::Local);
        assert_eq!(result.conflicts[0].newest().payload, "X");
    }

    #[test]
    fn same_payload_with_different_timestamps_is_unchanged() {
        let result = reconcile(&[rec("a", "X", 1)], &[rec("a", "X", 9)]).unwrap();
        assert!(result.conflicts.is_empty());
        assert_eq!(result.unchanged, vec![rec("a", "X", 1)]);
    }

    #[test]
    fn rejects_duplicate_ids_per_side() {
        let duplicated = vec![rec("a", "X", 1), rec("a", "Y", 2)];

        let error = reconcile(&duplicated, &[]).unwrap_err();
        assert!(matches!(
            error,
            Error::DuplicateKey { side: Side::Local, ref id } if id.as_str() == "a"
        ));

        let error = reconcile(&[], &duplicated).unwrap_err();
        assert!(matches!(error, Error::DuplicateKey { side: Side::Remote, .. }));
    }

    #[test]
    fn output_order_follows_remote_then_local() {
        let local = vec![rec("l2", "x", 1), rec("shared", "a", 1), rec("l1", "x", 1)];
        let remote = vec![rec("r1", "x", 1), rec("shared", "b", 1), rec("r2", "x", 1)];

        let result = reconcile(&local, &remote).unwrap();
        let order = result
            .additions
            .iter()
            .map(|addition| addition.record.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["r1", "r2", "l2", "l1"]);
    }

    #[test]
    fn find_duplicate_id_reports_first_repeat() {
        let records = vec![rec("a", "1", 1), rec("b", "1", 1), rec("a", "2", 1)];
        assert_eq!(find_duplicate_id(&records).map(RecordId::as_str), Some("a"));
        assert!(find_duplicate_id(&records[..2]).is_none());
    }

    fn collection(max: usize) -> impl Strategy<Value = Vec<Record<String>>> {
        prop::collection::btree_map(0u8..24, ("[ab]", 0i64..4), 0..max).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(id, (payload, ts))| Record::new(format!("q{id}"), payload, ts))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn every_id_lands_in_exactly_one_bucket(
            local in collection(16),
            remote in collection(16),
        ) {
            let result = reconcile(&local, &remote).unwrap();

            let mut seen = HashSet::new();
            let ids = result
                .additions
                .iter()
                .map(|addition| addition.record.id.clone())
                .chain(result.conflicts.iter().map(|conflict| conflict.id.clone()))
                .chain(result.unchanged.iter().map(|record| record.id.clone()));
            for id in ids {
                prop_assert!(seen.insert(id));
            }

            let union = local
                .iter()
                .chain(remote.iter())
                .map(|record| record.id.clone())
                .collect::<HashSet<_>>();
            prop_assert_eq!(seen, union);
        }

        #[test]
        fn reconciling_a_collection_with_itself_is_a_no_op(records in collection(16)) {
            let result = reconcile(&records, &records).unwrap();
            prop_assert!(result.additions.is_empty());
            prop_assert!(result.conflicts.is_empty());
            prop_assert_eq!(result.unchanged, records);
        }

        #[test]
        fn reconcile_is_deterministic(
            local in collection(16),
            remote in collection(16),
        ) {
            let first = reconcile(&local, &remote).unwrap();
            let second = reconcile(&local, &remote).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
