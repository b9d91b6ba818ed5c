//! Single-flight sync engine

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::{PendingSync, ResolveProgress, SyncOutcome, SyncPhase, SyncReport};
use crate::config::SyncSettings;
use crate::db::CollectionStore;
use crate::error::{Error, Result};
use crate::models::{Direction, Record, RecordId, Side, SyncConflict};
use crate::reconcile::{
    apply_resolution, find_duplicate_id, Conflict, Policy, ReconciliationResult, Reconciler,
};
use crate::remote::RemoteSource;
use crate::util::now_millis;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

struct EngineState<P> {
    phase: SyncPhase,
    pending: Option<PendingSync<P>>,
    last_synced_at: Option<i64>,
}

/// Holds the single-flight slot; the phase falls back to `Idle` when dropped
/// without [`Slot::finish`], so a cancelled or failed attempt never wedges
/// the engine.
struct Slot<'a, P> {
    state: &'a Mutex<EngineState<P>>,
    armed: bool,
}

impl<P> Slot<'_, P> {
    fn set_phase(&self, phase: SyncPhase) {
        self.state.lock().phase = phase;
    }

    fn finish(mut self, update: impl FnOnce(&mut EngineState<P>)) {
        update(&mut self.state.lock());
        self.armed = false;
    }
}

impl<P> Drop for Slot<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().phase = SyncPhase::Idle;
        }
    }
}

/// Drives `Idle -> Fetching -> Reconciling -> {Clean | ConflictsPending}`
/// over a persistence collaborator `S` and a remote collaborator `R`.
pub struct SyncEngine<P, S, R> {
    store: S,
    remote: R,
    reconciler: Reconciler,
    fetch_timeout: Duration,
    state: Mutex<EngineState<P>>,
}

impl<P, S, R> SyncEngine<P, S, R>
where
    P: Clone + PartialEq,
    S: CollectionStore<P>,
    R: RemoteSource<P>,
{
    pub fn new(store: S, remote: R) -> Self {
        Self {
            store,
            remote,
            reconciler: Reconciler::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            state: Mutex::new(EngineState {
                phase: SyncPhase::Idle,
                pending: None,
                last_synced_at: None,
            }),
        }
    }

    /// Engine using the timeout and tie-breaker from `settings`
    pub fn from_settings(store: S, remote: R, settings: &SyncSettings) -> Self {
        Self::new(store, remote)
            .with_fetch_timeout(settings.fetch_timeout())
            .with_reconciler(Reconciler::with_tie_breaker(settings.tie_breaker))
    }

    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    /// Seed the last-sync time, e.g. from persisted settings
    #[must_use]
    pub fn with_last_synced_at(self, last_synced_at: Option<i64>) -> Self {
        self.state.lock().last_synced_at = last_synced_at;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.lock().phase
    }

    /// When a merged collection was last committed (Unix ms)
    pub fn last_synced_at(&self) -> Option<i64> {
        self.state.lock().last_synced_at
    }

    /// Run one sync attempt.
    ///
    /// Returns [`SyncOutcome::Busy`] without side effects while another
    /// operation is in flight. Conflicts the policy cannot decide park the
    /// engine in `ConflictsPending`; a new attempt discards them. On any error
    /// the engine returns to `Idle` and the local collection is untouched.
    pub async fn start_sync(&self, policy: Policy) -> Result<SyncOutcome<P>> {
        let Some(slot) = self.acquire(SyncPhase::Fetching, true) else {
            tracing::debug!("Sync requested while another operation is in flight");
            return Ok(SyncOutcome::Busy);
        };

        let remote = self.fetch_remote().await?;

        slot.set_phase(SyncPhase::Reconciling);
        let local = self.store.load_collection().await?;
        let result = self.reconciler.reconcile(&local, &remote)?;

        if policy.missing_decisions(&result.conflicts).is_empty() {
            let report = self.commit(&local, &result, &policy).await?;
            slot.finish(|state| {
                state.phase = SyncPhase::Idle;
                state.last_synced_at = Some(report.synced_at);
            });
            return Ok(SyncOutcome::Clean(report));
        }

        let conflicts = result.conflicts.clone();
        let decisions = match policy {
            Policy::Manual(decisions) => decisions
                .into_iter()
                .filter(|(id, _)| result.conflict(id).is_some())
                .collect(),
            _ => BTreeMap::new(),
        };
        tracing::info!(
            conflicts = conflicts.len(),
            decided = decisions.len(),
            "Sync waiting for conflict decisions"
        );
        slot.finish(|state| {
            state.phase = SyncPhase::ConflictsPending;
            state.pending = Some(PendingSync {
                result,
                decisions,
                detected_at: now_millis(),
            });
        });
        Ok(SyncOutcome::Pending(conflicts))
    }

    /// Conflicts awaiting a decision; empty unless `ConflictsPending`
    pub fn pending_conflicts(&self) -> Vec<Conflict<P>> {
        self.state
            .lock()
            .pending
            .as_ref()
            .map(|pending| pending.conflicts().to_vec())
            .unwrap_or_default()
    }

    /// Record a decision for one pending conflict.
    ///
    /// Once every conflict is decided the merged collection is applied to the
    /// current local collection and saved.
    pub async fn resolve_conflict(&self, id: &RecordId, side: Side) -> Result<ResolveProgress> {
        {
            let mut state = self.state.lock();
            let pending = match state.pending.as_mut() {
                Some(pending) if pending.result.conflict(id).is_some() => pending,
                _ => return Err(Error::NoSuchConflict(id.clone())),
            };
            pending.decisions.insert(id.clone(), side);
            let remaining = pending.undecided().count();
            tracing::debug!("Recorded {} for conflict {}, {} remaining", side, id, remaining);
            if remaining > 0 {
                return Ok(ResolveProgress::Remaining(remaining));
            }
        }

        self.apply_pending().await.map(ResolveProgress::Applied)
    }

    /// Decide every undecided pending conflict for `side` and apply
    pub async fn accept_all(&self, side: Side) -> Result<SyncReport> {
        {
            let mut state = self.state.lock();
            let Some(pending) = state.pending.as_mut() else {
                return Err(Error::Policy("no conflicts are pending".to_string()));
            };
            let undecided = pending
                .undecided()
                .map(|conflict| conflict.id.clone())
                .collect::<Vec<_>>();
            for id in undecided {
                pending.decisions.insert(id, side);
            }
        }

        self.apply_pending().await
    }

    /// Drop pending conflicts without applying anything.
    ///
    /// Returns how many conflicts were discarded.
    pub fn dismiss(&self) -> usize {
        let mut state = self.state.lock();
        if state.phase != SyncPhase::ConflictsPending {
            return 0;
        }
        state.phase = SyncPhase::Idle;
        let dismissed = state
            .pending
            .take()
            .map_or(0, |pending| pending.conflicts().len());
        tracing::info!("Dismissed {} pending conflicts", dismissed);
        dismissed
    }

    /// Snapshot of the pending conflicts and decisions, for persistence
    pub fn export_pending(&self) -> Option<PendingSync<P>> {
        self.state.lock().pending.clone()
    }

    /// Re-enter `ConflictsPending` from a saved snapshot.
    ///
    /// An empty snapshot is ignored. Fails with [`Error::Busy`] while an
    /// operation is in flight.
    pub fn restore_pending(&self, pending: PendingSync<P>) -> Result<()> {
        let mut state = self.state.lock();
        if state.phase.is_in_flight() {
            return Err(Error::Busy);
        }
        if pending.conflicts().is_empty() {
            return Ok(());
        }
        state.phase = SyncPhase::ConflictsPending;
        state.pending = Some(pending);
        Ok(())
    }

    /// Upload the local collection to the remote, replacing its contents.
    ///
    /// Refused while conflicts are pending, since the upload would overwrite
    /// the remote copies awaiting a decision.
    pub async fn push(&self) -> Result<usize> {
        let Some(slot) = self.acquire(SyncPhase::Pushing, false) else {
            return Err(Error::Busy);
        };

        let local = self.store.load_collection().await?;
        if let Some(id) = find_duplicate_id(&local) {
            return Err(Error::DuplicateKey {
                side: Side::Local,
                id: id.clone(),
            });
        }

        match tokio::time::timeout(self.fetch_timeout, self.remote.push_collection(&local)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return Err(as_fetch_error(error)),
            Err(_) => {
                return Err(Error::Fetch(format!(
                    "push timed out after {} ms",
                    self.fetch_timeout.as_millis()
                )))
            }
        }

        slot.finish(|state| state.phase = SyncPhase::Idle);
        tracing::info!("Pushed {} records", local.len());
        Ok(local.len())
    }

    /// Sync every `interval` until `shutdown` flips to `true` or its sender
    /// is dropped.
    ///
    /// Ticks are skipped while an operation is in flight or conflicts are
    /// pending. Returns the number of attempts made.
    pub async fn run_periodic(
        &self,
        interval: Duration,
        policy: Policy,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempts = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.phase() != SyncPhase::Idle {
                        tracing::debug!("Skipping periodic sync while {:?}", self.phase());
                        continue;
                    }
                    attempts += 1;
                    match self.start_sync(policy.clone()).await {
                        Ok(SyncOutcome::Clean(report)) => tracing::info!(
                            pulled = report.pulled,
                            resolved = report.resolved.len(),
                            total = report.total,
                            "Periodic sync complete"
                        ),
                        Ok(SyncOutcome::Pending(conflicts)) => tracing::info!(
                            "Periodic sync found {} conflicts needing a decision",
                            conflicts.len()
                        ),
                        Ok(SyncOutcome::Busy) => {}
                        Err(error) if error.is_retryable() => {
                            tracing::warn!("Periodic sync failed, retrying next tick: {}", error);
                        }
                        Err(error) => tracing::warn!("Periodic sync failed: {}", error),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Periodic sync stopped after {} attempts", attempts);
        attempts
    }

    fn acquire(&self, phase: SyncPhase, supersede: bool) -> Option<Slot<'_, P>> {
        let mut state = self.state.lock();
        if state.phase.is_in_flight() {
            return None;
        }
        if state.phase == SyncPhase::ConflictsPending {
            if !supersede {
                return None;
            }
            if let Some(pending) = state.pending.take() {
                tracing::info!(
                    "Discarding {} pending conflicts for a new sync",
                    pending.conflicts().len()
                );
            }
        }
        state.phase = phase;
        Some(Slot {
            state: &self.state,
            armed: true,
        })
    }

    async fn fetch_remote(&self) -> Result<Vec<Record<P>>> {
        let records = match tokio::time::timeout(self.fetch_timeout, self.remote.fetch_collection())
            .await
        {
            Ok(Ok(records)) => records,
            Ok(Err(error)) => {
                tracing::warn!("Fetch failed: {}", error);
                return Err(as_fetch_error(error));
            }
            Err(_) => {
                tracing::warn!("Fetch timed out after {:?}", self.fetch_timeout);
                return Err(Error::Fetch(format!(
                    "timed out after {} ms",
                    self.fetch_timeout.as_millis()
                )));
            }
        };

        if let Some(id) = find_duplicate_id(&records) {
            return Err(Error::Fetch(format!(
                "remote collection contains id '{id}' more than once"
            )));
        }
        Ok(records)
    }

    async fn apply_pending(&self) -> Result<SyncReport> {
        let pending = {
            let mut state = self.state.lock();
            if state.phase != SyncPhase::ConflictsPending {
                return Err(Error::Busy);
            }
            let Some(pending) = state.pending.take() else {
                return Err(Error::Policy("no conflicts are pending".to_string()));
            };
            state.phase = SyncPhase::Reconciling;
            pending
        };
        let slot = Slot {
            state: &self.state,
            armed: true,
        };

        let policy = Policy::Manual(pending.decisions.clone());
        let outcome = match self.store.load_collection().await {
            Ok(current) => self.commit(&current, &pending.result, &policy).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(report) => {
                slot.finish(|state| {
                    state.phase = SyncPhase::Idle;
                    state.last_synced_at = Some(report.synced_at);
                });
                Ok(report)
            }
            Err(error) => {
                tracing::warn!("Applying resolved conflicts failed: {}", error);
                slot.finish(|state| {
                    state.phase = SyncPhase::ConflictsPending;
                    state.pending = Some(pending);
                });
                Err(error)
            }
        }
    }

    async fn commit(
        &self,
        target: &[Record<P>],
        result: &ReconciliationResult<P>,
        policy: &Policy,
    ) -> Result<SyncReport> {
        let merged = apply_resolution(target, result, policy)?;
        self.store.save_collection(&merged).await?;

        let synced_at = now_millis();
        let report = SyncReport {
            pulled: result.additions_toward(Direction::RemoteToLocal).count(),
            local_only: result.additions_toward(Direction::LocalToRemote).count(),
            unchanged: result.unchanged.len(),
            resolved: resolved_conflicts(result, policy, synced_at),
            total: merged.len(),
            synced_at,
        };
        tracing::info!(
            pulled = report.pulled,
            local_only = report.local_only,
            resolved = report.resolved.len(),
            total = report.total,
            policy = policy.name(),
            "Sync applied"
        );
        if let Err(error) = self.store.record_sync(&report).await {
            tracing::warn!("Failed to record sync history: {}", error);
        }
        Ok(report)
    }
}

fn resolved_conflicts<P>(
    result: &ReconciliationResult<P>,
    policy: &Policy,
    resolved_at: i64,
) -> Vec<SyncConflict> {
    result
        .conflicts
        .iter()
        .filter_map(|conflict| {
            policy.decision_for(conflict).map(|winner| SyncConflict {
                id: 0,
                quote_id: conflict.id.to_string(),
                local_updated_at: conflict.local.updated_at,
                remote_updated_at: conflict.remote.updated_at,
                winner,
                resolved_at,
                strategy: policy.name().to_string(),
            })
        })
        .collect()
}

fn as_fetch_error(error: Error) -> Error {
    match error {
        Error::Fetch(_) => error,
        other => Error::Fetch(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::remote::{FaultPlan, SimulatedServer};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    type Engine = SyncEngine<String, Arc<MemoryStore<String>>, Arc<SimulatedServer<String>>>;

    fn rec(id: &str, payload: &str, updated_at: i64) -> Record<String> {
        Record::new(id, payload.to_string(), updated_at)
    }

    fn engine(local: Vec<Record<String>>, remote: Vec<Record<String>>) -> Engine {
        SyncEngine::new(
            Arc::new(MemoryStore::new(local)),
            Arc::new(SimulatedServer::new(remote)),
        )
    }

    fn worked_example() -> Engine {
        engine(
            vec![rec("a", "X", 100)],
            vec![rec("a", "Y", 200), rec("b", "Z", 50)],
        )
    }

    #[tokio::test]
    async fn clean_sync_applies_newest() {
        let engine = worked_example();

        let outcome = engine.start_sync(Policy::PreferNewest).await.unwrap();

        let SyncOutcome::Clean(report) = outcome else {
            panic!("expected a clean sync");
        };
        assert_eq!(report.pulled, 1);
        assert_eq!(report.resolved.len(), 1);
        assert_eq!(report.resolved[0].winner, Side::Remote);
        assert_eq!(report.resolved[0].strategy, "newest");
        assert_eq!(report.total, 2);
        assert_eq!(
            engine.store().records(),
            vec![rec("a", "Y", 200), rec("b", "Z", 50)]
        );
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.last_synced_at(), Some(report.synced_at));
    }

    #[tokio::test]
    async fn prefer_local_keeps_local_copy() {
        let engine = worked_example();
        engine.start_sync(Policy::PreferLocal).await.unwrap();
        assert_eq!(
            engine.store().records(),
            vec![rec("a", "X", 100), rec("b", "Z", 50)]
        );
    }

    #[tokio::test]
    async fn second_request_while_fetching_is_busy() {
        let engine = SyncEngine::new(
            Arc::new(MemoryStore::new(vec![rec("a", "X", 100)])),
            Arc::new(
                SimulatedServer::new(vec![rec("b", "Z", 50)])
                    .with_latency(Duration::from_millis(50)),
            ),
        );

        let (first, second) = tokio::join!(
            engine.start_sync(Policy::PreferNewest),
            engine.start_sync(Policy::PreferNewest)
        );

        assert!(matches!(first.unwrap(), SyncOutcome::Clean(_)));
        assert_eq!(second.unwrap(), SyncOutcome::Busy);
        assert_eq!(engine.remote().fetch_count(), 1);
        assert_eq!(engine.store().save_count(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_returns_to_idle_and_leaves_local_untouched() {
        let engine = worked_example();
        engine.remote().set_faults(FaultPlan::FailNext(1));

        let error = engine.start_sync(Policy::PreferNewest).await.unwrap_err();
        assert!(matches!(error, Error::Fetch(_)));
        assert!(error.is_retryable());
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.store().records(), vec![rec("a", "X", 100)]);
        assert_eq!(engine.store().save_count(), 0);

        let retry = engine.start_sync(Policy::PreferNewest).await.unwrap();
        assert!(matches!(retry, SyncOutcome::Clean(_)));
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let engine = SyncEngine::new(
            Arc::new(MemoryStore::new(vec![rec("a", "X", 100)])),
            Arc::new(
                SimulatedServer::new(vec![rec("b", "Z", 50)])
                    .with_latency(Duration::from_millis(200)),
            ),
        )
        .with_fetch_timeout(Duration::from_millis(20));

        let error = engine.start_sync(Policy::PreferNewest).await.unwrap_err();
        assert!(matches!(error, Error::Fetch(ref message) if message.contains("timed out")));
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.store().records(), vec![rec("a", "X", 100)]);
    }

    #[tokio::test]
    async fn cancelled_attempt_releases_the_slot() {
        let engine = SyncEngine::new(
            Arc::new(MemoryStore::new(Vec::new())),
            Arc::new(
                SimulatedServer::new(vec![rec("b", "Z", 50)])
                    .with_latency(Duration::from_millis(100)),
            ),
        );

        let cancelled = tokio::time::timeout(
            Duration::from_millis(5),
            engine.start_sync(Policy::PreferNewest),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn remote_duplicates_are_a_fetch_error() {
        let engine = engine(
            vec![rec("a", "X", 100)],
            vec![rec("b", "1", 1), rec("b", "2", 2)],
        );

        let error = engine.start_sync(Policy::PreferNewest).await.unwrap_err();
        assert!(matches!(error, Error::Fetch(ref message) if message.contains("'b'")));
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn local_duplicates_are_rejected() {
        let engine = engine(vec![rec("a", "X", 1), rec("a", "Y", 2)], vec![]);

        let error = engine.start_sync(Policy::PreferNewest).await.unwrap_err();
        assert!(matches!(error, Error::DuplicateKey { side: Side::Local, .. }));
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.store().save_count(), 0);
    }

    #[tokio::test]
    async fn failed_save_leaves_local_untouched() {
        let engine = worked_example();
        engine.store().set_fail_saves(true);

        let error = engine.start_sync(Policy::PreferNewest).await.unwrap_err();
        assert!(matches!(error, Error::Storage(_)));
        assert_eq!(engine.store().records(), vec![rec("a", "X", 100)]);
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.last_synced_at(), None);
    }

    #[tokio::test]
    async fn manual_sync_waits_for_every_decision() {
        let engine = engine(
            vec![rec("a", "X", 100), rec("c", "L", 10)],
            vec![rec("a", "Y", 200), rec("b", "Z", 50), rec("c", "R", 5)],
        );

        let outcome = engine.start_sync(Policy::manual()).await.unwrap();
        let SyncOutcome::Pending(conflicts) = outcome else {
            panic!("expected pending conflicts");
        };
        assert_eq!(conflicts.len(), 2);
        assert_eq!(engine.phase(), SyncPhase::ConflictsPending);
        assert_eq!(engine.pending_conflicts(), conflicts);

        let error = engine
            .resolve_conflict(&RecordId::new("b"), Side::Remote)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NoSuchConflict(_)));

        let progress = engine
            .resolve_conflict(&RecordId::new("a"), Side::Local)
            .await
            .unwrap();
        assert_eq!(progress, ResolveProgress::Remaining(1));
        assert_eq!(engine.store().save_count(), 0);

        let progress = engine
            .resolve_conflict(&RecordId::new("c"), Side::Remote)
            .await
            .unwrap();
        let ResolveProgress::Applied(report) = progress else {
            panic!("expected the sync to apply");
        };
        assert_eq!(report.resolved.len(), 2);
        assert!(report.resolved.iter().all(|c| c.strategy == "manual"));
        assert_eq!(
            engine.store().records(),
            vec![rec("a", "X", 100), rec("c", "R", 5), rec("b", "Z", 50)]
        );
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert!(engine.pending_conflicts().is_empty());
    }

    #[tokio::test]
    async fn complete_manual_decisions_apply_immediately() {
        let engine = worked_example();
        let decisions = BTreeMap::from([(RecordId::new("a"), Side::Local)]);

        let outcome = engine.start_sync(Policy::Manual(decisions)).await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Clean(_)));
        assert_eq!(engine.store().records()[0], rec("a", "X", 100));
    }

    #[tokio::test]
    async fn manual_without_conflicts_is_clean() {
        let engine = engine(vec![rec("a", "X", 1)], vec![rec("b", "Z", 1)]);
        let outcome = engine.start_sync(Policy::manual()).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Clean(_)));
    }

    #[tokio::test]
    async fn accept_all_applies_one_side() {
        let engine = worked_example();
        engine.start_sync(Policy::manual()).await.unwrap();

        let report = engine.accept_all(Side::Remote).await.unwrap();

        assert_eq!(report.resolved[0].winner, Side::Remote);
        assert_eq!(engine.store().records()[0], rec("a", "Y", 200));
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn accept_all_without_pending_conflicts_fails() {
        let engine = worked_example();
        assert!(matches!(
            engine.accept_all(Side::Local).await,
            Err(Error::Policy(_))
        ));
    }

    #[tokio::test]
    async fn dismiss_discards_pending_conflicts() {
        let engine = worked_example();
        engine.start_sync(Policy::manual()).await.unwrap();

        assert_eq!(engine.dismiss(), 1);
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.store().records(), vec![rec("a", "X", 100)]);
        assert!(matches!(
            engine
                .resolve_conflict(&RecordId::new("a"), Side::Local)
                .await,
            Err(Error::NoSuchConflict(_))
        ));
        assert_eq!(engine.dismiss(), 0);
    }

    #[tokio::test]
    async fn new_sync_supersedes_pending_conflicts() {
        let engine = worked_example();
        engine.start_sync(Policy::manual()).await.unwrap();
        engine.remote().set_records(vec![rec("a", "X", 300)]);

        let outcome = engine.start_sync(Policy::manual()).await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Clean(_)));
        assert!(engine.pending_conflicts().is_empty());
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn records_added_while_pending_survive_resolution() {
        let engine = worked_example();
        engine.start_sync(Policy::manual()).await.unwrap();
        engine.store().push(rec("new", "added later", 400));

        engine
            .resolve_conflict(&RecordId::new("a"), Side::Remote)
            .await
            .unwrap();

        assert_eq!(
            engine.store().records(),
            vec![
                rec("a", "Y", 200),
                rec("new", "added later", 400),
                rec("b", "Z", 50)
            ]
        );
    }

    #[tokio::test]
    async fn local_only_record_deleted_while_pending_stays_deleted() {
        let engine = engine(
            vec![rec("a", "X", 100), rec("mine", "local only", 10)],
            vec![rec("a", "Y", 200)],
        );
        engine.start_sync(Policy::manual()).await.unwrap();
        engine
            .store()
            .save_collection(&[rec("a", "X", 100)])
            .await
            .unwrap();

        let progress = engine
            .resolve_conflict(&RecordId::new("a"), Side::Local)
            .await
            .unwrap();

        assert!(matches!(progress, ResolveProgress::Applied(_)));
        assert_eq!(engine.store().records(), vec![rec("a", "X", 100)]);
    }

    #[tokio::test]
    async fn failed_apply_keeps_conflicts_pending() {
        let engine = worked_example();
        engine.start_sync(Policy::manual()).await.unwrap();
        engine.store().set_fail_saves(true);

        let error = engine
            .resolve_conflict(&RecordId::new("a"), Side::Remote)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Storage(_)));
        assert_eq!(engine.phase(), SyncPhase::ConflictsPending);

        engine.store().set_fail_saves(false);
        let report = engine.accept_all(Side::Local).await.unwrap();
        assert_eq!(report.resolved[0].winner, Side::Remote);
        assert_eq!(engine.store().records()[0], rec("a", "Y", 200));
    }

    #[tokio::test]
    async fn pending_conflicts_survive_export_and_restore() {
        let engine = worked_example();
        engine.start_sync(Policy::manual()).await.unwrap();
        let snapshot = engine.export_pending().unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();

        let restored = worked_example();
        restored
            .restore_pending(serde_json::from_str(&json).unwrap())
            .unwrap();
        assert_eq!(restored.phase(), SyncPhase::ConflictsPending);

        let progress = restored
            .resolve_conflict(&RecordId::new("a"), Side::Local)
            .await
            .unwrap();
        assert!(matches!(progress, ResolveProgress::Applied(_)));
        assert_eq!(restored.store().records()[0], rec("a", "X", 100));
    }

    #[tokio::test]
    async fn push_uploads_local_collection() {
        let engine = engine(vec![rec("mine", "X", 1)], vec![rec("theirs", "Y", 1)]);

        assert_eq!(engine.push().await.unwrap(), 1);
        assert_eq!(engine.remote().records(), vec![rec("mine", "X", 1)]);
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn push_is_refused_while_conflicts_are_pending() {
        let engine = worked_example();
        engine.start_sync(Policy::manual()).await.unwrap();

        assert!(matches!(engine.push().await, Err(Error::Busy)));
        assert_eq!(engine.remote().push_count(), 0);
        assert_eq!(engine.phase(), SyncPhase::ConflictsPending);
    }

    #[tokio::test]
    async fn periodic_sync_runs_until_shutdown() {
        let engine = worked_example();
        let (shutdown, receiver) = watch::channel(false);

        let (attempts, ()) = tokio::join!(
            engine.run_periodic(Duration::from_millis(10), Policy::PreferNewest, receiver),
            async {
                tokio::time::sleep(Duration::from_millis(45)).await;
                let _ = shutdown.send(true);
            }
        );

        assert!(attempts >= 2);
        assert_eq!(engine.remote().fetch_count(), attempts);
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn periodic_sync_stops_when_sender_drops() {
        let engine = worked_example();
        let (shutdown, receiver) = watch::channel(false);
        drop(shutdown);

        let attempts = engine
            .run_periodic(Duration::from_secs(60), Policy::PreferNewest, receiver)
            .await;
        assert!(attempts <= 1);
    }
}
