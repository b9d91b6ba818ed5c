//! Synchronization state machine.
//!
//! A [`SyncEngine`] wraps the reconciler with a remote fetch collaborator and a
//! persistence collaborator:
//!
//! `Idle -> Fetching -> Reconciling -> {Clean | ConflictsPending} -> Idle`
//!
//! At most one attempt is in flight; a request arriving while fetching or
//! reconciling is answered with [`SyncOutcome::Busy`].

mod engine;

use serde::{Deserialize, Serialize};

use crate::models::{RecordId, Side, SyncConflict};
use crate::reconcile::{Conflict, ReconciliationResult};

pub use engine::SyncEngine;

/// Observable phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Fetching,
    Reconciling,
    ConflictsPending,
    /// Uploading the local collection
    Pushing,
}

impl SyncPhase {
    /// True while an operation holds the single-flight slot
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Fetching | Self::Reconciling | Self::Pushing)
    }
}

/// Counts from one applied sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Records copied from the server
    pub pulled: usize,
    /// Local-only records (not yet on the server)
    pub local_only: usize,
    pub unchanged: usize,
    /// Conflicts settled while applying
    pub resolved: Vec<SyncConflict>,
    /// Size of the committed collection
    pub total: usize,
    /// When the merged collection was committed (Unix ms)
    pub synced_at: i64,
}

/// Result of [`SyncEngine::start_sync`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome<P> {
    /// Merged and saved without needing a decision
    Clean(SyncReport),
    /// Conflicts wait for [`SyncEngine::resolve_conflict`]
    Pending(Vec<Conflict<P>>),
    /// Another attempt is in flight; nothing was touched
    Busy,
}

/// Result of recording a manual decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveProgress {
    /// Decisions still missing for this many conflicts
    Remaining(usize),
    /// Every conflict decided; merged collection saved
    Applied(SyncReport),
}

/// Conflicts awaiting manual decisions, with the decisions made so far.
///
/// Serializable so a caller can keep it across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSync<P> {
    pub result: ReconciliationResult<P>,
    pub decisions: std::collections::BTreeMap<RecordId, Side>,
    /// When the conflicts were detected (Unix ms)
    pub detected_at: i64,
}

impl<P> PendingSync<P> {
    pub fn conflicts(&self) -> &[Conflict<P>] {
        &self.result.conflicts
    }

    /// Conflicts without a decision yet
    pub fn undecided(&self) -> impl Iterator<Item = &Conflict<P>> {
        self.result
            .conflicts
            .iter()
            .filter(|conflict| !self.decisions.contains_key(&conflict.id))
    }
}
