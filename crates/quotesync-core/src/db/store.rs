//! Collection persistence used by the sync engine

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::models::Record;
use crate::sync::SyncReport;

/// Loads the pre-sync snapshot and commits the merged collection (async).
///
/// `save_collection` must be all-or-nothing.
#[allow(async_fn_in_trait)]
pub trait CollectionStore<P> {
    async fn load_collection(&self) -> Result<Vec<Record<P>>>;

    async fn save_collection(&self, records: &[Record<P>]) -> Result<()>;

    /// Called after a merged collection was saved
    async fn record_sync(&self, _report: &SyncReport) -> Result<()> {
        Ok(())
    }
}

impl<P, T: CollectionStore<P>> CollectionStore<P> for Arc<T> {
    async fn load_collection(&self) -> Result<Vec<Record<P>>> {
        self.as_ref().load_collection().await
    }

    async fn save_collection(&self, records: &[Record<P>]) -> Result<()> {
        self.as_ref().save_collection(records).await
    }

    async fn record_sync(&self, report: &SyncReport) -> Result<()> {
        self.as_ref().record_sync(report).await
    }
}

/// In-memory store for tests and ephemeral sessions.
pub struct MemoryStore<P> {
    records: Mutex<Vec<Record<P>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl<P: Clone> MemoryStore<P> {
    pub fn new(records: Vec<Record<P>>) -> Self {
        Self {
            records: Mutex::new(records),
            fail_saves: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn records(&self) -> Vec<Record<P>> {
        self.records.lock().clone()
    }

    /// Append a record directly, as a user add would
    pub fn push(&self, record: Record<P>) {
        self.records.lock().push(record);
    }

    /// Make every following save fail until reset
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<P: Clone> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<P: Clone> CollectionStore<P> for MemoryStore<P> {
    async fn load_collection(&self) -> Result<Vec<Record<P>>> {
        Ok(self.records())
    }

    async fn save_collection(&self, records: &[Record<P>]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Storage("save rejected".to_string()));
        }
        *self.records.lock() = records.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
