//! Shared database service wrapper used across clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    CollectionStore, Database, LibSqlQuoteRepository, LibSqlSettingsRepository, QuoteRepository,
    SettingsRepository,
};
use crate::models::{Quote, QuoteBody, RecordId, Settings, SyncConflict};
use crate::sync::{PendingSync, SyncReport};
use crate::Result;

const PENDING_SYNC_KEY: &str = "pending_sync";

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh one is
    /// created in its place.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable ({}); starting a fresh one",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("quotes.db");
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        for suffix in ["-wal", "-shm"] {
            let sidecar = parent.join(format!("{base_name}{suffix}"));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
                tracing::warn!("Removed stale sidecar file {}", sidecar.display());
            }
        }

        Ok(())
    }

    /// List quotes in collection order, optionally restricted to a category.
    pub async fn list_quotes(&self, category: Option<&str>) -> Result<Vec<Quote>> {
        let db = self.db.lock().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        repo.list(category).await
    }

    /// Fetch a quote by id.
    pub async fn get_quote(&self, id: &RecordId) -> Result<Option<Quote>> {
        let db = self.db.lock().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        repo.get(id).await
    }

    /// Append a new quote.
    pub async fn add_quote(&self, quote: &Quote) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        repo.create(quote).await
    }

    pub async fn delete_quote(&self, id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        repo.delete(id).await
    }

    /// List categories and counts.
    pub async fn categories(&self) -> Result<Vec<(String, usize)>> {
        let db = self.db.lock().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        repo.categories().await
    }

    /// Replace the whole collection in one transaction.
    pub async fn replace_quotes(&self, quotes: &[Quote]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        repo.replace_all(quotes).await
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        repo.list_conflicts(limit).await
    }

    /// Load conflicts left pending by an earlier run.
    ///
    /// An unreadable snapshot is dropped with a warning.
    pub async fn load_pending_sync(&self) -> Result<Option<PendingSync<QuoteBody>>> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        let Some(raw) = repo.get_value(PENDING_SYNC_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(pending) => Ok(Some(pending)),
            Err(error) => {
                tracing::warn!("Discarding unreadable pending sync state: {}", error);
                repo.remove_value(PENDING_SYNC_KEY).await?;
                Ok(None)
            }
        }
    }

    /// Persist pending conflicts, or clear them with `None`.
    pub async fn save_pending_sync(&self, pending: Option<&PendingSync<QuoteBody>>) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        match pending {
            Some(pending) => {
                repo.set_value(PENDING_SYNC_KEY, &serde_json::to_string(pending)?)
                    .await
            }
            None => repo.remove_value(PENDING_SYNC_KEY).await,
        }
    }

    /// Load settings.
    pub async fn load_settings(&self) -> Result<Settings> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.load().await
    }

    /// Save settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.save(settings).await
    }
}

impl CollectionStore<QuoteBody> for DatabaseService {
    async fn load_collection(&self) -> Result<Vec<Quote>> {
        self.list_quotes(None).await
    }

    async fn save_collection(&self, records: &[Quote]) -> Result<()> {
        self.replace_quotes(records).await
    }

    /// Log resolved conflicts and remember the sync time.
    async fn record_sync(&self, report: &SyncReport) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlQuoteRepository::new(db.connection())
            .log_conflicts(&report.resolved)
            .await?;
        let settings_repo = LibSqlSettingsRepository::new(db.connection());
        let mut settings = settings_repo.load().await?;
        settings.last_synced_at = Some(report.synced_at);
        settings_repo.save(&settings).await
    }
}
