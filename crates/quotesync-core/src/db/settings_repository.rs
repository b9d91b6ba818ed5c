//! Settings repository implementation

use crate::error::Result;
use crate::models::Settings;
use libsql::Connection;

const CATEGORY_FILTER_KEY: &str = "category_filter";
const LAST_SYNCED_AT_KEY: &str = "last_synced_at";

/// Trait for key-value settings storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Load settings from the database
    async fn load(&self) -> Result<Settings>;

    /// Save settings to the database
    async fn save(&self, settings: &Settings) -> Result<()>;

    /// Read a raw string value
    async fn get_value(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw string value
    async fn set_value(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a raw value
    async fn remove_value(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `SettingsRepository`
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn load(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(value) = self.get_value(CATEGORY_FILTER_KEY).await? {
            settings.category_filter = crate::util::non_blank(&value);
        }

        if let Some(value) = self.get_value(LAST_SYNCED_AT_KEY).await? {
            settings.last_synced_at = value.parse().ok();
        }

        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        match settings.category_filter.as_deref() {
            Some(category) => self.set_value(CATEGORY_FILTER_KEY, category).await?,
            None => self.remove_value(CATEGORY_FILTER_KEY).await?,
        }
        match settings.last_synced_at {
            Some(timestamp) => {
                self.set_value(LAST_SYNCED_AT_KEY, &timestamp.to_string())
                    .await?;
            }
            None => self.remove_value(LAST_SYNCED_AT_KEY).await?,
        }
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}
