//! Application settings model

use serde::{Deserialize, Serialize};

/// Locally persisted application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Last selected category filter (`None` shows all quotes)
    pub category_filter: Option<String>,
    /// Timestamp of the last successful sync (Unix ms)
    pub last_synced_at: Option<i64>,
}
