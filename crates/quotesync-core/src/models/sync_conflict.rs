//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::record::Side;

/// Recorded sync conflict and the side that was kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Quote involved in the conflict
    pub quote_id: String,
    /// Local copy's timestamp when the conflict was detected
    pub local_updated_at: i64,
    /// Remote copy's timestamp when the conflict was detected
    pub remote_updated_at: i64,
    /// Side whose payload was kept
    pub winner: Side,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
