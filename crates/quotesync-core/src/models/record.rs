//! Generic synchronized record model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Opaque identifier, stable across the local and remote copy of a record.
///
/// Server-provided ids keep whatever shape the server uses (`server-1`);
/// locally created records get a UUID v7 string so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new unique, time-sortable identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Record id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A uniquely identified, timestamped unit of synchronized data.
///
/// Serialized in the JSON-array exchange format
/// `{"id": string, "payload": object, "updatedAt": number}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<P> {
    /// Unique identifier within one collection
    pub id: RecordId,
    /// Comparable content
    pub payload: P,
    /// Last modification timestamp (Unix ms)
    pub updated_at: i64,
}

impl<P> Record<P> {
    /// Create a record with an explicit timestamp
    pub fn new(id: impl Into<RecordId>, payload: P, updated_at: i64) -> Self {
        Self {
            id: id.into(),
            payload,
            updated_at,
        }
    }
}

/// One side of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The collection held on this device
    Local,
    /// The collection fetched from the server
    Remote,
}

impl Side {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" | "server" => Ok(Self::Remote),
            other => Err(Error::InvalidInput(format!(
                "unknown side '{other}' (expected local or remote)"
            ))),
        }
    }
}

/// Which way an addition has to travel to make both sides agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Present only on the server
    RemoteToLocal,
    /// Present only locally
    LocalToRemote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_generate_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn test_record_id_parse_rejects_empty() {
        assert!("  ".parse::<RecordId>().is_err());
        assert_eq!(
            " server-1 ".parse::<RecordId>().unwrap(),
            RecordId::new("server-1")
        );
    }

    #[test]
    fn test_record_wire_format_uses_camel_case() {
        let record = Record::new("a", "X".to_string(), 100);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "a", "payload": "X", "updatedAt": 100})
        );
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("Local".parse::<Side>().unwrap(), Side::Local);
        assert_eq!("server".parse::<Side>().unwrap(), Side::Remote);
        assert!("both".parse::<Side>().is_err());
        assert_eq!(Side::Local.opposite(), Side::Remote);
    }
}
