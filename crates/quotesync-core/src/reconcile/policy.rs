//! Conflict resolution policies

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Conflict;
use crate::error::Error;
use crate::models::{RecordId, Side};

/// Rule set deciding which side wins each conflict.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Keep the local copy untouched
    PreferLocal,
    /// Take the remote payload and timestamp
    PreferRemote,
    /// Take the precomputed `winner` of each conflict
    #[default]
    PreferNewest,
    /// Explicit decision per conflicting id; a missing decision is an error
    Manual(BTreeMap<RecordId, Side>),
}

impl Policy {
    /// Manual policy with no decisions yet
    pub const fn manual() -> Self {
        Self::Manual(BTreeMap::new())
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::PreferLocal => "local",
            Self::PreferRemote => "remote",
            Self::PreferNewest => "newest",
            Self::Manual(_) => "manual",
        }
    }

    pub const fn is_manual(&self) -> bool {
        matches!(self, Self::Manual(_))
    }

    /// Side chosen for `conflict`, or `None` when a manual decision is missing
    pub fn decision_for<P>(&self, conflict: &Conflict<P>) -> Option<Side> {
        match self {
            Self::PreferLocal => Some(Side::Local),
            Self::PreferRemote => Some(Side::Remote),
            Self::PreferNewest => Some(conflict.winner),
            Self::Manual(decisions) => decisions.get(&conflict.id).copied(),
        }
    }

    /// Conflicts this policy cannot decide
    pub fn missing_decisions<'a, P>(&self, conflicts: &'a [Conflict<P>]) -> Vec<&'a RecordId> {
        conflicts
            .iter()
            .filter(|conflict| self.decision_for(conflict).is_none())
            .map(|conflict| &conflict.id)
            .collect()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "prefer-local" => Ok(Self::PreferLocal),
            "remote" | "server" | "prefer-remote" => Ok(Self::PreferRemote),
            "newest" | "prefer-newest" | "lww" => Ok(Self::PreferNewest),
            "manual" => Ok(Self::manual()),
            other => Err(Error::InvalidInput(format!(
                "unknown policy '{other}' (expected local, remote, newest, or manual)"
            ))),
        }
    }
}
