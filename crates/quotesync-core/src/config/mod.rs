//! Sync configuration.
//!
//! `SyncSettings` is read from an optional JSON file and then overridden by
//! `QUOTESYNC_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Side;
use crate::reconcile::{Policy, DEFAULT_TIE_BREAKER};
use crate::util::{is_web_url, non_blank};

const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

pub const ENV_REMOTE_URL: &str = "QUOTESYNC_REMOTE_URL";
pub const ENV_REMOTE_KIND: &str = "QUOTESYNC_REMOTE_KIND";
pub const ENV_FETCH_TIMEOUT_MS: &str = "QUOTESYNC_FETCH_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_SECS: &str = "QUOTESYNC_POLL_INTERVAL_SECS";
pub const ENV_POLICY: &str = "QUOTESYNC_POLICY";

/// Shape of the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKind {
    /// JSON array of wire records (`GET`/`PUT`)
    #[default]
    Collection,
    /// JSONPlaceholder-style `/posts` feed
    Posts,
}

/// Runtime settings for synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Remote endpoint; `None` runs against the in-process simulated server
    pub remote_url: Option<String>,
    pub remote_kind: RemoteKind,
    /// Upper bound on a single fetch
    pub fetch_timeout_ms: u64,
    /// Interval between polling syncs
    pub poll_interval_secs: u64,
    /// Policy used when the caller does not pick one
    pub default_policy: Policy,
    /// Side winning conflicts with equal timestamps
    pub tie_breaker: Side,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_kind: RemoteKind::default(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            default_policy: Policy::default(),
            tie_breaker: DEFAULT_TIE_BREAKER,
        }
    }
}

impl SyncSettings {
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Load settings from a JSON file; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "Failed to parse config at {}: {}",
                path.display(),
                error
            ))
        })?;
        settings.validate()
    }

    /// Apply `QUOTESYNC_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (an environment-like key/value source)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_REMOTE_URL).as_deref().and_then(non_blank) {
            self.remote_url = Some(url);
        }
        if let Some(kind) = lookup(ENV_REMOTE_KIND).as_deref().and_then(non_blank) {
            self.remote_kind = match kind.to_ascii_lowercase().as_str() {
                "collection" => RemoteKind::Collection,
                "posts" => RemoteKind::Posts,
                other => {
                    return Err(Error::InvalidInput(format!(
                        "{ENV_REMOTE_KIND} must be collection or posts, got '{other}'"
                    )))
                }
            };
        }
        if let Some(timeout) = lookup(ENV_FETCH_TIMEOUT_MS).as_deref().and_then(non_blank) {
            self.fetch_timeout_ms = parse_number(ENV_FETCH_TIMEOUT_MS, &timeout)?;
        }
        if let Some(interval) = lookup(ENV_POLL_INTERVAL_SECS).as_deref().and_then(non_blank) {
            self.poll_interval_secs = parse_number(ENV_POLL_INTERVAL_SECS, &interval)?;
        }
        if let Some(policy) = lookup(ENV_POLICY).as_deref().and_then(non_blank) {
            self.default_policy = policy.parse()?;
        }
        self.validate()
    }

    fn validate(mut self) -> Result<Self> {
        self.remote_url = self.remote_url.as_deref().and_then(non_blank);
        if let Some(url) = self.remote_url.as_deref() {
            if !is_web_url(url) {
                return Err(Error::InvalidInput(
                    "remote_url must be an http:// or https:// URL with a host".to_string(),
                ));
            }
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::InvalidInput(
                "fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::InvalidInput(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a positive integer")))
}
