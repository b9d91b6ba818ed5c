//! Error types for quotesync-core

use thiserror::Error;

use crate::models::{RecordId, Side};

/// Result type alias using quotesync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quotesync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A single collection contained the same id twice
    #[error("Duplicate id '{id}' in {side} collection")]
    DuplicateKey { side: Side, id: RecordId },

    /// The remote collaborator failed or returned a malformed collection
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A resolution policy could not be applied as requested
    #[error("Policy error: {0}")]
    Policy(String),

    /// No pending conflict exists for the given id
    #[error("No pending conflict for id: {0}")]
    NoSuchConflict(RecordId),

    /// Another sync operation holds the single-flight slot
    #[error("A sync operation is already in progress")]
    Busy,

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Quote not found
    #[error("Quote not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether a later attempt may succeed without caller intervention.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Fetch(error.to_string())
    }
}
