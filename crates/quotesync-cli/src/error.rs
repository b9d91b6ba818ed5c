use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quotesync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No quote text provided")]
    EmptyQuoteText,
    #[error("Quote ID cannot be empty")]
    EmptyQuoteId,
    #[error("Quote not found for id/prefix: {0}")]
    QuoteNotFound(String),
    #[error("{0}")]
    AmbiguousQuoteId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No conflicts are waiting for a decision. Run `quotes sync --policy manual` first.")]
    NothingPending,
}
