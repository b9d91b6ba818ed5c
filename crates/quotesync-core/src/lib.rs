//! quotesync-core - Core library for quotesync
//!
//! This crate contains the record models, the reconciler, the single-flight
//! sync engine, and the storage and remote collaborators used by the
//! `quotes` CLI.

pub mod book;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use book::QuoteBook;
pub use error::{Error, Result};
pub use models::{Quote, QuoteBody, Record, RecordId, Side};
pub use reconcile::{apply_resolution, reconcile, Policy, ReconciliationResult, Reconciler};
pub use sync::{SyncEngine, SyncOutcome, SyncPhase};
