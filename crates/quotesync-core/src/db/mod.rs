//! Database layer for quotesync

mod connection;
mod migrations;
mod repository;
mod settings_repository;
mod store;

pub use connection::Database;
pub use repository::{LibSqlQuoteRepository, QuoteRepository};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
pub use store::{CollectionStore, MemoryStore};
