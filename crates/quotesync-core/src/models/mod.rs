//! Data models for quotesync

mod quote;
mod record;
mod settings;
mod sync_conflict;

pub use quote::{Quote, QuoteBody, SERVER_CATEGORY};
pub use record::{Direction, Record, RecordId, Side};
pub use settings::Settings;
pub use sync_conflict::SyncConflict;
