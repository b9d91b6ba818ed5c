//! Services shared by quotesync clients

mod database;

pub use database::DatabaseService;
