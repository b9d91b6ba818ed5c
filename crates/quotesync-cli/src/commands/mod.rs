pub mod add;
pub mod categories;
pub mod common;
pub mod completions;
pub mod delete;
pub mod export;
pub mod filter;
pub mod import;
pub mod list;
pub mod random;
pub mod sync;
