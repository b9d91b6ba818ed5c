use std::path::Path;

use quotesync_core::export::parse_json_import;
use quotesync_core::QuoteBook;

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_import(path: &Path, db_path: &Path) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(path)?;
    let imported = parse_json_import(&raw)?;

    let db = open_database(db_path).await?;
    let mut book = QuoteBook::load(&db).await?;
    let summary = book.import(&imported)?;
    book.persist(&db).await?;

    println!(
        "Imported {} quotes: {} added, {} updated, {} unchanged",
        imported.len(),
        summary.added,
        summary.updated,
        summary.unchanged
    );
    Ok(())
}
