use std::path::Path;

use crate::commands::common::{open_database, resolve_quote};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let quote = resolve_quote(id, &db).await?;
    db.delete_quote(&quote.id).await?;

    println!("{}", quote.id);
    Ok(())
}
