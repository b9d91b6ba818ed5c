use std::path::Path;

use quotesync_core::QuoteBook;

use crate::commands::common::{open_database, resolve_quote_text};
use crate::error::CliError;

pub async fn run_add(
    text_parts: &[String],
    category: &str,
    author: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let text = resolve_quote_text(text_parts)?;

    let db = open_database(db_path).await?;
    let mut book = QuoteBook::load(&db).await?;
    let quote = book.add_quote_with_author(&text, category, author)?.clone();
    db.add_quote(&quote).await?;

    println!("{}", quote.id);
    Ok(())
}
