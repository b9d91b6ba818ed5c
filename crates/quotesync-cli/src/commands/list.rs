use std::path::Path;

use quotesync_core::QuoteBook;

use crate::commands::common::{
    format_quote_lines, open_database, quote_to_list_item, QuoteListItem,
};
use crate::error::CliError;

pub async fn run_list(
    category: Option<&str>,
    all: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let mut book = QuoteBook::load(&db).await?;
    if all {
        book.set_filter(None);
    } else if category.is_some() {
        book.set_filter(category);
    }
    let quotes = book.filtered();

    if as_json {
        let json_items = quotes
            .iter()
            .map(|quote| quote_to_list_item(quote))
            .collect::<Vec<QuoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if quotes.is_empty() {
        match book.filter() {
            Some(filter) => println!("No quotes in category '{filter}'."),
            None => println!("No quotes yet. Add one with `quotes add`."),
        }
        return Ok(());
    }

    for line in format_quote_lines(&quotes) {
        println!("{line}");
    }
    Ok(())
}
