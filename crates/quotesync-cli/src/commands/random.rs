use std::path::Path;

use quotesync_core::QuoteBook;

use crate::commands::common::{format_quote_card, open_database};
use crate::error::CliError;

pub async fn run_random(category: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let mut book = QuoteBook::load(&db).await?;
    if category.is_some() {
        book.set_filter(category);
    }

    match book.random_quote(&mut rand::thread_rng()) {
        Some(quote) => println!("{}", format_quote_card(quote)),
        None => match book.filter() {
            Some(filter) => println!("No quotes in category '{filter}'."),
            None => println!("No quotes yet. Add one with `quotes add`."),
        },
    }
    Ok(())
}
