use std::path::Path;

use quotesync_core::QuoteBook;

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_filter(category: Option<&str>, clear: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let mut settings = db.load_settings().await?;

    if !clear && category.is_none() {
        match settings.category_filter.as_deref() {
            Some(filter) => println!("{filter}"),
            None => println!("all"),
        }
        return Ok(());
    }

    let mut book = QuoteBook::default();
    book.set_filter(if clear { None } else { category });
    settings.category_filter = book.filter().map(str::to_string);
    db.save_settings(&settings).await?;

    println!("{}", book.filter().unwrap_or("all"));
    Ok(())
}
