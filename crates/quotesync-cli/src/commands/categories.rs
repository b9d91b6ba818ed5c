use std::path::Path;

use serde::Serialize;

use crate::commands::common::open_database;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct CategoryItem {
    name: String,
    count: usize,
}

pub async fn run_categories(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let categories = db.categories().await?;

    if as_json {
        let items = categories
            .into_iter()
            .map(|(name, count)| CategoryItem { name, count })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if categories.is_empty() {
        println!("No categories yet.");
    }
    for (name, count) in categories {
        println!("{name:<24}  {count}");
    }
    Ok(())
}
