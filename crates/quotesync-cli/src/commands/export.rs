use std::path::Path;

use quotesync_core::export::{render_quotes_export, suggested_export_file_name};

use crate::cli::ExportFormat;
use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let quotes = db.list_quotes(None).await?;
    let rendered = render_quotes_export(&quotes, format.into())?;

    match output_path {
        Some(path) if path.is_dir() => {
            let file_name =
                suggested_export_file_name(format.into(), chrono::Utc::now().timestamp_millis());
            let path = path.join(file_name);
            std::fs::write(&path, rendered)?;
            println!("{}", path.display());
        }
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("{}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
