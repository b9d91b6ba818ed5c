//! Quote export and import helpers shared by clients.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Quote, QuoteBody, Record, RecordId};
use crate::util::{non_blank, now_millis};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Render quotes as a pretty-printed JSON array of wire records.
pub fn render_json_export(quotes: &[Quote]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(quotes)
}

/// Render quotes as Markdown block quotes grouped in collection order.
#[must_use]
pub fn render_markdown_export(quotes: &[Quote]) -> String {
    let mut output = String::new();

    for (index, quote) in quotes.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        for line in quote.text().lines() {
            let _ = writeln!(output, "> {line}");
        }
        match quote.payload.author.as_deref() {
            Some(author) => {
                let _ = writeln!(output, ">\n> - {author} ({})", quote.category());
            }
            None => {
                let _ = writeln!(output, ">\n> ({})", quote.category());
            }
        }
    }

    output
}

/// Render quotes based on selected export format.
pub fn render_quotes_export(quotes: &[Quote], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(quotes),
        ExportFormat::Markdown => Ok(render_markdown_export(quotes)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("quotes-export-{timestamp_ms}.{}", format.extension())
}

/// Accepted shapes of an imported item.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportItem {
    Record(Quote),
    /// Bare `{text, category}` objects without id or timestamp
    Plain {
        text: String,
        category: String,
        #[serde(default)]
        author: Option<String>,
    },
}

/// Parse a JSON import file.
///
/// Items are wire records or bare `{text, category}` objects; bare items get
/// a fresh id stamped now. Empty text or category is rejected.
pub fn parse_json_import(raw: &str) -> Result<Vec<Quote>> {
    let items: Vec<ImportItem> = serde_json::from_str(raw)
        .map_err(|error| Error::InvalidInput(format!("not a quote export: {error}")))?;
    let now = now_millis();

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let quote = match item {
                ImportItem::Record(quote) => quote,
                ImportItem::Plain {
                    text,
                    category,
                    author,
                } => Record::new(
                    RecordId::generate(),
                    QuoteBody {
                        text,
                        category,
                        author,
                    },
                    now,
                ),
            };
            validate_imported(index, quote)
        })
        .collect()
}

fn validate_imported(index: usize, mut quote: Quote) -> Result<Quote> {
    let Some(text) = non_blank(&quote.payload.text) else {
        return Err(Error::InvalidInput(format!(
            "item {index} has empty quote text"
        )));
    };
    let Some(category) = non_blank(&quote.payload.category) else {
        return Err(Error::InvalidInput(format!("item {index} has empty category")));
    };
    quote.payload.text = text;
    quote.payload.category = category;
    quote.payload.author = quote.payload.author.as_deref().and_then(non_blank);
    Ok(quote)
}
