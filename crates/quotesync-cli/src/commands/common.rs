use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use quotesync_core::config::SyncSettings;
use quotesync_core::models::{QuoteBody, SyncConflict};
use quotesync_core::reconcile::Conflict;
use quotesync_core::remote::QuoteRemote;
use quotesync_core::services::DatabaseService;
use quotesync_core::{Quote, SyncEngine};
use serde::Serialize;

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "QUOTESYNC_DB_PATH";
pub const CONFIG_FILE_NAME: &str = "sync.json";

pub type QuoteEngine = SyncEngine<QuoteBody, DatabaseService, QuoteRemote>;

#[derive(Debug, Serialize)]
pub struct QuoteListItem {
    pub id: String,
    pub text: String,
    pub category: String,
    pub author: Option<String>,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub quote_id: String,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
    pub winner: String,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

#[derive(Debug, Serialize)]
pub struct PendingConflictItem {
    pub id: String,
    pub local_text: String,
    pub local_updated_at: i64,
    pub remote_text: String,
    pub remote_updated_at: i64,
    pub newest: String,
}

pub async fn list_sync_conflicts(
    limit: usize,
    db_path: &Path,
) -> Result<Vec<SyncConflict>, CliError> {
    let db = open_database(db_path).await?;
    Ok(db.list_conflicts(limit).await?)
}

/// Find a quote by exact id or unique id prefix
pub async fn resolve_quote(query: &str, db: &DatabaseService) -> Result<Quote, CliError> {
    let query = normalize_quote_identifier(query)?;
    if let Some(quote) = db.get_quote(&query.as_str().into()).await? {
        return Ok(quote);
    }

    let mut matching = db
        .list_quotes(None)
        .await?
        .into_iter()
        .filter(|quote| quote.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::QuoteNotFound(query)),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|quote| short_id(quote.id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousQuoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn format_quote_lines(quotes: &[&Quote]) -> Vec<String> {
    quotes
        .iter()
        .map(|quote| {
            let preview = quote_preview(quote, 50);
            let category = format!("[{}]", quote.category());
            match quote.payload.author.as_deref() {
                Some(author) => format!(
                    "{:<13}  {preview:<50}  {category:<16}  {author}",
                    short_id(quote.id.as_str())
                ),
                None => format!(
                    "{:<13}  {preview:<50}  {category}",
                    short_id(quote.id.as_str())
                ),
            }
        })
        .collect()
}

/// Full quote text with attribution, as shown by `random`
pub fn format_quote_card(quote: &Quote) -> String {
    let mut card = format!("\"{}\"", quote.text());
    if let Some(author) = quote.payload.author.as_deref() {
        card.push_str(&format!("\n  - {author}"));
    }
    card.push_str(&format!("\n  [{}]", quote.category()));
    card
}

pub fn quote_to_list_item(quote: &Quote) -> QuoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    QuoteListItem {
        id: quote.id.to_string(),
        text: quote.text().to_string(),
        category: quote.category().to_string(),
        author: quote.payload.author.clone(),
        updated_at: quote.updated_at,
        relative_time: format_relative_time(quote.updated_at, now_ms),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        quote_id: conflict.quote_id.clone(),
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        winner: conflict.winner.to_string(),
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn pending_conflict_to_item(conflict: &Conflict<QuoteBody>) -> PendingConflictItem {
    PendingConflictItem {
        id: conflict.id.to_string(),
        local_text: conflict.local.text().to_string(),
        local_updated_at: conflict.local.updated_at,
        remote_text: conflict.remote.text().to_string(),
        remote_updated_at: conflict.remote.updated_at,
        newest: conflict.winner.to_string(),
    }
}

pub fn quote_preview(quote: &Quote, max_chars: usize) -> String {
    let first_line = quote.text().lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<6}  quote={}  kept={}  local={} remote={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.quote_id,
                conflict.winner,
                conflict.local_updated_at,
                conflict.remote_updated_at
            )
        })
        .collect()
}

pub fn format_pending_conflict_lines(conflicts: &[Conflict<QuoteBody>]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}\n  local  ({}): {}\n  remote ({}): {}\n  newest: {}",
                conflict.id,
                format_sync_timestamp(conflict.local.updated_at),
                quote_preview(&conflict.local, 60),
                format_sync_timestamp(conflict.remote.updated_at),
                quote_preview(&conflict.remote, 60),
                conflict.winner
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_quote_text(text_parts: &[String]) -> Result<String, CliError> {
    if let Some(text) = normalize_text(&text_parts.join(" ")) {
        return Ok(text);
    }

    if let Some(text) = read_piped_stdin()? {
        return Ok(text);
    }

    Err(CliError::EmptyQuoteText)
}

pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_quote_identifier(id: &str) -> Result<String, CliError> {
    normalize_text(id).ok_or(CliError::EmptyQuoteId)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(normalize_text(&input))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("quotesync").join("quotes.db"))
        .ok_or_else(|| {
            CliError::Config(format!(
                "could not resolve a data directory; pass --db-path or set {DB_PATH_ENV}"
            ))
        })
}

/// Settings file next to the database unless given explicitly
pub fn resolve_config_path(cli_config: Option<PathBuf>, db_path: &Path) -> PathBuf {
    cli_config.unwrap_or_else(|| db_path.with_file_name(CONFIG_FILE_NAME))
}

/// Load sync settings from `path` and apply `QUOTESYNC_*` overrides
pub fn load_sync_settings(path: &Path) -> Result<SyncSettings, CliError> {
    SyncSettings::load_from_path(path)
        .and_then(SyncSettings::with_env_overrides)
        .map_err(|error| CliError::Config(error.to_string()))
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

/// Build the sync engine over `db`, restoring conflicts left pending by an
/// earlier run.
pub async fn open_engine(
    db: &DatabaseService,
    settings: &SyncSettings,
) -> Result<QuoteEngine, CliError> {
    let remote = QuoteRemote::from_settings(settings)?;
    tracing::debug!("Syncing against {}", remote.describe());

    let last_synced_at = db.load_settings().await?.last_synced_at;
    let engine = SyncEngine::from_settings(db.clone(), remote, settings)
        .with_last_synced_at(last_synced_at);
    if let Some(pending) = db.load_pending_sync().await? {
        engine.restore_pending(pending)?;
    }
    Ok(engine)
}

/// Persist whatever the engine still has pending (or clear it)
pub async fn save_engine_state(engine: &QuoteEngine) -> Result<(), CliError> {
    engine
        .store()
        .save_pending_sync(engine.export_pending().as_ref())
        .await?;
    Ok(())
}
