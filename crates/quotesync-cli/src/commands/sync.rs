use std::path::Path;
use std::time::Duration;

use quotesync_core::config::SyncSettings;
use quotesync_core::sync::{ResolveProgress, SyncReport};
use quotesync_core::{Policy, RecordId, Side, SyncOutcome};
use tokio::sync::watch;

use crate::commands::common::{
    format_pending_conflict_lines, format_sync_conflict_lines, format_sync_timestamp,
    list_sync_conflicts, open_database, open_engine, pending_conflict_to_item,
    save_engine_state, sync_conflict_to_item, PendingConflictItem, SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(
    policy: Option<Policy>,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = open_engine(&db, settings).await?;
    let policy = policy.unwrap_or_else(|| settings.default_policy.clone());

    let outcome = engine.start_sync(policy).await;
    save_engine_state(&engine).await?;

    match outcome? {
        SyncOutcome::Clean(report) => println!("{}", describe_report(&report)),
        SyncOutcome::Pending(conflicts) => {
            println!("{} conflicts need a decision:", conflicts.len());
            for line in format_pending_conflict_lines(&conflicts) {
                println!("{line}");
            }
            println!("Resolve with `quotes sync resolve <id> --accept local|remote`.");
        }
        SyncOutcome::Busy => println!("A sync is already in progress."),
    }
    Ok(())
}

pub async fn run_pending_conflicts(
    as_json: bool,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = open_engine(&db, settings).await?;
    let conflicts = engine.pending_conflicts();

    if as_json {
        let json_items = conflicts
            .iter()
            .map(pending_conflict_to_item)
            .collect::<Vec<PendingConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No conflicts are waiting for a decision.");
        return Ok(());
    }
    for line in format_pending_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve(
    id: &str,
    side: Side,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = open_engine(&db, settings).await?;
    if engine.pending_conflicts().is_empty() {
        return Err(CliError::NothingPending);
    }

    let progress = engine.resolve_conflict(&RecordId::new(id.trim()), side).await;
    save_engine_state(&engine).await?;

    match progress? {
        ResolveProgress::Remaining(remaining) => {
            println!("Kept {side} copy of {id}; {remaining} conflicts still need a decision.");
        }
        ResolveProgress::Applied(report) => println!("{}", describe_report(&report)),
    }
    Ok(())
}

pub async fn run_accept_all(
    side: Side,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = open_engine(&db, settings).await?;
    if engine.pending_conflicts().is_empty() {
        return Err(CliError::NothingPending);
    }

    let report = engine.accept_all(side).await;
    save_engine_state(&engine).await?;

    println!("{}", describe_report(&report?));
    Ok(())
}

pub async fn run_dismiss(settings: &SyncSettings, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = open_engine(&db, settings).await?;

    let dismissed = engine.dismiss();
    save_engine_state(&engine).await?;

    println!("Dismissed {dismissed} conflicts; local quotes unchanged.");
    Ok(())
}

pub async fn run_sync_history(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let conflicts = list_sync_conflicts(limit, db_path).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_push(settings: &SyncSettings, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let engine = open_engine(&db, settings).await?;

    let pushed = engine.push().await?;
    println!("Pushed {pushed} quotes to {}", engine.remote().describe());
    Ok(())
}

pub async fn run_watch(
    interval: Option<u64>,
    policy: Option<Policy>,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let interval = match interval {
        Some(0) => {
            return Err(CliError::Config(
                "watch interval must be greater than zero".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => settings.poll_interval(),
    };
    let policy = policy.unwrap_or_else(|| settings.default_policy.clone());

    let db = open_database(db_path).await?;
    let engine = open_engine(&db, settings).await?;
    let (shutdown, shutdown_rx) = watch::channel(false);

    println!(
        "Syncing with {} every {}s (Ctrl-C to stop)",
        engine.remote().describe(),
        interval.as_secs()
    );
    let (attempts, ()) = tokio::join!(
        engine.run_periodic(interval, policy, shutdown_rx),
        async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", error);
            }
            let _ = shutdown.send(true);
        }
    );
    save_engine_state(&engine).await?;

    match engine.last_synced_at() {
        Some(timestamp) => println!(
            "Stopped after {attempts} syncs; last synced {}",
            format_sync_timestamp(timestamp)
        ),
        None => println!("Stopped after {attempts} syncs"),
    }
    Ok(())
}

pub fn describe_report(report: &SyncReport) -> String {
    format!(
        "Sync completed: {} pulled, {} local-only, {} conflicts resolved, {} quotes total",
        report.pulled,
        report.local_only,
        report.resolved.len(),
        report.total
    )
}
