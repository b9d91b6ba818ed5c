//! quotesync CLI - collect quotes from the terminal and sync them with a server

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::categories::run_categories;
use crate::commands::common::{load_sync_settings, resolve_config_path, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::filter::run_filter;
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::random::run_random;
use crate::commands::sync::{
    run_accept_all, run_dismiss, run_pending_conflicts, run_push, run_resolve, run_sync,
    run_sync_history, run_watch,
};
use crate::error::CliError;

const DEFAULT_LOG_DIRECTIVE: &str = "quotesync=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions never touch the database
    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;
    let config_path = resolve_config_path(cli.config, &db_path);

    match cli.command {
        Some(Commands::Add {
            text,
            category,
            author,
        }) => run_add(&text, &category, author.as_deref(), &db_path).await?,
        Some(Commands::List {
            category,
            all,
            json,
        }) => run_list(category.as_deref(), all, json, &db_path).await?,
        Some(Commands::Categories { json }) => run_categories(json, &db_path).await?,
        Some(Commands::Random { category }) => run_random(category.as_deref(), &db_path).await?,
        Some(Commands::Filter { category, clear }) => {
            run_filter(category.as_deref(), clear, &db_path).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, &db_path).await?,
        Some(Commands::Export { format, output }) => {
            run_export(format, output.as_deref(), &db_path).await?;
        }
        Some(Commands::Import { path }) => run_import(&path, &db_path).await?,
        Some(Commands::Completions { .. }) => {}
        Some(Commands::Sync { command, policy }) => {
            let settings = load_sync_settings(&config_path)?;
            match command {
                None => run_sync(policy.map(Into::into), &settings, &db_path).await?,
                Some(SyncCommands::Conflicts { json }) => {
                    run_pending_conflicts(json, &settings, &db_path).await?;
                }
                Some(SyncCommands::Resolve { id, accept }) => {
                    run_resolve(&id, accept.into(), &settings, &db_path).await?;
                }
                Some(SyncCommands::AcceptAll { side }) => {
                    run_accept_all(side.into(), &settings, &db_path).await?;
                }
                Some(SyncCommands::Dismiss) => run_dismiss(&settings, &db_path).await?,
                Some(SyncCommands::History { limit, json }) => {
                    run_sync_history(limit, json, &db_path).await?;
                }
            }
        }
        Some(Commands::Push) => {
            let settings = load_sync_settings(&config_path)?;
            run_push(&settings, &db_path).await?;
        }
        Some(Commands::Watch { interval, policy }) => {
            let settings = load_sync_settings(&config_path)?;
            run_watch(interval, policy.map(Into::into), &settings, &db_path).await?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
