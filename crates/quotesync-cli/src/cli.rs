use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quotesync_core::{Policy, Side};

#[derive(Parser)]
#[command(name = "quotes")]
#[command(about = "Collect quotes and keep them in sync with a server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to a JSON sync settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new quote
    #[command(alias = "new")]
    Add {
        /// Quote text (read from stdin when omitted)
        text: Vec<String>,
        /// Category used for filtering
        #[arg(short, long)]
        category: String,
        /// Optional attribution
        #[arg(short, long)]
        author: Option<String>,
    },
    /// List quotes, honouring the saved category filter
    List {
        /// Show only this category
        #[arg(long, conflicts_with = "all")]
        category: Option<String>,
        /// Ignore the saved category filter
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List categories with quote counts
    Categories {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a random quote from the filtered view
    Random {
        /// Pick from this category instead of the saved filter
        #[arg(long)]
        category: Option<String>,
    },
    /// Show, set, or clear the saved category filter
    Filter {
        /// Category to select ("all" clears the filter)
        #[arg(conflicts_with = "clear")]
        category: Option<String>,
        /// Clear the filter
        #[arg(long)]
        clear: bool,
    },
    /// Delete a quote
    Delete {
        /// Quote ID or unique ID prefix
        id: String,
    },
    /// Export quotes
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import quotes from a JSON export
    Import {
        /// JSON file to import
        path: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Sync quotes with the server
    #[command(args_conflicts_with_subcommands = true)]
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
        /// Conflict policy (defaults to the configured policy)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Upload the local collection to the server
    Push,
    /// Sync periodically until interrupted
    Watch {
        /// Seconds between syncs (defaults to the configured interval)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
        /// Conflict policy (defaults to the configured policy)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for quotesync_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PolicyArg {
    Local,
    Remote,
    Newest,
    Manual,
}

impl From<PolicyArg> for Policy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Local => Self::PreferLocal,
            PolicyArg::Remote => Self::PreferRemote,
            PolicyArg::Newest => Self::PreferNewest,
            PolicyArg::Manual => Self::manual(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SideArg {
    Local,
    Remote,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Local => Self::Local,
            SideArg::Remote => Self::Remote,
        }
    }
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List conflicts waiting for a decision
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decide one pending conflict
    Resolve {
        /// Quote ID of the conflict
        id: String,
        /// Side to keep
        #[arg(long, value_enum)]
        accept: SideArg,
    },
    /// Decide every pending conflict for one side
    AcceptAll {
        /// Side to keep
        #[arg(value_enum)]
        side: SideArg,
    },
    /// Drop pending conflicts and keep local data
    Dismiss,
    /// List recently resolved sync conflicts
    History {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
