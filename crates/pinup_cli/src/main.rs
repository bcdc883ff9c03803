//! Pin-Up CLI
//!
//! Command-line tools for a Pin-Up snippet vault.
//!
//! # Commands
//!
//! - `init` - Create the data directory and start the trial
//! - `add`, `get`, `list`, `search`, `rm` - Work with snippets
//! - `tag`, `collection` - Manage labels
//! - `backup run|list|restore` - Snapshots of the vault
//! - `license status|activate|deactivate` - Entitlement
//! - `settings get|set`, `stats`, `export`, `import`, `reindex`
//! - `serve` - JSON-lines request loop on stdin/stdout

mod commands;

use clap::{Parser, Subcommand};
use commands::{Format, Session};
use pinup_core::{AdmissionConfig, BackupSchedule};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Local-first snippet vault.
#[derive(Parser)]
#[command(name = "pinup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long, env = "PINUP_DATA_DIR", default_value = ".pinup")]
    data_dir: PathBuf,

    /// Requests per minute admitted per client by `serve` (0 disables the limit)
    #[arg(global = true, long, env = "PINUP_RATE_LIMIT", default_value_t = 100)]
    rate_limit: u32,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value = "text")]
    format: Format,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and show the license state
    Init,

    /// Save a new snippet
    Add {
        /// Snippet body; `-` reads standard input
        body: String,

        /// Title (derived from the body when omitted)
        #[arg(short, long)]
        title: Option<String>,

        /// Tag name (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Collection name (repeatable)
        #[arg(long = "collection")]
        collections: Vec<String>,

        /// Language hint
        #[arg(short, long)]
        language: Option<String>,

        /// Origin label, e.g. `chatgpt`
        #[arg(short, long)]
        source: Option<String>,

        /// Origin link
        #[arg(long)]
        source_url: Option<String>,
    },

    /// Show one snippet
    Get {
        /// Snippet id
        id: String,

        /// Render as Markdown
        #[arg(short, long)]
        markdown: bool,
    },

    /// List snippets, most recently updated first
    List {
        /// Only snippets with this tag
        #[arg(long)]
        tag: Option<String>,

        /// Only snippets in this collection
        #[arg(long)]
        collection: Option<String>,

        /// Only pinned snippets
        #[arg(long)]
        pinned: bool,

        /// Only archived snippets
        #[arg(long)]
        archived: bool,

        /// Page size
        #[arg(long, default_value = "50")]
        limit: u32,

        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Search with the query DSL (`tag:x`, `source:y`, `"phrases"`)
    Search {
        /// Query text
        query: String,

        /// Include archived snippets
        #[arg(short, long)]
        archived: bool,

        /// Page size
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Delete a snippet
    Rm {
        /// Snippet id
        id: String,
    },

    /// Manage tags
    Tag {
        #[command(subcommand)]
        action: LabelAction,
    },

    /// Manage collections
    Collection {
        #[command(subcommand)]
        action: LabelAction,
    },

    /// Backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// License
    License {
        #[command(subcommand)]
        action: LicenseAction,
    },

    /// Settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show vault statistics
    Stats,

    /// Export snippets as JSON
    Export {
        /// Output file (standard output when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export only these snippet ids
        #[arg(long = "snippet", conflicts_with = "collections")]
        snippets: Vec<String>,

        /// Export only snippets in these collection ids
        #[arg(long = "collection")]
        collections: Vec<String>,
    },

    /// Import a JSON export
    Import {
        /// Export file to read
        input: PathBuf,
    },

    /// Rebuild the search index
    Reindex,

    /// Serve JSON-lines requests on stdin/stdout
    Serve,
}

/// Actions shared by tags and collections.
#[derive(Subcommand)]
pub enum LabelAction {
    /// List entries
    List,
    /// Create an entry
    Create {
        /// Name
        name: String,
        /// Hex color
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename an entry
    Rename {
        /// Id
        id: String,
        /// New name
        name: String,
    },
    /// Delete an entry (snippets are kept)
    Delete {
        /// Id
        id: String,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Take a backup now
    Run,
    /// List backups, newest first
    List,
    /// Replace the vault with a backup
    Restore {
        /// Backup name
        name: String,
    },
}

#[derive(Subcommand)]
enum LicenseAction {
    /// Show the license state (re-validates when due)
    Status,
    /// Activate a license key
    Activate {
        /// License key
        key: String,
    },
    /// Remove the license from this device
    Deactivate,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show settings
    Get,
    /// Change settings
    Set {
        /// Return the existing snippet when a body is saved twice
        #[arg(long)]
        dedupe: Option<bool>,
        /// Run scheduled backups
        #[arg(long)]
        backup_enabled: Option<bool>,
        /// Backup schedule
        #[arg(long, value_parser = parse_schedule)]
        backup_schedule: Option<BackupSchedule>,
    },
}

fn parse_schedule(value: &str) -> Result<BackupSchedule, String> {
    match value {
        "manual" => Ok(BackupSchedule::Manual),
        "daily" => Ok(BackupSchedule::Daily),
        "weekly" => Ok(BackupSchedule::Weekly),
        other => Err(format!("unknown schedule '{other}' (manual, daily, weekly)")),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `serve` keeps stdout for responses.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let admission = if cli.rate_limit == 0 {
        AdmissionConfig::disabled()
    } else {
        AdmissionConfig::new(cli.rate_limit, Duration::from_secs(60))
    };
    let session = Session::open(&cli.data_dir, admission, cli.format)?;

    match cli.command {
        Commands::Init => commands::snippets::init(&session)?,
        Commands::Add {
            body,
            title,
            tags,
            collections,
            language,
            source,
            source_url,
        } => {
            let input = pinup_core::NewSnippet {
                title,
                body: commands::snippets::read_body(body)?,
                language,
                source,
                source_url,
                tags,
                collections,
            };
            commands::snippets::add(&session, input)?;
        }
        Commands::Get { id, markdown } => commands::snippets::get(&session, &id, markdown)?,
        Commands::List {
            tag,
            collection,
            pinned,
            archived,
            limit,
            offset,
        } => {
            let filter = pinup_core::SnippetFilter {
                tag,
                collection,
                pinned: pinned.then_some(true),
                archived: archived.then_some(true),
            };
            commands::snippets::list(&session, &filter, limit, offset)?;
        }
        Commands::Search {
            query,
            archived,
            limit,
            offset,
        } => {
            let options = pinup_core::SearchOptions {
                include_archived: archived,
                limit,
                offset,
            };
            commands::snippets::search(&session, &query, &options)?;
        }
        Commands::Rm { id } => commands::snippets::remove(&session, &id)?,
        Commands::Tag { action } => commands::labels::tags(&session, action)?,
        Commands::Collection { action } => commands::labels::collections(&session, action)?,
        Commands::Backup { action } => match action {
            BackupAction::Run => commands::backup::run(&session)?,
            BackupAction::List => commands::backup::list(&session)?,
            BackupAction::Restore { name } => commands::backup::restore(&session, &name)?,
        },
        Commands::License { action } => match action {
            LicenseAction::Status => commands::license::status(&session)?,
            LicenseAction::Activate { key } => commands::license::activate(&session, &key)?,
            LicenseAction::Deactivate => commands::license::deactivate(&session)?,
        },
        Commands::Settings { action } => match action {
            SettingsAction::Get => commands::maintenance::settings_get(&session)?,
            SettingsAction::Set {
                dedupe,
                backup_enabled,
                backup_schedule,
            } => {
                let patch = pinup_core::SettingsPatch {
                    dedupe_enabled: dedupe,
                    backup_enabled,
                    backup_schedule,
                };
                commands::maintenance::settings_set(&session, &patch)?;
            }
        },
        Commands::Stats => commands::maintenance::stats(&session)?,
        Commands::Export {
            output,
            snippets,
            collections,
        } => {
            let scope = if !snippets.is_empty() {
                pinup_core::ExportScope::Snippets(snippets)
            } else if !collections.is_empty() {
                pinup_core::ExportScope::Collections(collections)
            } else {
                pinup_core::ExportScope::All
            };
            commands::maintenance::export(&session, &scope, output.as_deref())?;
        }
        Commands::Import { input } => commands::maintenance::import(&session, &input)?,
        Commands::Reindex => commands::maintenance::reindex(&session)?,
        Commands::Serve => commands::serve::run(session)?,
    }

    Ok(())
}
