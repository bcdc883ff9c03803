//! Backup and restore commands.
//!
//! Backups are SQLite snapshots written under `<data_dir>/backups/` and
//! listed in its `manifest.json`. Restore swaps the live file for a verified
//! copy of a snapshot and rebuilds the search index.

use super::{format_size, format_timestamp, CommandResult, Session};
use tracing::info;

/// Takes a backup now.
pub fn run(session: &Session) -> CommandResult {
    let ctx = session.context();
    let entry = ctx.backups.run_backup(&ctx.vault)?;
    session.emit(&entry, |e| {
        println!("✓ Backup created successfully");
        println!("  Name: {}", e.name);
        println!("  Size: {}", format_size(e.size_bytes));
        println!("  Time: {}", format_timestamp(e.created_at));
    })
}

/// Lists backups, newest first.
pub fn list(session: &Session) -> CommandResult {
    let entries = session.context().backups.list_backups()?;
    session.emit(&entries, |entries| {
        if entries.is_empty() {
            println!("No backups in {}", session.context().backups.dir().display());
        }
        for e in entries {
            println!(
                "{}  {}  {}",
                e.name,
                format_timestamp(e.created_at),
                format_size(e.size_bytes)
            );
        }
    })
}

/// Replaces the vault with a backup.
pub fn restore(session: &Session, name: &str) -> CommandResult {
    info!(name, "restoring backup");
    let ctx = session.context();
    let report = ctx.backups.restore(&ctx.vault, name)?;
    session.emit(&report, |r| {
        println!("✓ Restored {}", r.name);
        println!("  Indexed: {} snippets", r.indexed);
    })
}
