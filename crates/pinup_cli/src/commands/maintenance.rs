//! Settings, statistics, export/import and index maintenance.

use super::{format_size, format_timestamp, CommandResult, Session};
use pinup_core::{ExportDocument, ExportScope, Settings, SettingsPatch};
use std::fs;
use std::path::Path;

fn print_settings(s: &Settings) {
    println!("dedupe_enabled:  {}", s.dedupe_enabled);
    println!("backup_enabled:  {}", s.backup_enabled);
    println!(
        "backup_schedule: {}",
        serde_json::to_value(s.backup_schedule)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    );
}

/// Shows settings.
pub fn settings_get(session: &Session) -> CommandResult {
    session.emit(&session.context().settings.get(), print_settings)
}

/// Applies a settings patch.
pub fn settings_set(session: &Session, patch: &SettingsPatch) -> CommandResult {
    if patch.is_empty() {
        return Err("nothing to change; pass --dedupe, --backup-enabled or --backup-schedule".into());
    }
    let ctx = session.context();
    let settings = ctx.settings.patch(patch, &ctx.vault, &ctx.backups)?;
    session.emit(&settings, print_settings)
}

/// Shows vault statistics.
pub fn stats(session: &Session) -> CommandResult {
    let ctx = session.context();
    let stats = ctx.vault.stats(&ctx.backups)?;
    session.emit(&stats, |s| {
        println!("Pin-Up Vault Statistics");
        println!("=======================");
        println!();
        println!("Snippets:    {} ({} pinned, {} archived)", s.total_snippets, s.pinned, s.archived);
        println!("Tags:        {}", s.total_tags);
        println!("Collections: {}", s.total_collections);
        println!("New (7d):    {}", s.created_last_7_days);
        println!("New (30d):   {}", s.created_last_30_days);
        println!("File size:   {}", format_size(s.db_size_bytes));
        match s.last_backup_at {
            Some(at) => println!("Last backup: {}", format_timestamp(at)),
            None => println!("Last backup: never"),
        }
        if !s.top_tags.is_empty() {
            println!();
            println!("Top tags:");
            for t in &s.top_tags {
                println!("  {} ({})", t.name, t.count);
            }
        }
        if !s.top_collections.is_empty() {
            println!();
            println!("Top collections:");
            for c in &s.top_collections {
                println!("  {} ({})", c.name, c.count);
            }
        }
    })
}

/// Writes a JSON export to `output` or standard output.
pub fn export(session: &Session, scope: &ExportScope, output: Option<&Path>) -> CommandResult {
    let document = session.context().vault.export_json(scope)?;
    let text = serde_json::to_string_pretty(&document)?;
    match output {
        Some(path) => {
            fs::write(path, text)?;
            eprintln!("✓ Exported {} snippets to {}", document.snippets.len(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// Imports a JSON export file.
pub fn import(session: &Session, input: &Path) -> CommandResult {
    let text = fs::read_to_string(input)?;
    let document: ExportDocument = serde_json::from_str(&text)?;
    let report = session.context().vault.import_json(&document)?;
    session.emit(&report, |r| {
        println!("✓ Imported {} snippets", r.snippets);
        println!("  Tags: {} created, {} merged", r.tags_created, r.tags_merged);
        println!(
            "  Collections: {} created, {} merged",
            r.collections_created, r.collections_merged
        );
        if r.reassigned_ids > 0 {
            println!("  Re-assigned ids: {}", r.reassigned_ids);
        }
    })
}

/// Rebuilds the search index.
pub fn reindex(session: &Session) -> CommandResult {
    let indexed = session.context().vault.rebuild_index()?;
    session.emit(&serde_json::json!({ "indexed": indexed }), |_| {
        println!("✓ Indexed {indexed} snippets");
    })
}
