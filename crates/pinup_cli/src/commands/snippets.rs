//! Snippet commands.

use super::{format_timestamp, CommandResult, Session};
use pinup_core::{NewSnippet, SearchOptions, SnippetFilter};
use std::io::Read;
use tracing::info;

/// Reads the body argument, taking standard input for `-`.
pub fn read_body(body: String) -> Result<String, Box<dyn std::error::Error>> {
    if body == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(body)
    }
}

/// Opens (creating if needed) the vault and reports its state.
pub fn init(session: &Session) -> CommandResult {
    let ctx = session.context();
    let license = ctx.license.status();
    info!(path = %ctx.vault.data_dir().display(), "vault ready");
    session.emit(&license, |state| {
        println!("✓ Vault ready at {}", ctx.vault.data_dir().display());
        print!("  License: {}", state.status);
        if let Some(days) = state.days_left {
            print!(" ({days} days left)");
        }
        println!();
    })
}

/// Saves a snippet.
pub fn add(session: &Session, input: NewSnippet) -> CommandResult {
    let snippet = session.context().vault.create_snippet(input)?;
    session.emit(&snippet, |s| println!("{}", s.id))
}

/// Prints one snippet.
pub fn get(session: &Session, id: &str, markdown: bool) -> CommandResult {
    let vault = &session.context().vault;
    if markdown {
        print!("{}", vault.export_markdown(id)?);
        return Ok(());
    }
    let snippet = vault.get_snippet(id)?;
    session.emit(&snippet, |s| {
        println!("{}  {}", s.id, s.title);
        if !s.tags.is_empty() {
            println!("  tags:        {}", s.tags.join(", "));
        }
        if !s.collections.is_empty() {
            println!("  collections: {}", s.collections.join(", "));
        }
        if let Some(source) = &s.source {
            println!("  source:      {source}");
        }
        println!("  updated:     {}", format_timestamp(s.updated_at));
        println!();
        println!("{}", s.body);
    })
}

/// Lists snippets.
pub fn list(session: &Session, filter: &SnippetFilter, limit: u32, offset: u32) -> CommandResult {
    let page = session.context().vault.list_snippets(filter, limit, offset)?;
    session.emit(&page, |page| {
        for s in &page.items {
            let mark = if s.pinned { "*" } else { " " };
            println!("{mark} {}  {}", s.id, s.title);
        }
        println!("({} of {})", page.items.len(), page.total);
    })
}

/// Runs a search.
pub fn search(session: &Session, query: &str, options: &SearchOptions) -> CommandResult {
    let page = session.context().vault.search(query, options)?;
    session.emit(&page, |page| {
        for hit in &page.items {
            println!("{}  {}", hit.id, hit.title);
            println!("    {}", hit.preview);
        }
        println!("({} of {})", page.items.len(), page.total);
    })
}

/// Deletes a snippet.
pub fn remove(session: &Session, id: &str) -> CommandResult {
    session.context().vault.delete_snippet(id)?;
    session.emit(&serde_json::json!({ "deleted": true }), |_| {
        println!("✓ Deleted {id}");
    })
}
