//! Tag and collection commands.

use super::{CommandResult, Session};
use crate::LabelAction;
use pinup_core::{CollectionPatch, NewCollection, NewTag, TagPatch};

const PAGE: u32 = 500;

/// Runs a tag action.
pub fn tags(session: &Session, action: LabelAction) -> CommandResult {
    let vault = &session.context().vault;
    match action {
        LabelAction::List => {
            let page = vault.list_tags(PAGE, 0)?;
            session.emit(&page, |page| {
                for tag in &page.items {
                    println!("{}  {} ({})", tag.id, tag.name, tag.snippet_count);
                }
            })
        }
        LabelAction::Create { name, color } => {
            let tag = vault.create_tag(NewTag { name, color })?;
            session.emit(&tag, |t| println!("{}", t.id))
        }
        LabelAction::Rename { id, name } => {
            let patch = TagPatch {
                name: Some(name),
                ..TagPatch::default()
            };
            let tag = vault.update_tag(&id, patch)?;
            session.emit(&tag, |t| println!("✓ Renamed to {}", t.name))
        }
        LabelAction::Delete { id } => {
            vault.delete_tag(&id)?;
            session.emit(&serde_json::json!({ "deleted": true }), |_| {
                println!("✓ Deleted tag {id}");
            })
        }
    }
}

/// Runs a collection action.
pub fn collections(session: &Session, action: LabelAction) -> CommandResult {
    let vault = &session.context().vault;
    match action {
        LabelAction::List => {
            let page = vault.list_collections(PAGE, 0)?;
            session.emit(&page, |page| {
                for c in &page.items {
                    println!("{}  {} ({})", c.id, c.name, c.snippet_count);
                }
            })
        }
        LabelAction::Create { name, color } => {
            let collection = vault.create_collection(NewCollection {
                name,
                color,
                ..NewCollection::default()
            })?;
            session.emit(&collection, |c| println!("{}", c.id))
        }
        LabelAction::Rename { id, name } => {
            let patch = CollectionPatch {
                name: Some(name),
                ..CollectionPatch::default()
            };
            let collection = vault.update_collection(&id, patch)?;
            session.emit(&collection, |c| println!("✓ Renamed to {}", c.name))
        }
        LabelAction::Delete { id } => {
            vault.delete_collection(&id)?;
            session.emit(&serde_json::json!({ "deleted": true }), |_| {
                println!("✓ Deleted collection {id}");
            })
        }
    }
}
