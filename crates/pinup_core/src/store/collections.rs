//! Collection records.

use super::{bump, clamp_limit, validate, Vault};
use crate::error::{VaultError, VaultResult};
use crate::types::{Collection, CollectionPatch, NewCollection, Page, Timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

/// Color given to collections created without one.
pub const DEFAULT_COLLECTION_COLOR: &str = "#3B82F6";

const SELECT_COLLECTION: &str = "SELECT c.id, c.name, c.description, c.icon, c.color, \
     c.created_at, c.updated_at, \
     (SELECT COUNT(*) FROM snippet_collections sc WHERE sc.collection_id = c.id) \
     FROM collections c";

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    let count: i64 = row.get(7)?;
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        color: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        snippet_count: u64::try_from(count).unwrap_or(0),
    })
}

pub(crate) fn load(conn: &Connection, id: &str) -> VaultResult<Option<Collection>> {
    Ok(conn
        .query_row(
            &format!("{SELECT_COLLECTION} WHERE c.id = ?1"),
            params![id],
            collection_from_row,
        )
        .optional()?)
}

/// Looks up a collection id by name, ignoring case.
pub(crate) fn find_id(conn: &Connection, name: &str) -> VaultResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM collections WHERE name_key = ?1",
            params![validate::fold(name)],
            |row| row.get(0),
        )
        .optional()?)
}

/// Fields of a collection row as written.
pub(crate) struct CollectionRow<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub color: Option<&'a str>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

pub(crate) fn insert(conn: &Connection, row: &CollectionRow<'_>) -> VaultResult<()> {
    conn.execute(
        "INSERT INTO collections (id, name, name_key, description, icon, color, created_at, \
         updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.id,
            row.name,
            validate::fold(row.name),
            row.description,
            row.icon,
            row.color.unwrap_or(DEFAULT_COLLECTION_COLOR),
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(())
}

/// Resolves names to ids, creating any collection that does not exist.
pub(crate) fn resolve_ids(
    conn: &Connection,
    names: &[String],
    now: Timestamp,
) -> VaultResult<Vec<String>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id = match find_id(conn, name)? {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                insert(
                    conn,
                    &CollectionRow {
                        id: &id,
                        name,
                        description: None,
                        icon: None,
                        color: None,
                        created_at: now,
                        updated_at: now,
                    },
                )?;
                id
            }
        };
        ids.push(id);
    }
    Ok(ids)
}

/// Names of the collections containing a snippet, sorted.
pub(crate) fn names_for_snippet(conn: &Connection, snippet_id: &str) -> VaultResult<Vec<String>> {
    let names = conn
        .prepare_cached(
            "SELECT c.name FROM snippet_collections sc \
             JOIN collections c ON c.id = sc.collection_id \
             WHERE sc.snippet_id = ?1 ORDER BY c.name",
        )?
        .query_map(params![snippet_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Replaces the collection set of a snippet, touching only the rows that differ.
pub(crate) fn set_for_snippet(
    conn: &Connection,
    snippet_id: &str,
    collection_ids: &[String],
) -> VaultResult<()> {
    let current = conn
        .prepare_cached("SELECT collection_id FROM snippet_collections WHERE snippet_id = ?1")?
        .query_map(params![snippet_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    for removed in current.iter().filter(|id| !collection_ids.contains(id)) {
        conn.execute(
            "DELETE FROM snippet_collections WHERE snippet_id = ?1 AND collection_id = ?2",
            params![snippet_id, removed],
        )?;
    }
    for added in collection_ids.iter().filter(|id| !current.contains(id)) {
        conn.execute(
            "INSERT OR IGNORE INTO snippet_collections (snippet_id, collection_id) VALUES (?1, ?2)",
            params![snippet_id, added],
        )?;
    }
    Ok(())
}

fn conflict(name: &str) -> VaultError {
    VaultError::conflict(format!("collection {name:?} already exists"))
}

impl Vault {
    /// Creates a collection.
    ///
    /// # Errors
    ///
    /// `Conflict` if a collection with the same name (ignoring case) exists.
    pub fn create_collection(&self, input: NewCollection) -> VaultResult<Collection> {
        let name = validate::collection_name(&input.name)?;
        let description = validate::optional(
            "description",
            input.description.as_deref(),
            validate::MAX_DESCRIPTION_LEN,
        )?;
        let icon = validate::optional("icon", input.icon.as_deref(), validate::MAX_ICON_LEN)?;
        let color = validate::color(input.color.as_deref())?;
        let now = self.now();

        let collection = self.write(|conn| {
            if find_id(conn, &name)?.is_some() {
                return Err(conflict(&name));
            }
            let id = Uuid::new_v4().to_string();
            let row = CollectionRow {
                id: &id,
                name: &name,
                description: description.as_deref(),
                icon: icon.as_deref(),
                color: color.as_deref(),
                created_at: now,
                updated_at: now,
            };
            insert(conn, &row).map_err(|e| if e.is_unique_violation() { conflict(&name) } else { e })?;
            load(conn, &id)?.ok_or_else(|| VaultError::internal("collection vanished after insert"))
        })?;
        info!(collection = %collection.name, "collection created");
        Ok(collection)
    }

    /// Lists collections by name with their snippet counts.
    pub fn list_collections(&self, limit: u32, offset: u32) -> VaultResult<Page<Collection>> {
        let limit = clamp_limit(limit);
        self.read(|conn| {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))?;
            let items = conn
                .prepare(&format!(
                    "{SELECT_COLLECTION} ORDER BY c.name_key LIMIT ?1 OFFSET ?2"
                ))?
                .query_map(params![limit, offset], collection_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Page {
                items,
                total: u64::try_from(total).unwrap_or(0),
                limit,
                offset,
            })
        })
    }

    /// Fetches a collection by id.
    pub fn get_collection(&self, id: &str) -> VaultResult<Collection> {
        self.read(|conn| load(conn, id)?.ok_or_else(|| VaultError::not_found("collection", id)))
    }

    /// Updates a collection's name or presentation fields.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Conflict` when renaming onto another
    /// collection's name.
    pub fn update_collection(&self, id: &str, patch: CollectionPatch) -> VaultResult<Collection> {
        let name = patch
            .name
            .as_deref()
            .map(validate::collection_name)
            .transpose()?;
        let description = validate::optional(
            "description",
            patch.description.as_deref(),
            validate::MAX_DESCRIPTION_LEN,
        )?;
        let icon = validate::optional("icon", patch.icon.as_deref(), validate::MAX_ICON_LEN)?;
        let color = validate::color(patch.color.as_deref())?;
        let now = self.now();

        self.write(|conn| {
            let existing = load(conn, id)?.ok_or_else(|| VaultError::not_found("collection", id))?;
            if let Some(name) = &name {
                if find_id(conn, name)?.is_some_and(|other| other != id) {
                    return Err(conflict(name));
                }
            }
            let name = name.as_deref().unwrap_or(&existing.name);
            conn.execute(
                "UPDATE collections SET name = ?1, name_key = ?2, description = ?3, icon = ?4, \
                 color = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    name,
                    validate::fold(name),
                    description.as_deref().or(existing.description.as_deref()),
                    icon.as_deref().or(existing.icon.as_deref()),
                    color.as_deref().or(existing.color.as_deref()),
                    bump(now, existing.created_at),
                    id,
                ],
            )?;
            load(conn, id)?.ok_or_else(|| VaultError::not_found("collection", id))
        })
    }

    /// Deletes a collection and its association rows. Snippets are untouched.
    pub fn delete_collection(&self, id: &str) -> VaultResult<()> {
        self.write(|conn| {
            conn.execute(
                "DELETE FROM snippet_collections WHERE collection_id = ?1",
                params![id],
            )?;
            let removed = conn.execute("DELETE FROM collections WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(VaultError::not_found("collection", id));
            }
            Ok(())
        })?;
        info!(collection_id = %id, "collection deleted");
        Ok(())
    }
}
