//! Tag records.

use super::{clamp_limit, validate, Vault};
use crate::error::{VaultError, VaultResult};
use crate::types::{NewTag, Page, Tag, TagPatch, Timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

/// Color given to tags created without one.
pub const DEFAULT_TAG_COLOR: &str = "#6366F1";

const SELECT_TAG: &str = "SELECT t.id, t.name, t.color, t.created_at, \
     (SELECT COUNT(*) FROM snippet_tags st WHERE st.tag_id = t.id) \
     FROM tags t";

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    let count: i64 = row.get(4)?;
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        created_at: row.get(3)?,
        snippet_count: u64::try_from(count).unwrap_or(0),
    })
}

pub(crate) fn load(conn: &Connection, id: &str) -> VaultResult<Option<Tag>> {
    Ok(conn
        .query_row(&format!("{SELECT_TAG} WHERE t.id = ?1"), params![id], tag_from_row)
        .optional()?)
}

/// Looks up a tag id by its normalized name.
pub(crate) fn find_id(conn: &Connection, name: &str) -> VaultResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM tags WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?)
}

/// Inserts a tag row. Fails with a unique violation if the name exists.
pub(crate) fn insert(
    conn: &Connection,
    id: &str,
    name: &str,
    color: Option<&str>,
    now: Timestamp,
) -> VaultResult<()> {
    conn.execute(
        "INSERT INTO tags (id, name, color, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, name, color.unwrap_or(DEFAULT_TAG_COLOR), now],
    )?;
    Ok(())
}

/// Resolves normalized names to ids, creating any tag that does not exist.
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
                insert(conn, &id, name, None, now)?;
                id
            }
        };
        ids.push(id);
    }
    Ok(ids)
}

/// Names of the tags attached to a snippet, sorted.
pub(crate) fn names_for_snippet(conn: &Connection, snippet_id: &str) -> VaultResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM snippet_tags st JOIN tags t ON t.id = st.tag_id \
         WHERE st.snippet_id = ?1 ORDER BY t.name",
    )?;
    let names = stmt
        .query_map(params![snippet_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Replaces the tag set of a snippet, touching only the rows that differ.
pub(crate) fn set_for_snippet(
    conn: &Connection,
    snippet_id: &str,
    tag_ids: &[String],
) -> VaultResult<()> {
    let current = conn
        .prepare_cached("SELECT tag_id FROM snippet_tags WHERE snippet_id = ?1")?
        .query_map(params![snippet_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    for removed in current.iter().filter(|id| !tag_ids.contains(id)) {
        conn.execute(
            "DELETE FROM snippet_tags WHERE snippet_id = ?1 AND tag_id = ?2",
            params![snippet_id, removed],
        )?;
    }
    for added in tag_ids.iter().filter(|id| !current.contains(id)) {
        conn.execute(
            "INSERT OR IGNORE INTO snippet_tags (snippet_id, tag_id) VALUES (?1, ?2)",
            params![snippet_id, added],
        )?;
    }
    Ok(())
}

impl Vault {
    /// Creates a tag.
    ///
    /// # Errors
    ///
    /// `Conflict` if a tag with the same normalized name exists.
    pub fn create_tag(&self, input: NewTag) -> VaultResult<Tag> {
        let name = validate::tag_name(&input.name)?;
        let color = validate::color(input.color.as_deref())?;
        let now = self.now();

        let tag = self.write(|conn| {
            if find_id(conn, &name)?.is_some() {
                return Err(VaultError::conflict(format!("tag {name:?} already exists")));
            }
            let id = Uuid::new_v4().to_string();
            insert(conn, &id, &name, color.as_deref(), now).map_err(|e| {
                if e.is_unique_violation() {
                    VaultError::conflict(format!("tag {name:?} already exists"))
                } else {
                    e
                }
            })?;
            load(conn, &id)?.ok_or_else(|| VaultError::internal("tag vanished after insert"))
        })?;
        info!(tag = %tag.name, "tag created");
        Ok(tag)
    }

    /// Lists tags by name with their snippet counts.
    pub fn list_tags(&self, limit: u32, offset: u32) -> VaultResult<Page<Tag>> {
        let limit = clamp_limit(limit);
        self.read(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
            let mut stmt =
                conn.prepare(&format!("{SELECT_TAG} ORDER BY t.name LIMIT ?1 OFFSET ?2"))?;
            let items = stmt
                .query_map(params![limit, offset], tag_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Page {
                items,
                total: u64::try_from(total).unwrap_or(0),
                limit,
                offset,
            })
        })
    }

    /// Fetches a tag by id.
    pub fn get_tag(&self, id: &str) -> VaultResult<Tag> {
        self.read(|conn| load(conn, id)?.ok_or_else(|| VaultError::not_found("tag", id)))
    }

    /// Renames or recolors a tag.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Conflict` when renaming onto another
    /// tag's name.
    pub fn update_tag(&self, id: &str, patch: TagPatch) -> VaultResult<Tag> {
        let name = patch.name.as_deref().map(validate::tag_name).transpose()?;
        let color = validate::color(patch.color.as_deref())?;

        self.write(|conn| {
            if load(conn, id)?.is_none() {
                return Err(VaultError::not_found("tag", id));
            }
            if let Some(name) = &name {
                if find_id(conn, name)?.is_some_and(|other| other != id) {
                    return Err(VaultError::conflict(format!("tag {name:?} already exists")));
                }
                conn.execute("UPDATE tags SET name = ?1 WHERE id = ?2", params![name, id])?;
            }
            if let Some(color) = &color {
                conn.execute("UPDATE tags SET color = ?1 WHERE id = ?2", params![color, id])?;
            }
            load(conn, id)?.ok_or_else(|| VaultError::not_found("tag", id))
        })
    }

    /// Deletes a tag and its association rows. Snippets are untouched.
    pub fn delete_tag(&self, id: &str) -> VaultResult<()> {
        self.write(|conn| {
            conn.execute("DELETE FROM snippet_tags WHERE tag_id = ?1", params![id])?;
            let removed = conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(VaultError::not_found("tag", id));
            }
            Ok(())
        })?;
        info!(tag_id = %id, "tag deleted");
        Ok(())
    }
}
