//! FTS5 shadow table maintenance and querying.
//!
//! Every statement here runs on a connection the caller already holds inside
//! a transaction, so shadow rows always move together with the primary rows.

use super::query::ParsedQuery;
use super::{SearchHit, SearchOptions};
use crate::error::VaultResult;
use crate::store::collections;
use crate::store::tags;
use crate::types::{Page, Timestamp};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

/// Preview length in characters.
pub const PREVIEW_LEN: usize = 200;

const SHADOW_SELECT: &str =
    "SELECT id, title, body, coalesce(language, ''), coalesce(source, '') FROM snippets";

/// Replaces the shadow row of one snippet (delete, then insert).
pub(crate) fn replace_shadow(conn: &Connection, snippet_id: &str) -> VaultResult<()> {
    delete_shadow(conn, snippet_id)?;
    conn.execute(
        &format!(
            "INSERT INTO snippets_fts (snippet_id, title, body, language, source) \
             {SHADOW_SELECT} WHERE id = ?1"
        ),
        params![snippet_id],
    )?;
    Ok(())
}

/// Removes the shadow row of one snippet.
pub(crate) fn delete_shadow(conn: &Connection, snippet_id: &str) -> VaultResult<()> {
    conn.execute(
        "DELETE FROM snippets_fts WHERE snippet_id = ?1",
        params![snippet_id],
    )?;
    Ok(())
}

/// Drops every shadow row and repopulates from the snippet table.
///
/// Returns the number of rows written. Running it twice leaves the same
/// table as running it once.
pub(crate) fn rebuild(conn: &Connection) -> VaultResult<usize> {
    conn.execute("DELETE FROM snippets_fts", [])?;
    let rows = conn.execute(
        &format!("INSERT INTO snippets_fts (snippet_id, title, body, language, source) {SHADOW_SELECT}"),
        [],
    )?;
    Ok(rows)
}

/// Single-line preview of a body.
#[must_use]
pub fn preview(body: &str) -> String {
    body.chars()
        .take(PREVIEW_LEN)
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect()
}

/// Executes a parsed query.
pub(crate) fn search(
    conn: &Connection,
    query: &ParsedQuery,
    options: &SearchOptions,
    limit: u32,
) -> VaultResult<Page<SearchHit>> {
    let empty = Page {
        items: Vec::new(),
        total: 0,
        limit,
        offset: options.offset,
    };
    if query.matches_nothing() {
        return Ok(empty);
    }

    let mut args: Vec<Value> = Vec::new();
    let mut wheres: Vec<String> = Vec::new();
    let fts = query.fts_expression();

    let (from, rank) = match &fts {
        Some(expr) => {
            args.push(Value::Text(expr.clone()));
            wheres.push(format!("snippets_fts MATCH ?{}", args.len()));
            (
                "snippets_fts JOIN snippets s ON s.id = snippets_fts.snippet_id",
                "bm25(snippets_fts)",
            )
        }
        None => ("snippets s", "NULL"),
    };

    if !options.include_archived {
        wheres.push("s.archived = 0".to_string());
    }
    for tag in query.tags() {
        args.push(Value::Text(tag.to_string()));
        wheres.push(format!(
            "EXISTS (SELECT 1 FROM snippet_tags st JOIN tags t ON t.id = st.tag_id \
             WHERE st.snippet_id = s.id AND t.name = ?{})",
            args.len()
        ));
    }
    for source in query.sources() {
        args.push(Value::Text(source.to_string()));
        wheres.push(format!("s.source_key = ?{}", args.len()));
    }

    let where_sql = if wheres.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", wheres.join(" AND "))
    };
    let order_sql = if fts.is_some() {
        "ORDER BY score ASC, s.updated_at DESC, s.id"
    } else {
        "ORDER BY s.updated_at DESC, s.id"
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {from} {where_sql}"),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;
    if total == 0 {
        return Ok(empty);
    }

    let page_args = args
        .iter()
        .cloned()
        .chain([Value::Integer(i64::from(limit)), Value::Integer(i64::from(options.offset))]);
    let limit_idx = args.len() + 1;
    let offset_idx = args.len() + 2;
    let sql = format!(
        "SELECT s.id, s.title, s.body, s.language, s.source, s.pinned, s.archived, \
         s.created_at, s.updated_at, {rank} AS score \
         FROM {from} {where_sql} {order_sql} LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );

    let rows = conn
        .prepare(&sql)?
        .query_map(params_from_iter(page_args), hit_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut items = Vec::with_capacity(rows.len());
    for mut hit in rows {
        hit.tags = tags::names_for_snippet(conn, &hit.id)?;
        hit.collections = collections::names_for_snippet(conn, &hit.id)?;
        items.push(hit);
    }

    Ok(Page {
        items,
        total: u64::try_from(total).unwrap_or(0),
        limit,
        offset: options.offset,
    })
}

fn hit_from_row(row: &Row<'_>) -> rusqlite::Result<SearchHit> {
    let body: String = row.get(2)?;
    let created_at: Timestamp = row.get(7)?;
    let updated_at: Timestamp = row.get(8)?;
    Ok(SearchHit {
        id: row.get(0)?,
        title: row.get(1)?,
        preview: preview(&body),
        language: row.get(3)?,
        source: row.get(4)?,
        pinned: row.get::<_, i64>(5)? != 0,
        archived: row.get::<_, i64>(6)? != 0,
        tags: Vec::new(),
        collections: Vec::new(),
        created_at,
        updated_at,
        score: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_single_line_and_bounded() {
        let body = format!("line one\nline two\r\n{}", "x".repeat(400));
        let p = preview(&body);
        assert_eq!(p.chars().count(), PREVIEW_LEN);
        assert!(!p.contains('\n'));
        assert!(p.starts_with("line one line two"));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(300);
        assert_eq!(preview(&body).chars().count(), PREVIEW_LEN);
    }
}
