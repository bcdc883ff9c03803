//! Connection setup and schema migrations.

use crate::error::{VaultError, VaultResult};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

/// Current schema version stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS snippets (
  id TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  body TEXT NOT NULL,
  language TEXT,
  source TEXT,
  source_key TEXT,
  source_url TEXT,
  pinned INTEGER NOT NULL DEFAULT 0,
  archived INTEGER NOT NULL DEFAULT 0,
  content_hash TEXT NOT NULL,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snippets_updated_at ON snippets(updated_at);
CREATE INDEX IF NOT EXISTS idx_snippets_content_hash ON snippets(content_hash);
CREATE INDEX IF NOT EXISTS idx_snippets_source_key ON snippets(source_key);

CREATE TABLE IF NOT EXISTS tags (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  color TEXT,
  created_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name ON tags(name);

CREATE TABLE IF NOT EXISTS collections (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  name_key TEXT NOT NULL,
  description TEXT,
  icon TEXT,
  color TEXT,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_collections_name_key ON collections(name_key);

CREATE TABLE IF NOT EXISTS snippet_tags (
  snippet_id TEXT NOT NULL,
  tag_id TEXT NOT NULL,
  PRIMARY KEY (snippet_id, tag_id),
  FOREIGN KEY(snippet_id) REFERENCES snippets(id) ON DELETE CASCADE,
  FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_snippet_tags_tag ON snippet_tags(tag_id);

CREATE TABLE IF NOT EXISTS snippet_collections (
  snippet_id TEXT NOT NULL,
  collection_id TEXT NOT NULL,
  PRIMARY KEY (snippet_id, collection_id),
  FOREIGN KEY(snippet_id) REFERENCES snippets(id) ON DELETE CASCADE,
  FOREIGN KEY(collection_id) REFERENCES collections(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_snippet_collections_collection
  ON snippet_collections(collection_id);

CREATE VIRTUAL TABLE IF NOT EXISTS snippets_fts USING fts5(
  snippet_id UNINDEXED,
  title,
  body,
  language,
  source
);
"#;

/// Opens a connection with the pragmas every vault connection needs.
pub(crate) fn open_connection(path: &Path, busy_timeout: Duration) -> VaultResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    let conn = Connection::open_with_flags(path, flags)?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// Runs the integrity check and brings the schema up to [`SCHEMA_VERSION`].
///
/// A failed integrity check is fatal; the file is never repaired by
/// discarding data.
pub(crate) fn migrate(conn: &Connection) -> VaultResult<()> {
    let check: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| VaultError::corrupt(format!("integrity check could not run: {e}")))?;
    if check != "ok" {
        return Err(VaultError::corrupt(format!("integrity check failed: {check}")));
    }

    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if user_version > SCHEMA_VERSION {
        return Err(VaultError::corrupt(format!(
            "schema version {user_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    if user_version < 1 {
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        let result = conn
            .execute_batch(SCHEMA_V1)
            .and_then(|()| conn.execute_batch("PRAGMA user_version = 1;"));
        match result {
            Ok(()) => conn.execute_batch("COMMIT;")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK;");
                return Err(VaultError::corrupt(format!("schema init failed: {e}")));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_enables_wal_and_foreign_keys() {
        let temp = TempDir::new().unwrap();
        let conn = open_connection(&temp.path().join("t.db"), Duration::from_secs(1)).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn migrate_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let conn = open_connection(&temp.path().join("t.db"), Duration::from_secs(1)).unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let fts: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'snippets_fts'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(fts, 1);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = TempDir::new().unwrap();
        let conn = open_connection(&temp.path().join("t.db"), Duration::from_secs(1)).unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
        let err = migrate(&conn).unwrap_err();
        assert!(matches!(err, VaultError::Corrupt { .. }));
    }
}
