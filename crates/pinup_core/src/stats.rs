//! Vault statistics.

use crate::backup::BackupManager;
use crate::clock::DAY_MS;
use crate::error::VaultResult;
use crate::store::Vault;
use crate::types::Timestamp;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// How many tags, collections and recent snippets are reported.
pub const TOP_N: u32 = 10;

/// A name with a usage count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCount {
    /// Tag or collection name.
    pub name: String,
    /// Snippets using it.
    pub count: u64,
}

/// A recently updated snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSnippet {
    /// Snippet id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Last modification time.
    pub updated_at: Timestamp,
}

/// Snapshot of vault statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    /// All snippets.
    pub total_snippets: u64,
    /// Distinct tags.
    pub total_tags: u64,
    /// Distinct collections.
    pub total_collections: u64,
    /// Pinned snippets.
    pub pinned: u64,
    /// Archived snippets.
    pub archived: u64,
    /// Most used tags.
    pub top_tags: Vec<NamedCount>,
    /// Largest collections.
    pub top_collections: Vec<NamedCount>,
    /// Snippets created in the last 7 days.
    pub created_last_7_days: u64,
    /// Snippets created in the last 30 days.
    pub created_last_30_days: u64,
    /// Most recently updated snippets.
    pub recent: Vec<RecentSnippet>,
    /// Size of the primary file in bytes.
    pub db_size_bytes: u64,
    /// Time of the newest backup.
    pub last_backup_at: Option<Timestamp>,
}

impl Vault {
    /// Computes statistics in one read transaction.
    pub fn stats(&self, backups: &BackupManager) -> VaultResult<VaultStats> {
        let now = self.now();
        let mut stats = self.read(|conn| {
            Ok(VaultStats {
                total_snippets: count(conn, "SELECT COUNT(*) FROM snippets")?,
                total_tags: count(conn, "SELECT COUNT(*) FROM tags")?,
                total_collections: count(conn, "SELECT COUNT(*) FROM collections")?,
                pinned: count(conn, "SELECT COUNT(*) FROM snippets WHERE pinned = 1")?,
                archived: count(conn, "SELECT COUNT(*) FROM snippets WHERE archived = 1")?,
                top_tags: top(
                    conn,
                    "SELECT t.name, COUNT(st.snippet_id) AS n FROM tags t \
                     JOIN snippet_tags st ON st.tag_id = t.id \
                     GROUP BY t.id ORDER BY n DESC, t.name LIMIT ?1",
                )?,
                top_collections: top(
                    conn,
                    "SELECT c.name, COUNT(sc.snippet_id) AS n FROM collections c \
                     JOIN snippet_collections sc ON sc.collection_id = c.id \
                     GROUP BY c.id ORDER BY n DESC, c.name_key LIMIT ?1",
                )?,
                created_last_7_days: created_since(conn, now - 7 * DAY_MS)?,
                created_last_30_days: created_since(conn, now - 30 * DAY_MS)?,
                recent: conn
                    .prepare(
                        "SELECT id, title, updated_at FROM snippets \
                         ORDER BY updated_at DESC, id LIMIT ?1",
                    )?
                    .query_map(params![TOP_N], |row| {
                        Ok(RecentSnippet {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            updated_at: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?,
                db_size_bytes: 0,
                last_backup_at: None,
            })
        })?;

        stats.db_size_bytes = self.file_size()?;
        stats.last_backup_at = backups.latest()?.map(|entry| entry.created_at);
        Ok(stats)
    }
}

fn count(conn: &Connection, sql: &str) -> VaultResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(u64::try_from(n).unwrap_or(0))
}

fn created_since(conn: &Connection, since: Timestamp) -> VaultResult<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM snippets WHERE created_at >= ?1",
        params![since],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(n).unwrap_or(0))
}

fn top(conn: &Connection, sql: &str) -> VaultResult<Vec<NamedCount>> {
    Ok(conn
        .prepare(sql)?
        .query_map(params![TOP_N], |row| {
            let n: i64 = row.get(1)?;
            Ok(NamedCount {
                name: row.get(0)?,
                count: u64::try_from(n).unwrap_or(0),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::VaultConfig;
    use crate::license::FixedEntitlement;
    use crate::types::NewSnippet;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn stats_cover_counts_windows_and_backups() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let config = VaultConfig::new(temp.path());
        let backups = BackupManager::with_clock(config.backup.clone(), clock.clone());
        let vault =
            Vault::open_with_clock(config, Arc::new(FixedEntitlement(true)), clock.clone()).unwrap();

        vault
            .create_snippet(NewSnippet::new("old one").tag("rust").collection("Work"))
            .unwrap();
        clock.advance_days(20);
        let pinned = vault
            .create_snippet(NewSnippet::new("newer").tag("rust").tag("cli"))
            .unwrap();
        vault.pin(&pinned.id).unwrap();
        clock.advance_days(5);
        let archived = vault.create_snippet(NewSnippet::new("newest")).unwrap();
        vault.archive(&archived.id).unwrap();

        let empty = vault.stats(&backups).unwrap();
        assert_eq!(empty.last_backup_at, None);

        let entry = backups.run_backup(&vault).unwrap();
        let stats = vault.stats(&backups).unwrap();

        assert_eq!(stats.total_snippets, 3);
        assert_eq!(stats.total_tags, 2);
        assert_eq!(stats.total_collections, 1);
        assert_eq!(stats.pinned, 1);
        assert_eq!(stats.archived, 1);
        assert_eq!(
            stats.top_tags,
            vec![
                NamedCount { name: "rust".into(), count: 2 },
                NamedCount { name: "cli".into(), count: 1 },
            ]
        );
        assert_eq!(stats.top_collections[0].name, "Work");
        assert_eq!(stats.created_last_7_days, 2);
        assert_eq!(stats.created_last_30_days, 3);
        assert_eq!(stats.recent[0].id, archived.id);
        assert!(stats.db_size_bytes > 0);
        assert_eq!(stats.last_backup_at, Some(entry.created_at));
    }
}
