//! The vault store.
//!
//! [`Vault`] owns the SQLite file holding snippets, tags, collections, their
//! associations and the full-text shadow table. It is the only component that
//! mutates primary data.
//!
//! ## Connections
//!
//! The store keeps one writer and one reader connection behind a gate:
//!
//! - every operation takes the gate shared for its duration
//! - mutations run on the writer inside `BEGIN IMMEDIATE ... COMMIT`
//! - reads run on the reader inside a deferred transaction so multi-statement
//!   reads see one snapshot
//! - restore takes the gate exclusively (try-only) and swaps the file while
//!   no connection is open
//!
//! ```rust,ignore
//! use pinup_core::{NewSnippet, Vault, VaultConfig};
//!
//! let vault = Vault::open(VaultConfig::new("data"), entitlement)?;
//! let snippet = vault.create_snippet(NewSnippet::new("useEffect cleanup").tag("react"))?;
//! assert_eq!(vault.shadow_count()?, vault.snippet_count()?);
//! ```

pub(crate) mod collections;
mod schema;
pub(crate) mod snippets;
pub(crate) mod tags;
pub(crate) mod validate;

pub use schema::SCHEMA_VERSION;

use crate::clock::{Clock, SystemClock};
use crate::config::VaultConfig;
use crate::dir::DataDir;
use crate::error::{VaultError, VaultResult};
use crate::index::fts;
use crate::license::Entitlement;
use crate::types::Timestamp;
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Largest page any list or search returns.
pub const MAX_PAGE_SIZE: u32 = 500;

struct Connections {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

/// Handle to an open vault.
pub struct Vault {
    config: VaultConfig,
    dir: DataDir,
    dedupe: AtomicBool,
    entitlement: Arc<dyn Entitlement>,
    clock: Arc<dyn Clock>,
    conns: RwLock<Option<Connections>>,
}

impl Vault {
    /// Opens (or creates) the vault described by `config`.
    ///
    /// `entitlement` decides whether the free-tier snippet ceiling applies.
    ///
    /// # Errors
    ///
    /// - `BackupInFlight` if another process is restoring this vault
    /// - `Corrupt` if the primary file cannot be opened, fails its integrity
    ///   check or carries a newer schema
    pub fn open(config: VaultConfig, entitlement: Arc<dyn Entitlement>) -> VaultResult<Self> {
        Self::open_with_clock(config, entitlement, Arc::new(SystemClock))
    }

    /// Opens the vault with an explicit time source.
    pub fn open_with_clock(
        config: VaultConfig,
        entitlement: Arc<dyn Entitlement>,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        let dir = DataDir::open(&config.data_dir, config.create_if_missing)?;
        let conns = connect(&dir.db_path(), &config)?;
        info!(path = %dir.path().display(), "vault opened");

        Ok(Self {
            dedupe: AtomicBool::new(config.dedupe_enabled),
            config,
            dir,
            entitlement,
            clock,
            conns: RwLock::new(Some(conns)),
        })
    }

    /// Returns the configuration the vault was opened with.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Returns the data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the path of the primary data file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.dir.db_path()
    }

    pub(crate) fn dir(&self) -> &DataDir {
        &self.dir
    }

    /// Returns whether content deduplication is active.
    #[must_use]
    pub fn dedupe_enabled(&self) -> bool {
        self.dedupe.load(Ordering::SeqCst)
    }

    /// Turns content deduplication on or off.
    pub fn set_dedupe_enabled(&self, enabled: bool) {
        self.dedupe.store(enabled, Ordering::SeqCst);
        debug!(enabled, "dedupe setting changed");
    }

    /// Returns whether the entitlement collaborator currently grants access.
    #[must_use]
    pub fn is_entitled(&self) -> bool {
        self.entitlement.is_entitled()
    }

    /// Current time on the vault's clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    /// Number of rows in the snippet table.
    pub fn snippet_count(&self) -> VaultResult<u64> {
        self.read(|conn| count(conn, "SELECT COUNT(*) FROM snippets"))
    }

    /// Number of rows in the full-text shadow table.
    ///
    /// Equal to [`Vault::snippet_count`] at every observable point.
    pub fn shadow_count(&self) -> VaultResult<u64> {
        self.read(|conn| count(conn, "SELECT COUNT(*) FROM snippets_fts"))
    }

    /// Size of the primary data file in bytes.
    pub fn file_size(&self) -> VaultResult<u64> {
        Ok(fs::metadata(self.db_path())?.len())
    }

    /// Runs `f` on the writer inside `BEGIN IMMEDIATE`.
    ///
    /// If `f` returns `Ok` the transaction is committed; otherwise it is
    /// rolled back and nothing `f` wrote is visible to any reader.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Connection) -> VaultResult<T>) -> VaultResult<T> {
        let guard = self.conns.read();
        let conns = guard.as_ref().ok_or_else(closed)?;
        let mut conn = conns.writer.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `f` on the reader inside a deferred transaction.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> VaultResult<T>) -> VaultResult<T> {
        let guard = self.conns.read();
        let conns = guard.as_ref().ok_or_else(closed)?;
        let mut conn = conns.reader.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let value = f(&tx)?;
        tx.finish()?;
        Ok(value)
    }

    /// Checkpoints the WAL into the primary file and runs `f` while writers
    /// are stalled.
    ///
    /// The writer connection is held and a write transaction is open for the
    /// duration of `f`, so neither this process nor any other can commit
    /// (and so trigger a checkpoint into the primary file) while `f` copies it.
    pub(crate) fn with_checkpointed_file<T>(
        &self,
        f: impl FnOnce(&Path) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let guard = self.conns.read();
        let conns = guard.as_ref().ok_or_else(closed)?;
        let mut conn = conns.writer.lock();

        let (busy, log, checkpointed): (i64, i64, i64) =
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
        if busy != 0 {
            return Err(VaultError::backup_in_flight(
                "checkpoint blocked by an active reader",
            ));
        }
        debug!(log, checkpointed, "wal checkpointed");

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&self.dir.db_path())?;
        tx.commit()?;
        Ok(value)
    }

    /// Replaces the primary file while no connection is open.
    ///
    /// Takes the gate exclusively without waiting; if any operation is in
    /// flight (in this process or, through the directory lock, in another)
    /// the call fails with `BackupInFlight` and nothing changes.
    ///
    /// After `replace` succeeds stale `-wal`/`-shm` files are removed,
    /// connections are reopened and the shadow table is rebuilt (one retry).
    /// A rebuild that still fails yields `RestoreFailed` with the new data
    /// left live.
    pub(crate) fn replace_file(
        &self,
        replace: impl FnOnce(&Path) -> VaultResult<()>,
    ) -> VaultResult<usize> {
        self.replace_file_with(replace, fts::rebuild)
    }

    fn replace_file_with(
        &self,
        replace: impl FnOnce(&Path) -> VaultResult<()>,
        rebuild: impl Fn(&Connection) -> VaultResult<usize>,
    ) -> VaultResult<usize> {
        let Some(mut guard) = self.conns.try_write() else {
            return Err(VaultError::backup_in_flight(
                "a vault operation is in flight",
            ));
        };
        let db_path = self.dir.db_path();

        drop(guard.take());
        if let Err(e) = self.dir.lock_exclusive() {
            *guard = Some(connect(&db_path, &self.config)?);
            return Err(e);
        }

        let replaced = replace(&db_path);
        if replaced.is_ok() {
            for suffix in ["-wal", "-shm"] {
                let companion = companion_path(&db_path, suffix);
                match fs::remove_file(&companion) {
                    Ok(()) => debug!(path = %companion.display(), "removed stale companion"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %companion.display(), error = %e, "could not remove companion"),
                }
            }
        }

        if let Err(e) = self.dir.lock_shared() {
            warn!(error = %e, "could not return to the shared directory lock");
        }
        let conns = connect(&db_path, &self.config)?;
        if let Err(e) = replaced {
            *guard = Some(conns);
            return Err(e);
        }

        let rebuilt = rebuild_on(&conns.writer, &rebuild).or_else(|e| {
            warn!(error = %e, "shadow rebuild failed after restore, retrying");
            rebuild_on(&conns.writer, &rebuild)
        });
        *guard = Some(conns);

        rebuilt.map_err(|e| {
            warn!(error = %e, "shadow rebuild failed twice; restored data is live without search");
            VaultError::restore_failed(format!("search index rebuild failed: {e}"))
        })
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("data_dir", &self.dir.path())
            .field("dedupe_enabled", &self.dedupe_enabled())
            .field("is_open", &self.conns.read().is_some())
            .finish_non_exhaustive()
    }
}

fn connect(path: &Path, config: &VaultConfig) -> VaultResult<Connections> {
    let open = || -> VaultResult<Connections> {
        let writer = schema::open_connection(path, config.busy_timeout)?;
        schema::migrate(&writer)?;
        let reader = schema::open_connection(path, config.busy_timeout)?;
        Ok(Connections {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    };
    open().map_err(|e| match e {
        VaultError::Corrupt { .. } | VaultError::BackupInFlight { .. } => e,
        other => VaultError::corrupt(format!("cannot open {}: {other}", path.display())),
    })
}

fn rebuild_on(
    writer: &Mutex<Connection>,
    rebuild: &impl Fn(&Connection) -> VaultResult<usize>,
) -> VaultResult<usize> {
    let mut conn = writer.lock();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let rows = rebuild(&tx)?;
    tx.commit()?;
    Ok(rows)
}

fn closed() -> VaultError {
    VaultError::internal("vault connections are closed")
}

fn count(conn: &Connection, sql: &str) -> VaultResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(u64::try_from(n).unwrap_or(0))
}

pub(crate) fn companion_path(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Page sizes are clamped to `1..=500`.
pub(crate) fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

/// Clamps `updated_at` so it never precedes `created_at`.
pub(crate) fn bump(now: Timestamp, created_at: Timestamp) -> Timestamp {
    now.max(created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::FixedEntitlement;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> Vault {
        Vault::open(
            VaultConfig::new(temp.path()),
            Arc::new(FixedEntitlement(true)),
        )
        .unwrap()
    }

    #[test]
    fn open_creates_schema() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp);
        assert_eq!(vault.snippet_count().unwrap(), 0);
        assert_eq!(vault.shadow_count().unwrap(), 0);
        assert!(vault.db_path().exists());
    }

    #[test]
    fn failed_write_rolls_back() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp);

        let result: VaultResult<()> = vault.write(|conn| {
            conn.execute(
                "INSERT INTO tags (id, name, color, created_at) VALUES ('t1', 'x', NULL, 0)",
                [],
            )?;
            Err(VaultError::validation("abort"))
        });
        assert!(result.is_err());

        let n = vault
            .read(|conn| count(conn, "SELECT COUNT(*) FROM tags"))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("pinup.db"), b"definitely not sqlite, just junk bytes here").unwrap();
        let err = Vault::open(
            VaultConfig::new(temp.path()),
            Arc::new(FixedEntitlement(true)),
        )
        .unwrap_err();
        assert_eq!(err.code(), "INTERNAL");
        assert!(matches!(err, VaultError::Corrupt { .. }));
    }

    #[test]
    fn replace_rejected_while_operation_in_flight() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp);

        let err = vault
            .read(|_| Ok(vault.replace_file(|_| Ok(())).unwrap_err()))
            .unwrap();
        assert_eq!(err.code(), "BACKUP_IN_FLIGHT");
        assert_eq!(vault.snippet_count().unwrap(), 0);
    }

    #[test]
    fn rebuild_failure_after_replace_is_restore_failed() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp);
        let attempts = std::sync::atomic::AtomicUsize::new(0);

        let err = vault
            .replace_file_with(
                |_| Ok(()),
                |_| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(VaultError::internal("index unavailable"))
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "RESTORE_FAILED");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // store is still usable
        assert_eq!(vault.snippet_count().unwrap(), 0);
    }

    #[test]
    fn companion_paths() {
        let p = Path::new("/data/pinup.db");
        assert_eq!(companion_path(p, "-wal"), PathBuf::from("/data/pinup.db-wal"));
    }

    #[test]
    fn bump_never_precedes_creation() {
        assert_eq!(bump(5, 10), 10);
        assert_eq!(bump(15, 10), 15);
    }
}
