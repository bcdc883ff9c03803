//! Backup and restore of the vault file.
//!
//! A backup is a byte copy of the primary SQLite file taken right after a
//! `wal_checkpoint(TRUNCATE)` with the writer held, so the copy is a
//! complete point-in-time database on its own.
//!
//! ## Backup steps
//!
//! ```text
//! hold writer ─► checkpoint(TRUNCATE) ─► copy to <name>.db.partial
//!     ─► verify size ─► fsync ─► rename to <name>.db ─► append manifest
//! ```
//!
//! Any failure removes the partial file; the live vault is never touched.
//!
//! ## Restore steps
//!
//! The backup is first copied next to the live file and integrity-checked
//! while the vault stays in service. Only then is the vault quiesced, the
//! copy renamed over the live file and the search index rebuilt. If the
//! vault cannot be quiesced immediately the restore is refused with
//! `BackupInFlight` and the caller retries.

use crate::clock::{Clock, SystemClock};
use crate::config::{BackupConfig, BackupSchedule};
use crate::dir::sync_directory;
use crate::error::{VaultError, VaultResult};
use crate::manifest::{backup_path, is_valid_name, BackupEntry, Manifest};
use crate::store::Vault;
use crate::types::Timestamp;
use parking_lot::RwLock;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PARTIAL_SUFFIX: &str = "partial";
const RESTORE_SUFFIX: &str = "restoring";

/// Result of a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Backup that was restored.
    pub name: String,
    /// Shadow rows written by the index rebuild.
    pub indexed: usize,
}

/// Releases the in-flight flag on drop.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> VaultResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| VaultError::backup_in_flight("a backup or restore is already running"))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Manages backup and restore operations for one vault.
pub struct BackupManager {
    config: RwLock<BackupConfig>,
    clock: Arc<dyn Clock>,
    in_flight: AtomicBool,
}

impl BackupManager {
    /// Creates a backup manager with the given configuration.
    #[must_use]
    pub fn new(config: BackupConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a backup manager on the given clock.
    #[must_use]
    pub fn with_clock(config: BackupConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: RwLock::new(config),
            clock,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> BackupConfig {
        self.config.read().clone()
    }

    /// Updates the automatic backup schedule.
    pub fn set_schedule(&self, enabled: bool, schedule: BackupSchedule) {
        let mut config = self.config.write();
        config.enabled = enabled;
        config.schedule = schedule;
    }

    /// Backups directory.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.config.read().dir.clone()
    }

    /// True while a backup or restore is running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Takes a backup now.
    ///
    /// # Errors
    ///
    /// `BackupInFlight` if another backup or restore is running, or if the
    /// WAL could not be fully checkpointed. I/O errors leave no partial file.
    pub fn run_backup(&self, vault: &Vault) -> VaultResult<BackupEntry> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        let config = self.config();
        fs::create_dir_all(&config.dir)?;

        let mut manifest = Manifest::load(&config.dir)?;
        let now = self.clock.now_ms();
        let name = unique_name(&config.dir, &manifest, now);
        let final_path = backup_path(&config.dir, &name);
        let partial = final_path.with_extension(format!("db.{PARTIAL_SUFFIX}"));

        info!(%name, "backup started");
        let copied = vault.with_checkpointed_file(|source| copy_verified(source, &partial));
        let size_bytes = match copied.and_then(|size| {
            fs::rename(&partial, &final_path)?;
            sync_directory(&config.dir)?;
            Ok(size)
        }) {
            Ok(size) => size,
            Err(e) => {
                remove_if_exists(&partial);
                warn!(%name, error = %e, "backup failed");
                return Err(e);
            }
        };

        let entry = BackupEntry {
            name,
            created_at: now,
            size_bytes,
            app_version: config.app_version.clone(),
        };
        manifest.backups.push(entry.clone());
        manifest.save(&config.dir)?;

        info!(name = %entry.name, size_bytes, "backup completed");
        Ok(entry)
    }

    /// Lists backups, newest first.
    pub fn list_backups(&self) -> VaultResult<Vec<BackupEntry>> {
        Ok(Manifest::load(&self.dir())?.newest_first())
    }

    /// The most recent backup, if any.
    pub fn latest(&self) -> VaultResult<Option<BackupEntry>> {
        Ok(Manifest::load(&self.dir())?.latest().cloned())
    }

    /// Restores the vault from the named backup.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed name
    /// - `NotFound` for a name not in the manifest or whose file is gone
    /// - `BackupInFlight` if a backup or restore is running, or the vault
    ///   cannot be quiesced right now (nothing is changed; retry later)
    /// - `RestoreFailed` if the backup fails its integrity check (nothing is
    ///   changed) or the index rebuild fails after the swap (restored data is
    ///   live)
    pub fn restore(&self, vault: &Vault, name: &str) -> VaultResult<RestoreReport> {
        if !is_valid_name(name) {
            return Err(VaultError::validation(format!("invalid backup name: {name:?}")));
        }
        let _guard = InFlight::acquire(&self.in_flight)?;
        let dir = self.dir();

        let manifest = Manifest::load(&dir)?;
        let source = backup_path(&dir, name);
        if manifest.get(name).is_none() || !source.is_file() {
            return Err(VaultError::not_found("backup", name));
        }

        let live = vault.db_path();
        let staged = live.with_extension(format!("db.{RESTORE_SUFFIX}"));
        info!(%name, "restore started");

        if let Err(e) = stage(&source, &staged) {
            remove_if_exists(&staged);
            warn!(%name, error = %e, "restore aborted before swap");
            return Err(e);
        }

        let swapped = vault.replace_file(|live| {
            fs::rename(&staged, live)?;
            if let Some(parent) = live.parent() {
                sync_directory(parent)?;
            }
            Ok(())
        });

        match swapped {
            Ok(indexed) => {
                info!(%name, indexed, "restore completed");
                Ok(RestoreReport {
                    name: name.to_string(),
                    indexed,
                })
            }
            Err(e) => {
                remove_if_exists(&staged);
                warn!(%name, error = %e, "restore did not complete");
                Err(e)
            }
        }
    }

    /// Runs a backup when one is due.
    ///
    /// Due means scheduled backups are enabled, the schedule is daily or
    /// weekly, the vault is entitled, and the newest backup is older than the
    /// schedule interval (or there is none). Returns the new entry, or `None`
    /// when nothing was due.
    pub fn run_scheduled(&self, vault: &Vault, now: Timestamp) -> VaultResult<Option<BackupEntry>> {
        let config = self.config();
        let Some(interval) = config.schedule.interval().filter(|_| config.enabled) else {
            return Ok(None);
        };
        if !vault.is_entitled() {
            debug!("scheduled backup skipped: not entitled");
            return Ok(None);
        }

        let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
        let due = match self.latest()? {
            Some(last) => now.saturating_sub(last.created_at) >= interval_ms,
            None => true,
        };
        if !due {
            return Ok(None);
        }
        self.run_backup(vault).map(Some)
    }
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager")
            .field("config", &*self.config.read())
            .field("in_flight", &self.is_in_flight())
            .finish_non_exhaustive()
    }
}

/// `backup-<ms>`, with `-<n>` appended until nothing on disk or in the
/// manifest uses the name.
fn unique_name(dir: &Path, manifest: &Manifest, now: Timestamp) -> String {
    let base = format!("backup-{now}");
    let taken = |name: &str| manifest.get(name).is_some() || backup_path(dir, name).exists();
    if !taken(&base) {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Copies `source` to `dest`, fsyncs, and checks the sizes match.
fn copy_verified(source: &Path, dest: &Path) -> VaultResult<u64> {
    let expected = fs::metadata(source)?.len();
    let mut reader = File::open(source)?;
    let mut writer = File::create(dest)?;
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    drop(writer);

    let written = fs::metadata(dest)?.len();
    if copied != expected || written != expected {
        return Err(VaultError::internal(format!(
            "backup size mismatch: expected {expected} bytes, wrote {written}"
        )));
    }
    Ok(written)
}

/// Copies the backup beside the live file and checks it is a sound database.
fn stage(source: &Path, staged: &Path) -> VaultResult<()> {
    copy_verified(source, staged)?;
    let conn = Connection::open_with_flags(
        staged,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| VaultError::restore_failed(format!("backup cannot be opened: {e}")))?;
    let verdict: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| VaultError::restore_failed(format!("backup is not a database: {e}")))?;
    conn.close()
        .map_err(|(_, e)| VaultError::restore_failed(format!("backup could not be closed: {e}")))?;
    if verdict != "ok" {
        return Err(VaultError::restore_failed(format!(
            "backup failed integrity check: {verdict}"
        )));
    }
    Ok(())
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed leftover file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove leftover file"),
    }
}
