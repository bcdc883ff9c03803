//! Data directory management.
//!
//! This module handles the file system layout of a vault:
//!
//! ```text
//! <data_dir>/
//! ├─ pinup.db          # Primary SQLite file
//! ├─ pinup.db-wal      # Write-ahead log (SQLite managed)
//! ├─ pinup.db-shm      # WAL index (SQLite managed)
//! ├─ pinup.lock        # Advisory lock shared by every open vault
//! ├─ settings.json     # User settings
//! ├─ license.json      # License record
//! └─ backups/          # Snapshot files + manifest.json
//! ```
//!
//! Every process with the vault open holds a shared lock on `pinup.lock`.
//! Restore needs the exclusive lock, so it is refused while any other process
//! (for example an agent-facing tool layer) has the vault open.

use crate::config::DB_FILE;
use crate::error::{VaultError, VaultResult};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Advisory lock file name.
pub const LOCK_FILE: &str = "pinup.lock";
/// Settings file name.
pub const SETTINGS_FILE: &str = "settings.json";
/// License record file name.
pub const LICENSE_FILE: &str = "license.json";

/// Holds the data directory path and its advisory lock.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    lock_file: File,
}

impl DataDir {
    /// Opens or creates a data directory and takes the shared lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process is restoring (holds the exclusive lock)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> VaultResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(VaultError::corrupt(format!(
                    "data directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(VaultError::corrupt(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if FileExt::try_lock_shared(&lock_file).is_err() {
            return Err(VaultError::backup_in_flight(
                "another process is restoring this vault",
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file,
        })
    }

    /// Returns the data directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the primary data file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.path.join(DB_FILE)
    }

    /// Returns the path to the settings file.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.path.join(SETTINGS_FILE)
    }

    /// Returns the path to the license record.
    #[must_use]
    pub fn license_path(&self) -> PathBuf {
        self.path.join(LICENSE_FILE)
    }

    /// Trades the shared lock for the exclusive one.
    ///
    /// On failure the shared lock is re-taken and `BackupInFlight` returned;
    /// the caller should retry later.
    pub fn lock_exclusive(&self) -> VaultResult<()> {
        FileExt::unlock(&self.lock_file)?;
        if FileExt::try_lock_exclusive(&self.lock_file).is_ok() {
            return Ok(());
        }
        FileExt::lock_shared(&self.lock_file)?;
        Err(VaultError::backup_in_flight(
            "another process has the vault open",
        ))
    }

    /// Returns to the shared lock after [`DataDir::lock_exclusive`].
    pub fn lock_shared(&self) -> VaultResult<()> {
        FileExt::unlock(&self.lock_file)?;
        FileExt::lock_shared(&self.lock_file)?;
        Ok(())
    }
}

/// Reads a JSON document, returning `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> VaultResult<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Writes a JSON document atomically.
///
/// Uses write-then-rename for crash safety:
/// 1. Write to a temporary file next to the target
/// 2. Sync the temporary file to disk
/// 3. Rename over the target
/// 4. Fsync the parent directory so the rename is durable
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> VaultResult<()> {
    let data = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    if let Some(parent) = path.parent() {
        sync_directory(parent)?;
    }
    Ok(())
}

/// Syncs a directory so that entry creation, rename and removal are durable.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> VaultResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// NTFS journaling covers directory metadata; nothing to do.
#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> VaultResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault");

        let dir = DataDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.db_path(), path.join("pinup.db"));
    }

    #[test]
    fn open_without_create_fails_for_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = DataDir::open(&temp.path().join("missing"), false);
        assert!(result.is_err());
    }

    #[test]
    fn exclusive_lock_refused_while_shared_elsewhere() {
        let temp = TempDir::new().unwrap();
        let first = DataDir::open(temp.path(), true).unwrap();
        let second = DataDir::open(temp.path(), true).unwrap();

        let err = first.lock_exclusive().unwrap_err();
        assert_eq!(err.code(), "BACKUP_IN_FLIGHT");

        drop(second);
        first.lock_exclusive().unwrap();
        first.lock_shared().unwrap();
    }

    #[test]
    fn json_roundtrip_is_atomic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        assert!(read_json::<Vec<u32>>(&path).unwrap().is_none());
        write_json_atomic(&path, &vec![1u32, 2, 3]).unwrap();
        assert_eq!(read_json::<Vec<u32>>(&path).unwrap(), Some(vec![1, 2, 3]));
        assert!(!temp.path().join("doc.json.tmp").exists());
    }
}
