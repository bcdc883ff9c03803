//! Backup manifest.
//!
//! `manifest.json` in the backups directory lists every completed backup.
//! An entry is appended only after its file has been copied, size-checked
//! and renamed into place, so every listed backup is complete.

use crate::dir::{read_json, write_json_atomic};
use crate::error::VaultResult;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest file name inside the backups directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Extension of backup files.
pub const BACKUP_EXT: &str = "db";

const MAX_NAME_LEN: usize = 128;

/// One completed backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Backup name, also the file stem.
    pub name: String,
    /// When the backup was taken.
    pub created_at: Timestamp,
    /// Size of the backup file in bytes.
    pub size_bytes: u64,
    /// Version of the software that wrote it.
    pub app_version: String,
}

/// Manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version.
    pub version: u32,
    /// Backups in the order they were taken.
    pub backups: Vec<BackupEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            backups: Vec::new(),
        }
    }
}

impl Manifest {
    /// Loads the manifest from `dir`, empty when none exists yet.
    pub fn load(dir: &Path) -> VaultResult<Self> {
        Ok(read_json(&dir.join(MANIFEST_FILE))?.unwrap_or_default())
    }

    /// Atomically writes the manifest into `dir`.
    pub fn save(&self, dir: &Path) -> VaultResult<()> {
        write_json_atomic(&dir.join(MANIFEST_FILE), self)
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BackupEntry> {
        self.backups.iter().find(|e| e.name == name)
    }

    /// Entries newest first. Equal timestamps keep reverse append order.
    #[must_use]
    pub fn newest_first(&self) -> Vec<BackupEntry> {
        let mut entries: Vec<BackupEntry> = self.backups.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// The most recent entry; the last appended wins a timestamp tie.
    #[must_use]
    pub fn latest(&self) -> Option<&BackupEntry> {
        self.backups.iter().max_by_key(|e| e.created_at)
    }
}

/// Path of the backup file for `name`.
#[must_use]
pub fn backup_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{BACKUP_EXT}"))
}

/// A name is a non-empty run of ASCII letters, digits, `-` and `_`.
///
/// Anything else (separators, `..`, drive prefixes) is refused so a name can
/// never point outside the backups directory.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
