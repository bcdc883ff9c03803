//! Persisted user settings.
//!
//! Settings live in `settings.json`. They are folded into the
//! [`VaultConfig`] before the vault is opened, and a patch is pushed into the
//! running components through their explicit setters.

use crate::backup::BackupManager;
use crate::config::{BackupSchedule, VaultConfig};
use crate::dir::{read_json, write_json_atomic};
use crate::error::VaultResult;
use crate::store::Vault;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Return the existing snippet when a body is saved twice.
    pub dedupe_enabled: bool,
    /// Run scheduled backups.
    pub backup_enabled: bool,
    /// Schedule for automatic backups.
    pub backup_schedule: BackupSchedule,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dedupe_enabled: false,
            backup_enabled: false,
            backup_schedule: BackupSchedule::Manual,
        }
    }
}

impl Settings {
    /// Applies these settings to a configuration before opening.
    #[must_use]
    pub fn configure(&self, mut config: VaultConfig) -> VaultConfig {
        config.dedupe_enabled = self.dedupe_enabled;
        config.backup.enabled = self.backup_enabled;
        config.backup.schedule = self.backup_schedule;
        config
    }
}

/// A partial settings update; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsPatch {
    /// New dedupe flag.
    pub dedupe_enabled: Option<bool>,
    /// New scheduled-backup flag.
    pub backup_enabled: Option<bool>,
    /// New backup schedule.
    pub backup_schedule: Option<BackupSchedule>,
}

impl SettingsPatch {
    /// True when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dedupe_enabled.is_none() && self.backup_enabled.is_none() && self.backup_schedule.is_none()
    }
}

/// Settings backed by `settings.json`.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsStore {
    /// Loads settings from `path`, defaults when the file is absent.
    pub fn load(path: &Path) -> VaultResult<Self> {
        let current = read_json(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            current: Mutex::new(current),
        })
    }

    /// Current settings.
    #[must_use]
    pub fn get(&self) -> Settings {
        self.current.lock().clone()
    }

    /// Persists a patch and pushes the result into the running vault and
    /// backup manager.
    pub fn patch(
        &self,
        patch: &SettingsPatch,
        vault: &Vault,
        backups: &BackupManager,
    ) -> VaultResult<Settings> {
        let mut current = self.current.lock();
        let mut next = current.clone();
        if let Some(v) = patch.dedupe_enabled {
            next.dedupe_enabled = v;
        }
        if let Some(v) = patch.backup_enabled {
            next.backup_enabled = v;
        }
        if let Some(v) = patch.backup_schedule {
            next.backup_schedule = v;
        }

        write_json_atomic(&self.path, &next)?;
        vault.set_dedupe_enabled(next.dedupe_enabled);
        backups.set_schedule(next.backup_enabled, next.backup_schedule);
        if *current != next {
            info!(
                dedupe_enabled = next.dedupe_enabled,
                backup_enabled = next.backup_enabled,
                backup_schedule = ?next.backup_schedule,
                "settings updated"
            );
        }
        *current = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::FixedEntitlement;
    use crate::types::NewSnippet;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::load(&temp.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"backup_schedule":"weekly"}"#).unwrap();
        assert_eq!(settings.backup_schedule, BackupSchedule::Weekly);
        assert!(!settings.dedupe_enabled);
    }

    #[test]
    fn unknown_patch_fields_rejected() {
        assert!(serde_json::from_str::<SettingsPatch>(r#"{"dedupe":true}"#).is_err());
        assert!(serde_json::from_str::<SettingsPatch>(r#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn configure_folds_into_config() {
        let settings = Settings {
            dedupe_enabled: true,
            backup_enabled: true,
            backup_schedule: BackupSchedule::Daily,
        };
        let config = settings.configure(VaultConfig::new("/tmp/v"));
        assert!(config.dedupe_enabled);
        assert!(config.backup.enabled);
        assert_eq!(config.backup.schedule, BackupSchedule::Daily);
    }

    #[test]
    fn patch_persists_and_applies() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        let config = VaultConfig::new(temp.path());
        let backups = BackupManager::new(config.backup.clone());
        let vault = Vault::open(config, Arc::new(FixedEntitlement(true))).unwrap();
        let store = SettingsStore::load(&path).unwrap();

        let patch = SettingsPatch {
            dedupe_enabled: Some(true),
            backup_schedule: Some(BackupSchedule::Weekly),
            backup_enabled: Some(true),
        };
        let updated = store.patch(&patch, &vault, &backups).unwrap();
        assert!(updated.dedupe_enabled);
        assert!(vault.dedupe_enabled());
        assert_eq!(backups.config().schedule, BackupSchedule::Weekly);

        let a = vault.create_snippet(NewSnippet::new("same body")).unwrap();
        let b = vault.create_snippet(NewSnippet::new("same body")).unwrap();
        assert_eq!(a.id, b.id);

        let reloaded = SettingsStore::load(&path).unwrap();
        assert_eq!(reloaded.get(), updated);
    }
}
