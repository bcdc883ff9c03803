//! Vault configuration.
//!
//! Every component receives its configuration as an explicit value at
//! construction. Nothing here is read from process-wide mutable state.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the primary SQLite file inside the data directory.
pub const DB_FILE: &str = "pinup.db";
/// Name of the backups directory inside the data directory.
pub const BACKUPS_DIR: &str = "backups";

/// Configuration for opening a vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Directory holding the primary file, settings, license and backups.
    pub data_dir: PathBuf,

    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether creating a snippet whose body already exists returns the existing one.
    pub dedupe_enabled: bool,

    /// Live snippet ceiling applied while not entitled.
    pub free_tier_limit: u32,

    /// Maximum title length in characters.
    pub max_title_len: usize,

    /// Maximum body length in bytes.
    pub max_body_len: usize,

    /// How long SQLite waits on a locked database before giving up.
    pub busy_timeout: Duration,

    /// Backup settings.
    pub backup: BackupConfig,

    /// License settings.
    pub license: LicenseConfig,
}

impl VaultConfig {
    /// Creates a configuration rooted at `data_dir` with default values.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            backup: BackupConfig::new(data_dir.join(BACKUPS_DIR)),
            data_dir,
            create_if_missing: true,
            dedupe_enabled: false,
            free_tier_limit: 50,
            max_title_len: 255,
            max_body_len: 1_000_000,
            busy_timeout: Duration::from_millis(5_000),
            license: LicenseConfig::default(),
        }
    }

    /// Path of the primary data file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Enables or disables content deduplication.
    #[must_use]
    pub fn dedupe_enabled(mut self, value: bool) -> Self {
        self.dedupe_enabled = value;
        self
    }

    /// Sets the free-tier snippet ceiling.
    #[must_use]
    pub fn free_tier_limit(mut self, limit: u32) -> Self {
        self.free_tier_limit = limit;
        self
    }

    /// Sets the backup configuration.
    #[must_use]
    pub fn backup(mut self, backup: BackupConfig) -> Self {
        self.backup = backup;
        self
    }

    /// Sets the license configuration.
    #[must_use]
    pub fn license(mut self, license: LicenseConfig) -> Self {
        self.license = license;
        self
    }
}

/// How often scheduled backups run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupSchedule {
    /// Only on explicit request.
    Manual,
    /// Once per day.
    Daily,
    /// Once per week.
    Weekly,
}

impl BackupSchedule {
    /// Interval between scheduled backups, `None` for manual.
    #[must_use]
    pub fn interval(self) -> Option<Duration> {
        match self {
            Self::Manual => None,
            Self::Daily => Some(Duration::from_secs(24 * 60 * 60)),
            Self::Weekly => Some(Duration::from_secs(7 * 24 * 60 * 60)),
        }
    }
}

impl Default for BackupSchedule {
    fn default() -> Self {
        Self::Manual
    }
}

/// Configuration for the backup manager.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Directory where snapshot files and the manifest live.
    pub dir: PathBuf,
    /// Whether scheduled backups run.
    pub enabled: bool,
    /// Schedule for automatic backups.
    pub schedule: BackupSchedule,
    /// Version string recorded in each manifest entry.
    pub app_version: String,
}

impl BackupConfig {
    /// Creates a backup configuration writing to `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: false,
            schedule: BackupSchedule::Manual,
            app_version: crate::VERSION.to_string(),
        }
    }

    /// Sets the backup directory.
    #[must_use]
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = dir.to_path_buf();
        self
    }

    /// Enables scheduled backups on the given schedule.
    #[must_use]
    pub fn scheduled(mut self, schedule: BackupSchedule) -> Self {
        self.enabled = schedule != BackupSchedule::Manual;
        self.schedule = schedule;
        self
    }
}

/// Configuration for the license engine.
#[derive(Debug, Clone)]
pub struct LicenseConfig {
    /// Trial length granted on first run.
    pub trial_days: u32,
    /// How long a previously validated license keeps working offline.
    pub offline_window: Duration,
    /// Minimum interval between re-validation attempts.
    pub revalidate_interval: Duration,
    /// Upper bound on a single validation call.
    pub validation_timeout: Duration,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            trial_days: 14,
            offline_window: Duration::from_secs(7 * 24 * 60 * 60),
            revalidate_interval: Duration::from_secs(24 * 60 * 60),
            validation_timeout: Duration::from_secs(10),
        }
    }
}

impl LicenseConfig {
    /// Sets the trial length in days.
    #[must_use]
    pub fn trial_days(mut self, days: u32) -> Self {
        self.trial_days = days;
        self
    }

    /// Sets the validation timeout.
    #[must_use]
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }
}

/// Configuration for admission control.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Whether admission control is active.
    pub enabled: bool,
    /// Requests admitted per key within one window.
    pub max_requests: u32,
    /// Length of the trailing window.
    pub window: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl AdmissionConfig {
    /// Creates a configuration admitting `max_requests` per `window`.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            enabled: true,
            max_requests,
            window,
        }
    }

    /// Disables admission control.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
