//! # Pin-Up Core
//!
//! Storage, search, backup and entitlement core of the Pin-Up snippet vault.
//!
//! This crate provides:
//! - A single-file SQLite vault of snippets, tags and collections
//! - An FTS5 search index kept in the same transaction as every mutation
//! - Crash-consistent file backups and exclusive restore
//! - A license state machine that behaves correctly offline
//! - Sliding-window admission control for request surfaces
//!
//! # Usage
//!
//! ```rust,ignore
//! use pinup_core::{FixedEntitlement, NewSnippet, SearchOptions, Vault, VaultConfig};
//! use std::sync::Arc;
//!
//! let vault = Vault::open(VaultConfig::new("/path/to/data"), Arc::new(FixedEntitlement(true)))?;
//! vault.create_snippet(NewSnippet::new("cleanup runs on unmount").tag("react"))?;
//!
//! let hits = vault.search("unmount tag:react", &SearchOptions::default())?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used)]

pub mod admission;
pub mod backup;
pub mod clock;
pub mod config;
pub mod dir;
pub mod error;
pub mod export;
pub mod index;
pub mod license;
pub mod manifest;
pub mod settings;
pub mod stats;
pub mod store;
pub mod types;

/// Crate version, recorded in backup manifests and health output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use admission::{Admission, AdmissionControl};
pub use backup::BackupManager;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdmissionConfig, BackupConfig, BackupSchedule, LicenseConfig, VaultConfig};
pub use error::{VaultError, VaultResult};
pub use export::{ExportDocument, ExportScope, ImportReport};
pub use index::{SearchHit, SearchOptions};
pub use license::{
    Entitlement, FixedEntitlement, LicenseEngine, LicenseState, LicenseStatus, LicenseValidator,
    OfflineValidator, ValidationOutcome,
};
pub use manifest::BackupEntry;
pub use settings::{Settings, SettingsPatch, SettingsStore};
pub use stats::VaultStats;
pub use store::Vault;
pub use types::{
    Collection, CollectionPatch, NewCollection, NewSnippet, NewTag, Page, Snippet, SnippetFilter,
    SnippetPatch, Tag, TagPatch, Timestamp,
};
