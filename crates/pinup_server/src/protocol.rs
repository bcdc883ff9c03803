//! Request and response messages.
//!
//! Requests are JSON objects tagged by `op`:
//!
//! ```json
//! {"op": "create_snippet", "body": "useEffect cleanup", "tags": ["react"]}
//! {"op": "search", "query": "cleanup tag:react", "limit": 20}
//! {"op": "restore_backup", "name": "backup-1700000000000"}
//! ```
//!
//! Every response is `{"ok": true, "result": ...}` or
//! `{"ok": false, "error": {"code": ..., "message": ...}}`.

use crate::error::ApiError;
use pinup_core::backup::RestoreReport;
use pinup_core::export::ExportDocument;
use pinup_core::stats::VaultStats;
use pinup_core::{
    BackupEntry, Collection, CollectionPatch, ExportScope, ImportReport, LicenseState,
    NewCollection, NewSnippet, NewTag, Page, SearchHit, Settings, SettingsPatch, Snippet,
    SnippetFilter, SnippetPatch, Tag, TagPatch,
};
use serde::{Deserialize, Serialize};

/// Page size when a request names none.
pub const DEFAULT_LIMIT: u32 = 50;

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// A request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// List snippets.
    ListSnippets {
        /// Filters.
        #[serde(default)]
        filter: SnippetFilter,
        /// Page size.
        #[serde(default = "default_limit")]
        limit: u32,
        /// Rows to skip.
        #[serde(default)]
        offset: u32,
    },
    /// Fetch one snippet.
    GetSnippet {
        /// Snippet id.
        id: String,
    },
    /// Create a snippet.
    CreateSnippet(NewSnippet),
    /// Update a snippet.
    UpdateSnippet {
        /// Snippet id.
        id: String,
        /// Fields to change.
        patch: SnippetPatch,
    },
    /// Delete a snippet.
    DeleteSnippet {
        /// Snippet id.
        id: String,
    },
    /// Pin a snippet.
    Pin {
        /// Snippet id.
        id: String,
    },
    /// Unpin a snippet.
    Unpin {
        /// Snippet id.
        id: String,
    },
    /// Archive a snippet.
    Archive {
        /// Snippet id.
        id: String,
    },
    /// Unarchive a snippet.
    Unarchive {
        /// Snippet id.
        id: String,
    },
    /// List tags.
    ListTags {
        /// Page size.
        #[serde(default = "default_limit")]
        limit: u32,
        /// Rows to skip.
        #[serde(default)]
        offset: u32,
    },
    /// Fetch one tag.
    GetTag {
        /// Tag id.
        id: String,
    },
    /// Create a tag.
    CreateTag(NewTag),
    /// Update a tag.
    UpdateTag {
        /// Tag id.
        id: String,
        /// Fields to change.
        patch: TagPatch,
    },
    /// Delete a tag.
    DeleteTag {
        /// Tag id.
        id: String,
    },
    /// List collections.
    ListCollections {
        /// Page size.
        #[serde(default = "default_limit")]
        limit: u32,
        /// Rows to skip.
        #[serde(default)]
        offset: u32,
    },
    /// Fetch one collection.
    GetCollection {
        /// Collection id.
        id: String,
    },
    /// Create a collection.
    CreateCollection(NewCollection),
    /// Update a collection.
    UpdateCollection {
        /// Collection id.
        id: String,
        /// Fields to change.
        patch: CollectionPatch,
    },
    /// Delete a collection.
    DeleteCollection {
        /// Collection id.
        id: String,
    },
    /// Search with the query DSL.
    Search {
        /// Query text.
        #[serde(default)]
        query: String,
        /// Include archived snippets.
        #[serde(default)]
        include_archived: bool,
        /// Page size.
        #[serde(default = "default_limit")]
        limit: u32,
        /// Rows to skip.
        #[serde(default)]
        offset: u32,
    },
    /// Rebuild the search index.
    RebuildIndex,
    /// Take a backup now.
    RunBackup,
    /// List backups.
    ListBackups,
    /// Restore a backup.
    RestoreBackup {
        /// Backup name.
        name: String,
    },
    /// Current license state (re-validates when due).
    LicenseStatus,
    /// Activate a license key.
    ActivateLicense {
        /// License key.
        key: String,
    },
    /// Remove the license.
    DeactivateLicense,
    /// Read settings.
    GetSettings,
    /// Change settings.
    PatchSettings {
        /// Fields to change.
        patch: SettingsPatch,
    },
    /// Vault statistics.
    Stats,
    /// Export as JSON.
    Export {
        /// What to export.
        #[serde(default)]
        scope: ExportScope,
    },
    /// Export one snippet as Markdown.
    ExportMarkdown {
        /// Snippet id.
        id: String,
    },
    /// Import a JSON export.
    Import {
        /// The export document.
        document: ExportDocument,
    },
    /// Liveness and index consistency.
    Health,
}

impl Request {
    /// The `op` name, for logging.
    pub fn op(&self) -> &'static str {
        match self {
            Self::ListSnippets { .. } => "list_snippets",
            Self::GetSnippet { .. } => "get_snippet",
            Self::CreateSnippet(_) => "create_snippet",
            Self::UpdateSnippet { .. } => "update_snippet",
            Self::DeleteSnippet { .. } => "delete_snippet",
            Self::Pin { .. } => "pin",
            Self::Unpin { .. } => "unpin",
            Self::Archive { .. } => "archive",
            Self::Unarchive { .. } => "unarchive",
            Self::ListTags { .. } => "list_tags",
            Self::GetTag { .. } => "get_tag",
            Self::CreateTag(_) => "create_tag",
            Self::UpdateTag { .. } => "update_tag",
            Self::DeleteTag { .. } => "delete_tag",
            Self::ListCollections { .. } => "list_collections",
            Self::GetCollection { .. } => "get_collection",
            Self::CreateCollection(_) => "create_collection",
            Self::UpdateCollection { .. } => "update_collection",
            Self::DeleteCollection { .. } => "delete_collection",
            Self::Search { .. } => "search",
            Self::RebuildIndex => "rebuild_index",
            Self::RunBackup => "run_backup",
            Self::ListBackups => "list_backups",
            Self::RestoreBackup { .. } => "restore_backup",
            Self::LicenseStatus => "license_status",
            Self::ActivateLicense { .. } => "activate_license",
            Self::DeactivateLicense => "deactivate_license",
            Self::GetSettings => "get_settings",
            Self::PatchSettings { .. } => "patch_settings",
            Self::Stats => "stats",
            Self::Export { .. } => "export",
            Self::ExportMarkdown { .. } => "export_markdown",
            Self::Import { .. } => "import",
            Self::Health => "health",
        }
    }
}

/// A request with an optional client key, as read from a transport.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Client identity for admission control.
    #[serde(default)]
    pub client: Option<String>,
    /// The request itself.
    #[serde(flatten)]
    pub request: Request,
}

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Always `ok` when the vault answered.
    pub status: String,
    /// Software version.
    pub version: String,
    /// Snippet rows.
    pub snippets: u64,
    /// Search shadow rows.
    pub shadow_rows: u64,
    /// Whether the two counts agree.
    pub index_in_sync: bool,
}

/// Successful result payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// One snippet.
    Snippet(Snippet),
    /// A page of snippets.
    Snippets(Page<Snippet>),
    /// One tag.
    Tag(Tag),
    /// A page of tags.
    Tags(Page<Tag>),
    /// One collection.
    Collection(Collection),
    /// A page of collections.
    Collections(Page<Collection>),
    /// Search results.
    Hits(Page<SearchHit>),
    /// A deletion happened.
    Deleted {
        /// Always true.
        deleted: bool,
    },
    /// Index rebuilt.
    Reindexed {
        /// Shadow rows written.
        indexed: usize,
    },
    /// A backup entry.
    Backup(BackupEntry),
    /// Backup entries, newest first.
    Backups(Vec<BackupEntry>),
    /// A restore finished.
    Restored(RestoreReport),
    /// License state.
    License(LicenseState),
    /// Settings.
    Settings(Settings),
    /// Statistics.
    Stats(Box<VaultStats>),
    /// An export document.
    Export(Box<ExportDocument>),
    /// Markdown text.
    Markdown {
        /// Rendered document.
        markdown: String,
    },
    /// Import summary.
    Imported(ImportReport),
    /// Liveness.
    Health(Health),
}

/// A response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Reply>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl Response {
    /// A successful response.
    pub fn success(result: Reply) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// A failed response.
    pub fn failure(error: ApiError) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error),
        }
    }

    /// Error code, if failed.
    pub fn code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
