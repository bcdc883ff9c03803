//! JSON export/import and Markdown rendering.
//!
//! The JSON document (format version `"1"`) carries snippets, every tag and
//! collection, and the association rows of the exported snippets. Import
//! merges tags and collections into existing ones by case-insensitive name,
//! gives a fresh id to any snippet whose id is already taken, and writes the
//! search entries, all in one transaction.

use crate::error::{VaultError, VaultResult};
use crate::index::fts;
use crate::store::collections::{self, CollectionRow};
use crate::store::snippets::{self, content_hash, SNIPPET_COLUMNS};
use crate::store::{bump, tags, validate, Vault};
use crate::types::{NewSnippet, Snippet, Timestamp};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tracing::info;
use uuid::Uuid;

/// Export format version.
pub const EXPORT_VERSION: &str = "1";

/// Which snippets to export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "ids", rename_all = "snake_case")]
pub enum ExportScope {
    /// Every snippet.
    #[default]
    All,
    /// The listed snippet ids.
    Snippets(Vec<String>),
    /// Snippets in any of the listed collection ids.
    Collections(Vec<String>),
}

/// A snippet as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSnippet {
    /// Id in the exporting vault.
    pub id: String,
    /// Title.
    #[serde(default)]
    pub title: Option<String>,
    /// Content.
    pub body: String,
    /// Language hint.
    #[serde(default)]
    pub language: Option<String>,
    /// Origin label.
    #[serde(default)]
    pub source: Option<String>,
    /// Origin link.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Pinned flag.
    #[serde(default, with = "crate::types::flag")]
    pub pinned: bool,
    /// Archived flag.
    #[serde(default, with = "crate::types::flag")]
    pub archived: bool,
    /// Body hash; recomputed on import.
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// A tag as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTag {
    /// Id in the exporting vault.
    pub id: String,
    /// Name.
    pub name: String,
    /// Hex color.
    #[serde(default)]
    pub color: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// A collection as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCollection {
    /// Id in the exporting vault.
    pub id: String,
    /// Name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Icon.
    #[serde(default)]
    pub icon: Option<String>,
    /// Hex color.
    #[serde(default)]
    pub color: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Snippet to tag association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetTagLink {
    /// Snippet id.
    pub snippet_id: String,
    /// Tag id.
    pub tag_id: String,
}

/// Snippet to collection association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetCollectionLink {
    /// Snippet id.
    pub snippet_id: String,
    /// Collection id.
    pub collection_id: String,
}

/// A full export document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Format version, `"1"`.
    pub version: String,
    /// When the export was taken.
    #[serde(default)]
    pub exported_at: Timestamp,
    /// Snippets.
    #[serde(default)]
    pub snippets: Vec<ExportSnippet>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<ExportTag>,
    /// Collections.
    #[serde(default)]
    pub collections: Vec<ExportCollection>,
    /// Tag associations of the exported snippets.
    #[serde(default)]
    pub snippet_tags: Vec<SnippetTagLink>,
    /// Collection associations of the exported snippets.
    #[serde(default)]
    pub snippet_collections: Vec<SnippetCollectionLink>,
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Snippets inserted.
    pub snippets: usize,
    /// Tags created.
    pub tags_created: usize,
    /// Tags merged into an existing tag of the same name.
    pub tags_merged: usize,
    /// Collections created.
    pub collections_created: usize,
    /// Collections merged into an existing collection of the same name.
    pub collections_merged: usize,
    /// Snippets that got a new id because theirs was taken.
    pub reassigned_ids: usize,
    /// Associations dropped because one side was not in the document.
    pub skipped_links: usize,
}

impl Vault {
    /// Builds an export document.
    pub fn export_json(&self, scope: &ExportScope) -> VaultResult<ExportDocument> {
        let now = self.now();
        let doc = self.read(|conn| {
            let snippets = export_snippets(conn, scope)?;
            let ids: std::collections::HashSet<&str> =
                snippets.iter().map(|s| s.id.as_str()).collect();

            let tags = conn
                .prepare("SELECT id, name, color, created_at FROM tags ORDER BY name")?
                .query_map([], |row| {
                    Ok(ExportTag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        color: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let collections = conn
                .prepare(
                    "SELECT id, name, description, icon, color, created_at, updated_at \
                     FROM collections ORDER BY name_key",
                )?
                .query_map([], |row| {
                    Ok(ExportCollection {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        icon: row.get(3)?,
                        color: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let snippet_tags = conn
                .prepare("SELECT snippet_id, tag_id FROM snippet_tags ORDER BY snippet_id, tag_id")?
                .query_map([], |row| {
                    Ok(SnippetTagLink {
                        snippet_id: row.get(0)?,
                        tag_id: row.get(1)?,
                    })
                })?
                .filter(|link| {
                    link.as_ref()
                        .map_or(true, |l| ids.contains(l.snippet_id.as_str()))
                })
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let snippet_collections = conn
                .prepare(
                    "SELECT snippet_id, collection_id FROM snippet_collections \
                     ORDER BY snippet_id, collection_id",
                )?
                .query_map([], |row| {
                    Ok(SnippetCollectionLink {
                        snippet_id: row.get(0)?,
                        collection_id: row.get(1)?,
                    })
                })?
                .filter(|link| {
                    link.as_ref()
                        .map_or(true, |l| ids.contains(l.snippet_id.as_str()))
                })
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(ExportDocument {
                version: EXPORT_VERSION.to_string(),
                exported_at: now,
                snippets,
                tags,
                collections,
                snippet_tags,
                snippet_collections,
            })
        })?;

        info!(snippets = doc.snippets.len(), "export built");
        Ok(doc)
    }

    /// Imports an export document.
    ///
    /// # Errors
    ///
    /// - `LicenseRequired` when not entitled
    /// - `Validation` for an unknown format version or any invalid record;
    ///   nothing is written in that case
    pub fn import_json(&self, doc: &ExportDocument) -> VaultResult<ImportReport> {
        if !self.is_entitled() {
            return Err(VaultError::LicenseRequired { feature: "import" });
        }
        if doc.version != EXPORT_VERSION {
            return Err(VaultError::validation(format!(
                "unsupported export version {:?}",
                doc.version
            )));
        }
        let mut seen = HashSet::new();
        for record in doc.snippets.iter().filter(|r| !r.id.trim().is_empty()) {
            if !seen.insert(record.id.as_str()) {
                return Err(VaultError::validation(format!(
                    "duplicate snippet id {:?} in export document",
                    record.id
                )));
            }
        }
        let now = self.now();

        let report = self.write(|conn| {
            let mut report = ImportReport::default();

            let mut tag_ids: HashMap<&str, String> = HashMap::new();
            for tag in &doc.tags {
                let name = validate::tag_name(&tag.name)?;
                let id = match tags::find_id(conn, &name)? {
                    Some(id) => {
                        report.tags_merged += 1;
                        id
                    }
                    None => {
                        let id = Uuid::new_v4().to_string();
                        let color = validate::color(tag.color.as_deref()).unwrap_or(None);
                        tags::insert(conn, &id, &name, color.as_deref(), tag.created_at.unwrap_or(now))?;
                        report.tags_created += 1;
                        id
                    }
                };
                tag_ids.insert(tag.id.as_str(), id);
            }

            let mut collection_ids: HashMap<&str, String> = HashMap::new();
            for collection in &doc.collections {
                let name = validate::collection_name(&collection.name)?;
                let id = match collections::find_id(conn, &name)? {
                    Some(id) => {
                        report.collections_merged += 1;
                        id
                    }
                    None => {
                        let id = Uuid::new_v4().to_string();
                        let created_at = collection.created_at.unwrap_or(now);
                        let color = validate::color(collection.color.as_deref()).unwrap_or(None);
                        let description = validate::optional(
                            "description",
                            collection.description.as_deref(),
                            validate::MAX_DESCRIPTION_LEN,
                        )?;
                        let icon = validate::optional(
                            "icon",
                            collection.icon.as_deref(),
                            validate::MAX_ICON_LEN,
                        )?;
                        collections::insert(
                            conn,
                            &CollectionRow {
                                id: &id,
                                name: &name,
                                description: description.as_deref(),
                                icon: icon.as_deref(),
                                color: color.as_deref(),
                                created_at,
                                updated_at: bump(collection.updated_at.unwrap_or(created_at), created_at),
                            },
                        )?;
                        report.collections_created += 1;
                        id
                    }
                };
                collection_ids.insert(collection.id.as_str(), id);
            }

            let mut snippet_ids: HashMap<&str, String> = HashMap::new();
            let mut inserted = Vec::with_capacity(doc.snippets.len());
            for record in &doc.snippets {
                let content = self.check_content(&NewSnippet {
                    title: record.title.clone(),
                    body: record.body.clone(),
                    language: record.language.clone(),
                    source: record.source.clone(),
                    source_url: record.source_url.clone(),
                    ..NewSnippet::default()
                })?;

                let id = if record.id.trim().is_empty() || snippet_exists(conn, &record.id)? {
                    report.reassigned_ids += 1;
                    Uuid::new_v4().to_string()
                } else {
                    record.id.clone()
                };

                let created_at = record.created_at.unwrap_or(now);
                let snippet = Snippet {
                    id,
                    content_hash: content_hash(&content.body),
                    title: content.title,
                    body: content.body,
                    language: content.language,
                    source: content.source,
                    source_url: content.source_url,
                    pinned: record.pinned,
                    archived: record.archived,
                    tags: Vec::new(),
                    collections: Vec::new(),
                    created_at,
                    updated_at: bump(record.updated_at.unwrap_or(created_at), created_at),
                };
                snippets::insert_row(conn, &snippet)?;
                if !record.id.trim().is_empty() {
                    snippet_ids.insert(record.id.as_str(), snippet.id.clone());
                }
                inserted.push(snippet.id);
                report.snippets += 1;
            }

            for link in &doc.snippet_tags {
                match (snippet_ids.get(link.snippet_id.as_str()), tag_ids.get(link.tag_id.as_str())) {
                    (Some(snippet_id), Some(tag_id)) => {
                        conn.execute(
                            "INSERT OR IGNORE INTO snippet_tags (snippet_id, tag_id) VALUES (?1, ?2)",
                            params![snippet_id, tag_id],
                        )?;
                    }
                    _ => report.skipped_links += 1,
                }
            }
            for link in &doc.snippet_collections {
                match (
                    snippet_ids.get(link.snippet_id.as_str()),
                    collection_ids.get(link.collection_id.as_str()),
                ) {
                    (Some(snippet_id), Some(collection_id)) => {
                        conn.execute(
                            "INSERT OR IGNORE INTO snippet_collections (snippet_id, collection_id) \
                             VALUES (?1, ?2)",
                            params![snippet_id, collection_id],
                        )?;
                    }
                    _ => report.skipped_links += 1,
                }
            }

            for id in &inserted {
                fts::replace_shadow(conn, id)?;
            }
            Ok(report)
        })?;

        info!(
            snippets = report.snippets,
            tags_created = report.tags_created,
            collections_created = report.collections_created,
            reassigned_ids = report.reassigned_ids,
            "import finished"
        );
        Ok(report)
    }

    /// Renders one snippet as Markdown with a front-matter header.
    pub fn export_markdown(&self, id: &str) -> VaultResult<String> {
        Ok(render_markdown(&self.get_snippet(id)?))
    }
}

fn export_snippets(conn: &Connection, scope: &ExportScope) -> VaultResult<Vec<ExportSnippet>> {
    let (filter, ids) = match scope {
        ExportScope::All => (String::new(), &[] as &[String]),
        ExportScope::Snippets(ids) => (format!("WHERE s.id IN ({})", placeholders(ids.len())), &ids[..]),
        ExportScope::Collections(ids) => (
            format!(
                "WHERE EXISTS (SELECT 1 FROM snippet_collections sc \
                 WHERE sc.snippet_id = s.id AND sc.collection_id IN ({}))",
                placeholders(ids.len())
            ),
            &ids[..],
        ),
    };
    if filter.is_empty() != ids.is_empty() {
        // a scope naming no ids selects nothing
        return Ok(Vec::new());
    }

    let args: Vec<Value> = ids.iter().map(|id| Value::Text(id.clone())).collect();
    let rows = conn
        .prepare(&format!(
            "SELECT {SNIPPET_COLUMNS} FROM snippets s {filter} ORDER BY s.created_at, s.id"
        ))?
        .query_map(params_from_iter(args), snippets::snippet_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .map(|s| ExportSnippet {
            id: s.id,
            title: Some(s.title),
            body: s.body,
            language: s.language,
            source: s.source,
            source_url: s.source_url,
            pinned: s.pinned,
            archived: s.archived,
            content_hash: Some(s.content_hash),
            created_at: Some(s.created_at),
            updated_at: Some(s.updated_at),
        })
        .collect())
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn snippet_exists(conn: &Connection, id: &str) -> VaultResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM snippets WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Markdown for one snippet.
#[must_use]
pub fn render_markdown(snippet: &Snippet) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    let _ = writeln!(out, "id: {}", snippet.id);
    let _ = writeln!(out, "title: \"{}\"", snippet.title.replace('\\', "\\\\").replace('"', "\\\""));
    let _ = writeln!(out, "created_at: {}", snippet.created_at);
    let _ = writeln!(out, "updated_at: {}", snippet.updated_at);
    if let Some(source) = &snippet.source {
        let _ = writeln!(out, "source: {source}");
    }
    if let Some(url) = &snippet.source_url {
        let _ = writeln!(out, "source_url: {url}");
    }
    if let Some(language) = &snippet.language {
        let _ = writeln!(out, "language: {language}");
    }
    if !snippet.tags.is_empty() {
        let _ = writeln!(out, "tags: [{}]", snippet.tags.join(", "));
    }
    if !snippet.collections.is_empty() {
        let _ = writeln!(out, "collections: [{}]", snippet.collections.join(", "));
    }
    out.push_str("---\n\n");
    out.push_str(&snippet.body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::VaultConfig;
    use crate::index::SearchOptions;
    use crate::license::FixedEntitlement;
    use crate::types::NewCollection;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open(temp: &TempDir, entitled: bool) -> Vault {
        Vault::open_with_clock(
            VaultConfig::new(temp.path()),
            Arc::new(FixedEntitlement(entitled)),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
        .unwrap()
    }

    fn seed(vault: &Vault) -> (Snippet, Snippet) {
        let a = vault
            .create_snippet(
                NewSnippet::new("fn main() {}")
                    .title("Hello")
                    .tag("rust")
                    .collection("Work"),
            )
            .unwrap();
        let b = vault
            .create_snippet(NewSnippet::new("print('hi')").tag("python"))
            .unwrap();
        (a, b)
    }

    #[test]
    fn export_contains_everything() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        seed(&vault);

        let doc = vault.export_json(&ExportScope::All).unwrap();
        assert_eq!(doc.version, "1");
        assert_eq!(doc.snippets.len(), 2);
        assert_eq!(doc.tags.len(), 2);
        assert_eq!(doc.collections.len(), 1);
        assert_eq!(doc.snippet_tags.len(), 2);
        assert_eq!(doc.snippet_collections.len(), 1);
    }

    #[test]
    fn scoped_export_filters_links() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        let (a, _) = seed(&vault);

        let doc = vault.export_json(&ExportScope::Snippets(vec![a.id.clone()])).unwrap();
        assert_eq!(doc.snippets.len(), 1);
        assert_eq!(doc.snippet_tags.len(), 1);
        assert_eq!(doc.snippet_tags[0].snippet_id, a.id);

        let work = vault.list_collections(10, 0).unwrap().items[0].id.clone();
        let by_collection = vault.export_json(&ExportScope::Collections(vec![work])).unwrap();
        assert_eq!(by_collection.snippets.len(), 1);

        assert!(vault
            .export_json(&ExportScope::Snippets(Vec::new()))
            .unwrap()
            .snippets
            .is_empty());
    }

    #[test]
    fn import_into_fresh_vault_round_trips() {
        let source_dir = TempDir::new().unwrap();
        let source = open(&source_dir, true);
        let (a, _) = seed(&source);
        let doc = source.export_json(&ExportScope::All).unwrap();
        let json = serde_json::to_string(&doc).unwrap();

        let target_dir = TempDir::new().unwrap();
        let target = open(&target_dir, true);
        let parsed: ExportDocument = serde_json::from_str(&json).unwrap();
        let report = target.import_json(&parsed).unwrap();

        assert_eq!(report.snippets, 2);
        assert_eq!(report.tags_created, 2);
        assert_eq!(report.reassigned_ids, 0);
        let copy = target.get_snippet(&a.id).unwrap();
        assert_eq!(copy.title, "Hello");
        assert_eq!(copy.tags, vec!["rust"]);
        assert_eq!(copy.collections, vec!["Work"]);
        assert_eq!(copy.content_hash, a.content_hash);
        assert_eq!(target.shadow_count().unwrap(), 2);
        assert_eq!(target.search("main", &SearchOptions::default()).unwrap().total, 1);
    }

    #[test]
    fn import_merges_names_and_reassigns_taken_ids() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        seed(&vault);
        vault
            .create_collection(NewCollection {
                name: "Archive".into(),
                ..NewCollection::default()
            })
            .unwrap();
        let doc = vault.export_json(&ExportScope::All).unwrap();

        let report = vault.import_json(&doc).unwrap();
        assert_eq!(report.snippets, 2);
        assert_eq!(report.reassigned_ids, 2);
        assert_eq!(report.tags_merged, 2);
        assert_eq!(report.collections_merged, 2);
        assert_eq!(report.tags_created, 0);

        assert_eq!(vault.snippet_count().unwrap(), 4);
        assert_eq!(vault.shadow_count().unwrap(), 4);
        let rust = vault.list_tags(10, 0).unwrap();
        assert!(rust.items.iter().all(|t| t.snippet_count == 2));
    }

    #[test]
    fn import_requires_entitlement() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, false);
        let doc = ExportDocument {
            version: "1".into(),
            exported_at: 0,
            snippets: Vec::new(),
            tags: Vec::new(),
            collections: Vec::new(),
            snippet_tags: Vec::new(),
            snippet_collections: Vec::new(),
        };
        assert_eq!(vault.import_json(&doc).unwrap_err().code(), "LICENSE_REQUIRED");
    }

    #[test]
    fn invalid_record_rolls_back_whole_import() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        let doc: ExportDocument = serde_json::from_value(serde_json::json!({
            "version": "1",
            "tags": [{"id": "t1", "name": "fresh"}],
            "snippets": [
                {"id": "s1", "body": "good"},
                {"id": "s2", "body": "   "}
            ]
        }))
        .unwrap();

        assert_eq!(vault.import_json(&doc).unwrap_err().code(), "VALIDATION_ERROR");
        assert_eq!(vault.snippet_count().unwrap(), 0);
        assert!(vault.list_tags(10, 0).unwrap().items.is_empty());
    }

    #[test]
    fn unknown_version_rejected() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        let doc: ExportDocument = serde_json::from_value(serde_json::json!({"version": "2"})).unwrap();
        assert_eq!(vault.import_json(&doc).unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn dangling_links_are_skipped() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        let doc: ExportDocument = serde_json::from_value(serde_json::json!({
            "version": "1",
            "snippets": [{"id": "s1", "body": "x", "pinned": 1}],
            "snippet_tags": [{"snippet_id": "s1", "tag_id": "missing"}]
        }))
        .unwrap();
        let report = vault.import_json(&doc).unwrap();
        assert_eq!(report.skipped_links, 1);
        assert!(vault.get_snippet("s1").unwrap().pinned);
    }

    #[test]
    fn duplicate_record_ids_are_rejected() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        let doc: ExportDocument = serde_json::from_value(serde_json::json!({
            "version": "1",
            "snippets": [
                {"id": "x", "body": "alphaunique"},
                {"id": "x", "body": "betaunique"}
            ]
        }))
        .unwrap();
        let err = vault.import_json(&doc).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(vault.snippet_count().unwrap(), 0);
        assert_eq!(vault.shadow_count().unwrap(), 0);
    }

    #[test]
    fn records_without_ids_are_all_indexed() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        let doc: ExportDocument = serde_json::from_value(serde_json::json!({
            "version": "1",
            "snippets": [
                {"id": "", "body": "alphaunique"},
                {"id": " ", "body": "betaunique"}
            ]
        }))
        .unwrap();
        let report = vault.import_json(&doc).unwrap();
        assert_eq!(report.snippets, 2);
        assert_eq!(report.reassigned_ids, 2);
        assert_eq!(vault.snippet_count().unwrap(), vault.shadow_count().unwrap());
        for word in ["alphaunique", "betaunique"] {
            let page = vault.search(word, &SearchOptions::default()).unwrap();
            assert_eq!(page.total, 1, "{word} not searchable");
        }
    }

    #[test]
    fn markdown_front_matter() {
        let temp = TempDir::new().unwrap();
        let vault = open(&temp, true);
        let s = vault
            .create_snippet(
                NewSnippet::new("body text")
                    .title("Say \"hi\"")
                    .language("rust")
                    .tag("b")
                    .tag("a"),
            )
            .unwrap();

        let md = vault.export_markdown(&s.id).unwrap();
        assert!(md.starts_with("---\n"));
        assert!(md.contains("title: \"Say \\\"hi\\\"\"\n"));
        assert!(md.contains("language: rust\n"));
        assert!(md.contains("tags: [a, b]\n"));
        assert!(md.ends_with("---\n\nbody text"));
        assert!(!md.contains("source:"));
    }
}
