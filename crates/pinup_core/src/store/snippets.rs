//! Snippet records.

use super::{bump, clamp_limit, collections, tags, validate, Vault};
use crate::error::{VaultError, VaultResult};
use crate::index::fts;
use crate::types::{NewSnippet, Page, Snippet, SnippetFilter, SnippetPatch};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

/// Length of a title derived from the body.
pub const DERIVED_TITLE_LEN: usize = 80;

pub(crate) const SNIPPET_COLUMNS: &str = "s.id, s.title, s.body, s.language, s.source, \
     s.source_url, s.pinned, s.archived, s.content_hash, s.created_at, s.updated_at";

/// SHA-256 of the body, lowercase hex.
#[must_use]
pub fn content_hash(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// First non-blank line of the body, cut to [`DERIVED_TITLE_LEN`] characters.
#[must_use]
pub fn derive_title(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(DERIVED_TITLE_LEN).collect())
        .unwrap_or_default()
}

/// Maps a row selected with [`SNIPPET_COLUMNS`]; tags and collections are left empty.
pub(crate) fn snippet_from_row(row: &Row<'_>) -> rusqlite::Result<Snippet> {
    Ok(Snippet {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        language: row.get(3)?,
        source: row.get(4)?,
        source_url: row.get(5)?,
        pinned: row.get::<_, i64>(6)? != 0,
        archived: row.get::<_, i64>(7)? != 0,
        content_hash: row.get(8)?,
        tags: Vec::new(),
        collections: Vec::new(),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Loads a snippet with its tag and collection names.
pub(crate) fn load(conn: &Connection, id: &str) -> VaultResult<Option<Snippet>> {
    let snippet = conn
        .query_row(
            &format!("SELECT {SNIPPET_COLUMNS} FROM snippets s WHERE s.id = ?1"),
            params![id],
            snippet_from_row,
        )
        .optional()?;
    snippet.map(|s| with_labels(conn, s)).transpose()
}

pub(crate) fn with_labels(conn: &Connection, mut snippet: Snippet) -> VaultResult<Snippet> {
    snippet.tags = tags::names_for_snippet(conn, &snippet.id)?;
    snippet.collections = collections::names_for_snippet(conn, &snippet.id)?;
    Ok(snippet)
}

fn require(conn: &Connection, id: &str) -> VaultResult<Snippet> {
    load(conn, id)?.ok_or_else(|| VaultError::not_found("snippet", id))
}

pub(crate) fn insert_row(conn: &Connection, s: &Snippet) -> VaultResult<()> {
    conn.execute(
        "INSERT INTO snippets (id, title, body, language, source, source_key, source_url, pinned, \
         archived, content_hash, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            s.id,
            s.title,
            s.body,
            s.language,
            s.source,
            s.source.as_deref().map(validate::fold),
            s.source_url,
            i64::from(s.pinned),
            i64::from(s.archived),
            s.content_hash,
            s.created_at,
            s.updated_at,
        ],
    )?;
    Ok(())
}

/// Validated snippet content.
pub(crate) struct Content {
    pub title: String,
    pub body: String,
    pub language: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
}

impl Vault {
    fn check_body(&self, body: &str) -> VaultResult<()> {
        if body.trim().is_empty() {
            return Err(VaultError::validation("body must not be empty"));
        }
        if body.len() > self.config.max_body_len {
            return Err(VaultError::validation(format!(
                "body must be at most {} bytes",
                self.config.max_body_len
            )));
        }
        Ok(())
    }

    fn check_title(&self, title: Option<&str>, body: &str) -> VaultResult<String> {
        match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) if title.chars().count() > self.config.max_title_len => {
                Err(VaultError::validation(format!(
                    "title must be at most {} characters",
                    self.config.max_title_len
                )))
            }
            Some(title) => Ok(title.to_string()),
            None => Ok(derive_title(body)),
        }
    }

    pub(crate) fn check_content(&self, input: &NewSnippet) -> VaultResult<Content> {
        self.check_body(&input.body)?;
        Ok(Content {
            title: self.check_title(input.title.as_deref(), &input.body)?,
            body: input.body.clone(),
            language: validate::optional(
                "language",
                input.language.as_deref(),
                validate::MAX_LANGUAGE_LEN,
            )?,
            source: validate::optional("source", input.source.as_deref(), validate::MAX_SOURCE_LEN)?,
            source_url: validate::optional(
                "source_url",
                input.source_url.as_deref(),
                validate::MAX_SOURCE_URL_LEN,
            )?,
        })
    }

    /// Creates a snippet with its tags, collections and search entry.
    ///
    /// Unknown tag and collection names are created. When the vault is not
    /// entitled and already holds `free_tier_limit` snippets the call fails
    /// with `QuotaExceeded`. With dedupe enabled, a body whose hash matches an
    /// existing snippet returns that snippet unchanged.
    pub fn create_snippet(&self, input: NewSnippet) -> VaultResult<Snippet> {
        let content = self.check_content(&input)?;
        let tag_names = validate::tag_names(&input.tags)?;
        let collection_names = validate::collection_names(&input.collections)?;
        let hash = content_hash(&content.body);
        let entitled = self.is_entitled();
        let dedupe = self.dedupe_enabled();
        let limit = self.config.free_tier_limit;
        let now = self.now();

        let (snippet, created) = self.write(|conn| {
            if !entitled {
                let live: i64 = conn.query_row("SELECT COUNT(*) FROM snippets", [], |row| row.get(0))?;
                if live >= i64::from(limit) {
                    return Err(VaultError::QuotaExceeded { limit });
                }
            }

            if dedupe {
                let existing: Option<String> = conn
                    .query_row(
                        "SELECT id FROM snippets WHERE content_hash = ?1 ORDER BY created_at LIMIT 1",
                        params![hash],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = existing {
                    return Ok((require(conn, &id)?, false));
                }
            }

            let snippet = Snippet {
                id: Uuid::new_v4().to_string(),
                title: content.title,
                body: content.body,
                language: content.language,
                source: content.source,
                source_url: content.source_url,
                pinned: false,
                archived: false,
                content_hash: hash,
                tags: Vec::new(),
                collections: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            insert_row(conn, &snippet)?;

            let tag_ids = tags::resolve_ids(conn, &tag_names, now)?;
            tags::set_for_snippet(conn, &snippet.id, &tag_ids)?;
            let collection_ids = collections::resolve_ids(conn, &collection_names, now)?;
            collections::set_for_snippet(conn, &snippet.id, &collection_ids)?;

            fts::replace_shadow(conn, &snippet.id)?;
            Ok((with_labels(conn, snippet)?, true))
        })?;

        if created {
            info!(snippet_id = %snippet.id, "snippet created");
        } else {
            debug!(snippet_id = %snippet.id, "duplicate body, returning existing snippet");
        }
        Ok(snippet)
    }

    /// Applies a partial update.
    ///
    /// Present tag/collection lists replace the whole set. The shadow row is
    /// replaced and `updated_at` bumped.
    pub fn update_snippet(&self, id: &str, patch: SnippetPatch) -> VaultResult<Snippet> {
        if let Some(body) = &patch.body {
            self.check_body(body)?;
        }
        let language = validate::optional(
            "language",
            patch.language.as_deref(),
            validate::MAX_LANGUAGE_LEN,
        )?;
        let source = validate::optional("source", patch.source.as_deref(), validate::MAX_SOURCE_LEN)?;
        let source_url = validate::optional(
            "source_url",
            patch.source_url.as_deref(),
            validate::MAX_SOURCE_URL_LEN,
        )?;
        let tag_names = patch.tags.as_deref().map(validate::tag_names).transpose()?;
        let collection_names = patch
            .collections
            .as_deref()
            .map(validate::collection_names)
            .transpose()?;
        let now = self.now();

        let snippet = self.write(|conn| {
            let mut snippet = require(conn, id)?;

            if let Some(body) = patch.body {
                snippet.content_hash = content_hash(&body);
                snippet.body = body;
            }
            if let Some(title) = patch.title.as_deref() {
                snippet.title = self.check_title(Some(title), &snippet.body)?;
            }
            // An empty string clears the field, absence leaves it alone.
            if patch.language.is_some() {
                snippet.language = language;
            }
            if patch.source.is_some() {
                snippet.source = source;
            }
            if patch.source_url.is_some() {
                snippet.source_url = source_url;
            }
            snippet.updated_at = bump(now, snippet.created_at);

            conn.execute(
                "UPDATE snippets SET title = ?1, body = ?2, language = ?3, source = ?4, \
                 source_key = ?5, source_url = ?6, content_hash = ?7, updated_at = ?8 WHERE id = ?9",
                params![
                    snippet.title,
                    snippet.body,
                    snippet.language,
                    snippet.source,
                    snippet.source.as_deref().map(validate::fold),
                    snippet.source_url,
                    snippet.content_hash,
                    snippet.updated_at,
                    id,
                ],
            )?;

            if let Some(names) = &tag_names {
                let ids = tags::resolve_ids(conn, names, now)?;
                tags::set_for_snippet(conn, id, &ids)?;
            }
            if let Some(names) = &collection_names {
                let ids = collections::resolve_ids(conn, names, now)?;
                collections::set_for_snippet(conn, id, &ids)?;
            }

            fts::replace_shadow(conn, id)?;
            require(conn, id)
        })?;
        debug!(snippet_id = %id, "snippet updated");
        Ok(snippet)
    }

    /// Deletes a snippet, its associations and its search entry.
    pub fn delete_snippet(&self, id: &str) -> VaultResult<()> {
        self.write(|conn| {
            conn.execute("DELETE FROM snippet_tags WHERE snippet_id = ?1", params![id])?;
            conn.execute(
                "DELETE FROM snippet_collections WHERE snippet_id = ?1",
                params![id],
            )?;
            fts::delete_shadow(conn, id)?;
            let removed = conn.execute("DELETE FROM snippets WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(VaultError::not_found("snippet", id));
            }
            Ok(())
        })?;
        info!(snippet_id = %id, "snippet deleted");
        Ok(())
    }

    /// Fetches a snippet with its tag and collection names.
    pub fn get_snippet(&self, id: &str) -> VaultResult<Snippet> {
        self.read(|conn| require(conn, id))
    }

    fn set_flag(&self, id: &str, column: Flag, value: bool) -> VaultResult<Snippet> {
        let now = self.now();
        let sql = match column {
            Flag::Pinned => "UPDATE snippets SET pinned = ?1, updated_at = max(?2, created_at) WHERE id = ?3",
            Flag::Archived => "UPDATE snippets SET archived = ?1, updated_at = max(?2, created_at) WHERE id = ?3",
        };
        self.write(|conn| {
            let changed = conn.execute(sql, params![i64::from(value), now, id])?;
            if changed == 0 {
                return Err(VaultError::not_found("snippet", id));
            }
            require(conn, id)
        })
    }

    /// Pins a snippet.
    pub fn pin(&self, id: &str) -> VaultResult<Snippet> {
        self.set_flag(id, Flag::Pinned, true)
    }

    /// Unpins a snippet.
    pub fn unpin(&self, id: &str) -> VaultResult<Snippet> {
        self.set_flag(id, Flag::Pinned, false)
    }

    /// Archives a snippet, hiding it from default search.
    pub fn archive(&self, id: &str) -> VaultResult<Snippet> {
        self.set_flag(id, Flag::Archived, true)
    }

    /// Restores an archived snippet.
    pub fn unarchive(&self, id: &str) -> VaultResult<Snippet> {
        self.set_flag(id, Flag::Archived, false)
    }

    /// Lists snippets newest-updated first.
    ///
    /// `total` counts every match regardless of `limit`/`offset`; `limit` is
    /// clamped to `1..=500`.
    pub fn list_snippets(
        &self,
        filter: &SnippetFilter,
        limit: u32,
        offset: u32,
    ) -> VaultResult<Page<Snippet>> {
        let limit = clamp_limit(limit);
        let tag = filter.tag.as_deref().map(validate::fold);
        let collection = filter.collection.as_deref().map(validate::fold);
        let pinned = filter.pinned.map(i64::from);
        let archived = filter.archived.map(i64::from);

        let filter_sql = "FROM snippets s WHERE \
             (?1 IS NULL OR EXISTS (SELECT 1 FROM snippet_tags st JOIN tags t ON t.id = st.tag_id \
                WHERE st.snippet_id = s.id AND t.name = ?1)) \
             AND (?2 IS NULL OR EXISTS (SELECT 1 FROM snippet_collections sc \
                JOIN collections c ON c.id = sc.collection_id \
                WHERE sc.snippet_id = s.id AND c.name_key = ?2)) \
             AND (?3 IS NULL OR s.pinned = ?3) \
             AND (?4 IS NULL OR s.archived = ?4)";

        self.read(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) {filter_sql}"),
                params![tag, collection, pinned, archived],
                |row| row.get(0),
            )?;
            let rows = conn
                .prepare(&format!(
                    "SELECT {SNIPPET_COLUMNS} {filter_sql} \
                     ORDER BY s.updated_at DESC, s.id LIMIT ?5 OFFSET ?6"
                ))?
                .query_map(
                    params![tag, collection, pinned, archived, limit, offset],
                    snippet_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let items = rows
                .into_iter()
                .map(|s| with_labels(conn, s))
                .collect::<VaultResult<Vec<_>>>()?;
            Ok(Page {
                items,
                total: u64::try_from(total).unwrap_or(0),
                limit,
                offset,
            })
        })
    }
}

#[derive(Clone, Copy)]
enum Flag {
    Pinned,
    Archived,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::VaultConfig;
    use crate::license::FixedEntitlement;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_with(config: VaultConfig, entitled: bool) -> (Vault, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let vault =
            Vault::open_with_clock(config, Arc::new(FixedEntitlement(entitled)), clock.clone())
                .unwrap();
        (vault, clock)
    }

    fn open(temp: &TempDir) -> (Vault, Arc<ManualClock>) {
        open_with(VaultConfig::new(temp.path()), true)
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn derived_title_uses_first_non_blank_line() {
        assert_eq!(derive_title("\n\n   \n  hello world \nsecond"), "hello world");
        assert_eq!(derive_title(&"x".repeat(200)).chars().count(), DERIVED_TITLE_LEN);
    }

    #[test]
    fn create_and_get() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);

        let created = vault
            .create_snippet(
                NewSnippet::new("useEffect(() => {}, [])")
                    .title("Effect")
                    .language("tsx")
                    .tag("React")
                    .tag("hooks")
                    .collection("Frontend"),
            )
            .unwrap();
        assert_eq!(created.title, "Effect");
        assert_eq!(created.tags, vec!["hooks", "react"]);
        assert_eq!(created.collections, vec!["Frontend"]);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = vault.get_snippet(&created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(vault.shadow_count().unwrap(), 1);
    }

    #[test]
    fn blank_body_is_rejected() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        let err = vault.create_snippet(NewSnippet::new("   \n\t")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(vault.snippet_count().unwrap(), 0);
    }

    #[test]
    fn oversized_fields_are_rejected() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);

        let long_title = NewSnippet::new("body").title("t".repeat(256));
        assert_eq!(vault.create_snippet(long_title).unwrap_err().code(), "VALIDATION_ERROR");

        let huge = NewSnippet::new("b".repeat(1_000_001));
        assert_eq!(vault.create_snippet(huge).unwrap_err().code(), "VALIDATION_ERROR");

        let language = NewSnippet::new("body").language("l".repeat(51));
        assert_eq!(vault.create_snippet(language).unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn quota_applies_only_without_entitlement() {
        let temp = TempDir::new().unwrap();
        let config = VaultConfig::new(temp.path()).free_tier_limit(2);
        let (vault, _) = open_with(config, false);

        vault.create_snippet(NewSnippet::new("one")).unwrap();
        vault.create_snippet(NewSnippet::new("two")).unwrap();
        let err = vault.create_snippet(NewSnippet::new("three")).unwrap_err();
        assert!(matches!(err, VaultError::QuotaExceeded { limit: 2 }));
        assert_eq!(vault.snippet_count().unwrap(), 2);
        assert_eq!(vault.shadow_count().unwrap(), 2);
    }

    #[test]
    fn dedupe_returns_existing() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        vault.set_dedupe_enabled(true);

        let first = vault.create_snippet(NewSnippet::new("same body")).unwrap();
        let second = vault
            .create_snippet(NewSnippet::new("same body").title("other"))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(vault.snippet_count().unwrap(), 1);

        vault.set_dedupe_enabled(false);
        let third = vault.create_snippet(NewSnippet::new("same body")).unwrap();
        assert_ne!(third.id, first.id);
        assert_eq!(vault.snippet_count().unwrap(), 2);
    }

    #[test]
    fn update_replaces_tag_set_and_bumps() {
        let temp = TempDir::new().unwrap();
        let (vault, clock) = open(&temp);

        let s = vault
            .create_snippet(NewSnippet::new("body").tag("a").tag("b"))
            .unwrap();
        clock.advance(1_000);
        let updated = vault
            .update_snippet(
                &s.id,
                SnippetPatch {
                    body: Some("new body".into()),
                    tags: Some(vec!["b".into(), "c".into()]),
                    ..SnippetPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.tags, vec!["b", "c"]);
        assert_eq!(updated.body, "new body");
        assert_eq!(updated.content_hash, content_hash("new body"));
        assert_eq!(updated.updated_at, s.created_at + 1_000);
        assert_eq!(vault.shadow_count().unwrap(), 1);
    }

    #[test]
    fn updated_at_never_precedes_created_at() {
        let temp = TempDir::new().unwrap();
        let (vault, clock) = open(&temp);

        let s = vault.create_snippet(NewSnippet::new("body")).unwrap();
        clock.advance(-60_000);
        let pinned = vault.pin(&s.id).unwrap();
        assert_eq!(pinned.updated_at, s.created_at);
        let updated = vault
            .update_snippet(&s.id, SnippetPatch { title: Some("t".into()), ..SnippetPatch::default() })
            .unwrap();
        assert!(updated.updated_at >= updated.created_at);
    }

    #[test]
    fn flags_toggle_independently() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);

        let s = vault.create_snippet(NewSnippet::new("body")).unwrap();
        let s = vault.pin(&s.id).unwrap();
        let s = vault.archive(&s.id).unwrap();
        assert!(s.pinned && s.archived);
        let s = vault.unpin(&s.id).unwrap();
        assert!(!s.pinned && s.archived);
        let s = vault.unarchive(&s.id).unwrap();
        assert!(!s.pinned && !s.archived);

        assert_eq!(vault.pin("missing").unwrap_err().code(), "NOT_FOUND");
    }

    #[test]
    fn delete_removes_everything() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);

        let s = vault
            .create_snippet(NewSnippet::new("body").tag("t").collection("c"))
            .unwrap();
        vault.delete_snippet(&s.id).unwrap();

        assert_eq!(vault.snippet_count().unwrap(), 0);
        assert_eq!(vault.shadow_count().unwrap(), 0);
        assert_eq!(vault.get_snippet(&s.id).unwrap_err().code(), "NOT_FOUND");
        assert_eq!(vault.delete_snippet(&s.id).unwrap_err().code(), "NOT_FOUND");
        // tags survive with no associations
        assert_eq!(vault.list_tags(10, 0).unwrap().items[0].snippet_count, 0);
    }

    #[test]
    fn list_filters_and_paginates() {
        let temp = TempDir::new().unwrap();
        let (vault, clock) = open(&temp);

        for i in 0..5 {
            clock.advance(10);
            let mut input = NewSnippet::new(format!("body {i}"));
            if i % 2 == 0 {
                input = input.tag("Even");
            }
            vault.create_snippet(input).unwrap();
        }

        let all = vault.list_snippets(&SnippetFilter::default(), 2, 0).unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.items[0].body, "body 4");

        let even = vault
            .list_snippets(
                &SnippetFilter {
                    tag: Some("EVEN".into()),
                    ..SnippetFilter::default()
                },
                100,
                0,
            )
            .unwrap();
        assert_eq!(even.total, 3);

        let clamped = vault.list_snippets(&SnippetFilter::default(), 0, 0).unwrap();
        assert_eq!(clamped.limit, 1);
        assert_eq!(clamped.items.len(), 1);
        let clamped = vault.list_snippets(&SnippetFilter::default(), 10_000, 0).unwrap();
        assert_eq!(clamped.limit, 500);
    }
}
