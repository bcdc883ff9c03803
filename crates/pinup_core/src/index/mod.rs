//! Full-text search over snippets.
//!
//! The index is an FTS5 table (`snippets_fts`) holding one shadow row per
//! snippet. The store writes shadow rows in the same transaction as the
//! primary rows; this module owns the query DSL, ranking and the full
//! rebuild used after a restore.

pub mod fts;
pub mod query;

use crate::error::VaultResult;
use crate::store::{clamp_limit, Vault};
use crate::types::{Page, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use query::{parse, Filter, ParsedQuery, Term};

/// Options for a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Include archived snippets.
    pub include_archived: bool,
    /// Page size, clamped to `1..=500`.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            include_archived: false,
            limit: 50,
            offset: 0,
        }
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Snippet id.
    pub id: String,
    /// Snippet title.
    pub title: String,
    /// First 200 characters of the body on one line.
    pub preview: String,
    /// Language hint.
    pub language: Option<String>,
    /// Source label.
    pub source: Option<String>,
    /// Pinned flag.
    #[serde(with = "crate::types::flag")]
    pub pinned: bool,
    /// Archived flag.
    #[serde(with = "crate::types::flag")]
    pub archived: bool,
    /// Tag names.
    pub tags: Vec<String>,
    /// Collection names.
    pub collections: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// bm25 score when free text was given; lower is more relevant.
    pub score: Option<f64>,
}

impl Vault {
    /// Searches snippets with the query DSL.
    ///
    /// An empty query lists every (non-archived) snippet. Unknown filter
    /// values produce an empty page, never an error.
    pub fn search(&self, query: &str, options: &SearchOptions) -> VaultResult<Page<SearchHit>> {
        let parsed = parse(query);
        let limit = clamp_limit(options.limit);
        let page = self.read(|conn| fts::search(conn, &parsed, options, limit))?;
        debug!(
            terms = parsed.terms.len(),
            filters = parsed.filters.len(),
            total = page.total,
            "search"
        );
        Ok(page)
    }

    /// Drops and repopulates the shadow table in one transaction.
    ///
    /// Returns the number of shadow rows written.
    pub fn rebuild_index(&self) -> VaultResult<usize> {
        let rows = self.write(fts::rebuild)?;
        info!(rows, "search index rebuilt");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::VaultConfig;
    use crate::license::FixedEntitlement;
    use crate::types::{NewSnippet, SnippetPatch};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> (Vault, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let vault = Vault::open_with_clock(
            VaultConfig::new(temp.path()),
            Arc::new(FixedEntitlement(true)),
            clock.clone(),
        )
        .unwrap();
        (vault, clock)
    }

    fn ids(page: &Page<SearchHit>) -> Vec<&str> {
        page.items.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn source_filter_folds_non_ascii_case() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);

        let a = vault
            .create_snippet(NewSnippet::new("espresso notes").source("CAFÉ"))
            .unwrap();
        let b = vault
            .create_snippet(NewSnippet::new("tea notes").source("Tea"))
            .unwrap();

        for query in ["source:café", "source:Café", "source:\"CAFÉ\""] {
            let page = vault.search(query, &SearchOptions::default()).unwrap();
            assert_eq!(ids(&page), vec![a.id.as_str()], "query {query:?}");
        }

        let patch = SnippetPatch {
            source: Some("Éclair".into()),
            ..SnippetPatch::default()
        };
        vault.update_snippet(&b.id, patch).unwrap();
        let page = vault.search("source:éclair notes", &SearchOptions::default()).unwrap();
        assert_eq!(ids(&page), vec![b.id.as_str()]);
    }

    #[test]
    fn free_text_and_filters() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);

        let a = vault
            .create_snippet(
                NewSnippet::new("useEffect cleanup runs on unmount")
                    .tag("react")
                    .source("ChatGPT"),
            )
            .unwrap();
        vault
            .create_snippet(NewSnippet::new("useEffect with deps").tag("vue"))
            .unwrap();

        let page = vault
            .search("useEffect tag:React", &SearchOptions::default())
            .unwrap();
        assert_eq!(ids(&page), vec![a.id.as_str()]);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].tags, vec!["react"]);
        assert!(page.items[0].score.is_some());

        let by_source = vault
            .search("source:chatgpt", &SearchOptions::default())
            .unwrap();
        assert_eq!(ids(&by_source), vec![a.id.as_str()]);
        assert!(by_source.items[0].score.is_none());
    }

    #[test]
    fn unknown_filter_value_is_empty_not_error() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        vault.create_snippet(NewSnippet::new("anything")).unwrap();

        let page = vault.search("tag:nope", &SearchOptions::default()).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn empty_query_lists_and_garbage_matches_nothing() {
        let temp = TempDir::new().unwrap();
        let (vault, clock) = open(&temp);
        vault.create_snippet(NewSnippet::new("first")).unwrap();
        clock.advance(5);
        let second = vault.create_snippet(NewSnippet::new("second")).unwrap();

        let all = vault.search("", &SearchOptions::default()).unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].id, second.id);

        let none = vault.search("*** ()", &SearchOptions::default()).unwrap();
        assert_eq!(none.total, 0);
    }

    #[test]
    fn syntax_in_user_input_never_errors() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        vault.create_snippet(NewSnippet::new("NOT a problem AND more")).unwrap();

        for q in ["NOT", "AND OR", "\"unterminated", "a\"b", "col:x", "NEAR(a b)", "^x", "-y"] {
            vault.search(q, &SearchOptions::default()).unwrap();
        }
        let page = vault.search("NOT problem", &SearchOptions::default()).unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn archived_hidden_unless_requested() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        let s = vault.create_snippet(NewSnippet::new("hidden gem")).unwrap();
        vault.archive(&s.id).unwrap();

        assert_eq!(vault.search("gem", &SearchOptions::default()).unwrap().total, 0);
        let with_archived = SearchOptions {
            include_archived: true,
            ..SearchOptions::default()
        };
        assert_eq!(vault.search("gem", &with_archived).unwrap().total, 1);
    }

    #[test]
    fn ranking_prefers_relevance_then_recency() {
        let temp = TempDir::new().unwrap();
        let (vault, clock) = open(&temp);

        let weak = vault
            .create_snippet(NewSnippet::new(format!("tokio {}", "filler ".repeat(50))))
            .unwrap();
        clock.advance(10);
        let strong = vault
            .create_snippet(NewSnippet::new("tokio tokio tokio runtime").title("tokio"))
            .unwrap();

        let page = vault.search("tokio", &SearchOptions::default()).unwrap();
        assert_eq!(ids(&page), vec![strong.id.as_str(), weak.id.as_str()]);
    }

    #[test]
    fn update_replaces_shadow_content() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        let s = vault.create_snippet(NewSnippet::new("alpha")).unwrap();
        vault
            .update_snippet(
                &s.id,
                crate::types::SnippetPatch {
                    body: Some("omega".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(vault.search("alpha", &SearchOptions::default()).unwrap().total, 0);
        assert_eq!(vault.search("omega", &SearchOptions::default()).unwrap().total, 1);
        assert_eq!(vault.shadow_count().unwrap(), 1);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        for i in 0..3 {
            vault.create_snippet(NewSnippet::new(format!("note {i}"))).unwrap();
        }

        assert_eq!(vault.rebuild_index().unwrap(), 3);
        assert_eq!(vault.rebuild_index().unwrap(), 3);
        assert_eq!(vault.shadow_count().unwrap(), 3);
        assert_eq!(vault.search("note", &SearchOptions::default()).unwrap().total, 3);
    }

    #[test]
    fn pagination_keeps_total() {
        let temp = TempDir::new().unwrap();
        let (vault, _) = open(&temp);
        for i in 0..7 {
            vault.create_snippet(NewSnippet::new(format!("page item {i}"))).unwrap();
        }
        let options = SearchOptions {
            limit: 3,
            offset: 6,
            ..SearchOptions::default()
        };
        let page = vault.search("item", &options).unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 1);
    }
}
