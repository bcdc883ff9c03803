//! Integration test helpers.
//!
//! [`IntegrationHarness`] mirrors every mutation into an in-memory model so a
//! test can check the vault against it at any point, including across
//! backup/restore and reopen.

use crate::fixtures::TestVault;
use pinup_core::{
    BackupEntry, NewSnippet, SearchOptions, Snippet, SnippetFilter, SnippetPatch,
};
use std::collections::BTreeMap;

/// Tracked content of one snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSnippet {
    /// Body text.
    pub body: String,
    /// Normalized tag names, sorted.
    pub tags: Vec<String>,
}

impl ModelSnippet {
    fn of(snippet: &Snippet) -> Self {
        let mut tags = snippet.tags.clone();
        tags.sort();
        Self {
            body: snippet.body.clone(),
            tags,
        }
    }
}

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The vault under test.
    pub vault: TestVault,
    /// Model of live snippets by id.
    snippets: BTreeMap<String, ModelSnippet>,
    /// Model snapshots taken at each backup.
    snapshots: BTreeMap<String, BTreeMap<String, ModelSnippet>>,
}

impl IntegrationHarness {
    /// Creates a harness over a fresh entitled vault.
    pub fn new() -> Self {
        Self {
            vault: TestVault::new(),
            snippets: BTreeMap::new(),
            snapshots: BTreeMap::new(),
        }
    }

    /// Creates a snippet and tracks it.
    pub fn create(&mut self, input: NewSnippet) -> String {
        let snippet = self
            .vault
            .create_snippet(input)
            .expect("Failed to create snippet");
        self.snippets
            .insert(snippet.id.clone(), ModelSnippet::of(&snippet));
        snippet.id
    }

    /// Updates a snippet and tracks the result.
    pub fn update(&mut self, id: &str, patch: SnippetPatch) {
        let snippet = self
            .vault
            .update_snippet(id, patch)
            .expect("Failed to update snippet");
        self.snippets.insert(id.to_string(), ModelSnippet::of(&snippet));
    }

    /// Deletes a snippet and updates tracking.
    pub fn delete(&mut self, id: &str) {
        self.vault.delete_snippet(id).expect("Failed to delete snippet");
        self.snippets.remove(id);
    }

    /// Takes a backup and remembers the model at that point.
    pub fn backup(&mut self) -> BackupEntry {
        let entry = self
            .vault
            .backups
            .run_backup(&self.vault.vault)
            .expect("Failed to run backup");
        self.snapshots
            .insert(entry.name.clone(), self.snippets.clone());
        entry
    }

    /// Restores a backup taken through this harness and rolls the model back.
    pub fn restore(&mut self, name: &str) {
        self.vault
            .backups
            .restore(&self.vault.vault, name)
            .expect("Failed to restore backup");
        self.snippets = self
            .snapshots
            .get(name)
            .cloned()
            .expect("Backup was not taken through this harness");
    }

    /// Reopens the vault from disk.
    pub fn reopen(&mut self) {
        self.vault.reopen();
    }

    /// Verifies every tracked snippet, the total count and index sync.
    pub fn verify_all(&self) {
        let page = self
            .vault
            .list_snippets(&SnippetFilter::default(), 500, 0)
            .expect("Failed to list snippets");
        let actual: BTreeMap<String, ModelSnippet> = page
            .items
            .iter()
            .map(|s| (s.id.clone(), ModelSnippet::of(s)))
            .collect();
        assert_eq!(actual, self.snippets, "vault content diverged from model");
        assert_eq!(
            self.vault.shadow_count().expect("Failed to count shadow rows"),
            self.snippets.len() as u64,
            "search index out of sync"
        );
    }

    /// Verifies that searching for `tag:<name>` returns exactly the tracked
    /// snippets carrying that tag.
    pub fn verify_tag_search(&self, tag: &str) {
        let options = SearchOptions {
            limit: 500,
            ..SearchOptions::default()
        };
        let page = self
            .vault
            .search(&format!("tag:{tag}"), &options)
            .expect("Failed to search");
        let mut actual: Vec<String> = page.items.into_iter().map(|h| h.id).collect();
        actual.sort();
        let expected: Vec<String> = self
            .snippets
            .iter()
            .filter(|(_, s)| s.tags.iter().any(|t| t == tag))
            .map(|(id, _)| id.clone())
            .collect();
        assert_eq!(actual, expected, "tag:{tag} results diverged from model");
    }

    /// Returns the count of tracked snippets.
    pub fn tracked_count(&self) -> usize {
        self.snippets.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestServer;
    use serde_json::json;

    #[test]
    fn harness_tracks_through_backup_restore_and_reopen() {
        let mut harness = IntegrationHarness::new();
        let a = harness.create(NewSnippet::new("alpha body").tag("Rust"));
        let b = harness.create(NewSnippet::new("beta body").tag("rust").tag("cli"));
        harness.verify_all();
        harness.verify_tag_search("rust");

        let entry = harness.backup();
        harness.delete(&a);
        harness.update(
            &b,
            SnippetPatch {
                tags: Some(vec!["shell".into()]),
                ..SnippetPatch::default()
            },
        );
        harness.create(NewSnippet::new("gamma body"));
        harness.verify_all();
        harness.verify_tag_search("rust");

        harness.restore(&entry.name);
        harness.verify_all();
        harness.verify_tag_search("rust");
        assert_eq!(harness.tracked_count(), 2);

        harness.reopen();
        harness.verify_all();
    }

    #[test]
    fn request_surface_matches_direct_calls() {
        let server = TestServer::new();
        let created = server.ok(json!({"op": "create_snippet", "body": "via request", "tags": ["api"]}));
        let id = created["id"].as_str().unwrap();

        let context = server.server.context();
        let direct = context.vault.get_snippet(id).unwrap();
        assert_eq!(direct.tags, vec!["api"]);
        assert_eq!(context.vault.shadow_count().unwrap(), 1);

        let stats = server.ok(json!({"op": "stats"}));
        assert_eq!(stats["total_snippets"], 1);
        assert_eq!(stats["top_tags"][0]["name"], "api");
    }

    #[test]
    fn trial_expiry_gates_import_but_not_core_writes() {
        let server = TestServer::new();
        let document = server.ok(json!({"op": "export"}));

        server.clock.advance_days(15);
        assert_eq!(
            server.error_code(json!({"op": "import", "document": document})),
            "LICENSE_REQUIRED"
        );
        server.ok(json!({"op": "create_snippet", "body": "still allowed under the free tier"}));
    }
}
