//! Test fixtures and vault helpers.
//!
//! Every fixture owns a temporary data directory that is removed when the
//! fixture drops, and a [`ManualClock`] so tests control time.

use pinup_core::{
    BackupManager, FixedEntitlement, ManualClock, OfflineValidator, Vault, VaultConfig,
};
use pinup_server::{PinupServer, ServerConfig};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Fixed start time of every fixture clock (2023-11-14).
pub const TEST_EPOCH: i64 = 1_700_000_000_000;

/// A test vault with automatic cleanup.
pub struct TestVault {
    /// The vault instance.
    pub vault: Vault,
    /// Backup manager writing under the same data directory.
    pub backups: BackupManager,
    /// Clock shared by the vault and backup manager.
    pub clock: Arc<ManualClock>,
    config: VaultConfig,
    entitled: bool,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestVault {
    /// Creates an entitled vault with default configuration.
    pub fn new() -> Self {
        Self::build(|config| config, true)
    }

    /// Creates a vault whose configuration is adjusted by `configure`.
    pub fn with_config(configure: impl FnOnce(VaultConfig) -> VaultConfig) -> Self {
        Self::build(configure, true)
    }

    /// Creates a vault without entitlement and the given free-tier ceiling.
    pub fn unlicensed(free_tier_limit: u32) -> Self {
        Self::build(|config| config.free_tier_limit(free_tier_limit), false)
    }

    fn build(configure: impl FnOnce(VaultConfig) -> VaultConfig, entitled: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::new(TEST_EPOCH));
        let config = configure(VaultConfig::new(temp_dir.path()));
        let backups = BackupManager::with_clock(config.backup.clone(), clock.clone());
        let vault = Vault::open_with_clock(
            config.clone(),
            Arc::new(FixedEntitlement(entitled)),
            clock.clone(),
        )
        .expect("Failed to open vault");

        Self {
            vault,
            backups,
            clock,
            config,
            entitled,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the data directory.
    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Closes and reopens the vault on the same data directory.
    pub fn reopen(&mut self) {
        let config = self.config.clone();
        let entitlement = Arc::new(FixedEntitlement(self.entitled));
        self.vault = Vault::open_with_clock(config, entitlement, self.clock.clone())
            .expect("Failed to reopen vault");
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestVault {
    type Target = Vault;

    fn deref(&self) -> &Self::Target {
        &self.vault
    }
}

/// Runs a test with a temporary entitled vault.
///
/// # Example
///
/// ```rust,ignore
/// use pinup_testkit::with_temp_vault;
///
/// #[test]
/// fn my_test() {
///     with_temp_vault(|vault| {
///         vault.create_snippet(NewSnippet::new("x")).unwrap();
///     });
/// }
/// ```
pub fn with_temp_vault<F, R>(f: F) -> R
where
    F: FnOnce(&Vault) -> R,
{
    let test_vault = TestVault::new();
    f(&test_vault.vault)
}

/// A request server on a temporary data directory.
pub struct TestServer {
    /// The server.
    pub server: PinupServer,
    /// Clock shared by every component.
    pub clock: Arc<ManualClock>,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Creates a server with default configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates a server with the given request-surface configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::new(TEST_EPOCH));
        let server = PinupServer::open(
            VaultConfig::new(temp_dir.path()),
            config,
            Arc::new(OfflineValidator),
            clock.clone(),
        )
        .expect("Failed to open server");
        Self {
            server,
            clock,
            _temp_dir: temp_dir,
        }
    }

    /// Sends a JSON request and returns the JSON response.
    pub fn call(&self, request: Value) -> Value {
        let response = self.server.handle_json(&request.to_string());
        serde_json::to_value(response).expect("Failed to encode response")
    }

    /// Sends a request that must succeed and returns its result.
    pub fn ok(&self, request: Value) -> Value {
        let response = self.call(request);
        assert_eq!(response["ok"], true, "request failed: {response}");
        response["result"].clone()
    }

    /// Sends a request that must fail and returns its error code.
    pub fn error_code(&self, request: Value) -> String {
        let response = self.call(request);
        assert_eq!(response["ok"], false, "request succeeded: {response}");
        response["error"]["code"]
            .as_str()
            .expect("error without code")
            .to_string()
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use pinup_core::NewSnippet;

    /// Tags cycled through by [`populated_vault`].
    pub const SCENARIO_TAGS: [&str; 3] = ["rust", "python", "shell"];

    /// Creates a vault with `count` snippets, tagged round-robin from
    /// [`SCENARIO_TAGS`] and all in the collection `Scenario`.
    pub fn populated_vault(count: usize) -> TestVault {
        let test_vault = TestVault::new();
        for i in 0..count {
            let tag = SCENARIO_TAGS[i % SCENARIO_TAGS.len()];
            test_vault
                .create_snippet(
                    NewSnippet::new(format!("snippet number {i} about {tag}"))
                        .tag(tag)
                        .collection("Scenario"),
                )
                .expect("Failed to create snippet");
        }
        test_vault
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinup_core::{NewSnippet, SearchOptions};
    use serde_json::json;

    #[test]
    fn test_vault_is_usable() {
        let test_vault = TestVault::new();
        test_vault.create_snippet(NewSnippet::new("x")).unwrap();
        assert_eq!(test_vault.snippet_count().unwrap(), 1);
        assert!(test_vault.path().join("pinup.db").exists());
    }

    #[test]
    fn test_with_temp_vault() {
        let count = with_temp_vault(|vault| {
            vault.create_snippet(NewSnippet::new("a")).unwrap();
            vault.snippet_count().unwrap()
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let mut test_vault = TestVault::new();
        let id = test_vault.create_snippet(NewSnippet::new("kept")).unwrap().id;
        test_vault.reopen();
        assert_eq!(test_vault.get_snippet(&id).unwrap().body, "kept");
    }

    #[test]
    fn test_unlicensed_quota() {
        let test_vault = TestVault::unlicensed(1);
        test_vault.create_snippet(NewSnippet::new("one")).unwrap();
        let err = test_vault.create_snippet(NewSnippet::new("two")).unwrap_err();
        assert_eq!(err.code(), "QUOTA_EXCEEDED");
    }

    #[test]
    fn test_populated_scenario() {
        let test_vault = scenarios::populated_vault(9);
        let page = test_vault
            .search("tag:rust", &SearchOptions::default())
            .unwrap();
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_server_fixture() {
        let server = TestServer::new();
        let health = server.ok(json!({"op": "health"}));
        assert_eq!(health["status"], "ok");
        assert_eq!(server.error_code(json!({"op": "get_tag", "id": "missing"})), "NOT_FOUND");
    }
}
