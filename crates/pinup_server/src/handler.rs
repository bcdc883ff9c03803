//! Request handlers.

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::protocol::{Envelope, Health, Reply, Request, Response};
use pinup_core::dir::{LICENSE_FILE, SETTINGS_FILE};
use pinup_core::{
    AdmissionControl, BackupManager, Clock, LicenseEngine, LicenseValidator, SearchOptions,
    SettingsStore, Vault, VaultConfig, VaultResult,
};
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a request can touch.
pub struct HandlerContext {
    /// Request surface configuration.
    pub config: ServerConfig,
    /// The open vault.
    pub vault: Arc<Vault>,
    /// Backup manager.
    pub backups: Arc<BackupManager>,
    /// License engine; also the vault's entitlement source.
    pub license: Arc<LicenseEngine>,
    /// Persisted settings.
    pub settings: Arc<SettingsStore>,
    /// Admission control in front of every request.
    pub admission: Arc<AdmissionControl>,
}

impl HandlerContext {
    /// Opens every component against one data directory.
    ///
    /// Stored settings are applied on top of `vault_config` before the vault
    /// opens. All time-based components share `clock`.
    pub fn open(
        vault_config: VaultConfig,
        config: ServerConfig,
        validator: Arc<dyn LicenseValidator>,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        if vault_config.create_if_missing {
            fs::create_dir_all(&vault_config.data_dir)?;
        }
        let settings = SettingsStore::load(&vault_config.data_dir.join(SETTINGS_FILE))?;
        let vault_config = settings.get().configure(vault_config);

        let license = Arc::new(LicenseEngine::open(
            &vault_config.data_dir.join(LICENSE_FILE),
            vault_config.license.clone(),
            Arc::clone(&clock),
            validator,
        )?);
        let backups = Arc::new(BackupManager::with_clock(
            vault_config.backup.clone(),
            Arc::clone(&clock),
        ));
        let vault = Arc::new(Vault::open_with_clock(
            vault_config,
            license.clone(),
            Arc::clone(&clock),
        )?);
        let admission = Arc::new(AdmissionControl::with_clock(
            config.admission.clone(),
            clock,
        ));

        Ok(Self {
            config,
            vault,
            backups,
            license,
            settings: Arc::new(settings),
            admission,
        })
    }
}

/// Dispatches requests against a [`HandlerContext`].
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Admits and executes one request.
    ///
    /// Admission runs before anything else, so a rejected request has no
    /// side effects.
    pub fn handle(&self, client: Option<&str>, request: Request) -> Response {
        let client = client.unwrap_or(&self.context.config.default_client);
        let op = request.op();
        if let Err(err) = self.context.admission.admit(client) {
            debug!(client, op, "request rejected by admission control");
            return Response::failure(err.into());
        }

        match self.dispatch(request) {
            Ok(reply) => {
                debug!(client, op, "request ok");
                Response::success(reply)
            }
            Err(err) => {
                if err.is_client_error() {
                    debug!(client, op, code = %err.code, "request failed");
                }
                Response::failure(err)
            }
        }
    }

    /// Parses one JSON request and handles it.
    ///
    /// Oversized or malformed input yields a `VALIDATION_ERROR` response.
    pub fn handle_json(&self, input: &str) -> Response {
        if input.len() > self.context.config.max_request_bytes {
            return Response::failure(ApiError::invalid_request(format!(
                "request exceeds {} bytes",
                self.context.config.max_request_bytes
            )));
        }
        match serde_json::from_str::<Envelope>(input) {
            Ok(envelope) => self.handle(envelope.client.as_deref(), envelope.request),
            Err(err) => Response::failure(ApiError::invalid_request(format!(
                "malformed request: {err}"
            ))),
        }
    }

    /// Periodic work: license re-validation when due, then a scheduled
    /// backup when one is due.
    pub fn tick(&self) {
        if let Err(err) = self.context.license.check() {
            warn!(error = %err, "license check failed");
        }
        let now = self.context.vault.now();
        match self.context.backups.run_scheduled(&self.context.vault, now) {
            Ok(Some(entry)) => info!(name = %entry.name, "scheduled backup written"),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "scheduled backup failed"),
        }
        self.context.admission.prune_idle();
    }

    fn dispatch(&self, request: Request) -> ApiResult<Reply> {
        let ctx = &self.context;
        let vault = ctx.vault.as_ref();
        let reply = match request {
            Request::ListSnippets {
                filter,
                limit,
                offset,
            } => Reply::Snippets(vault.list_snippets(&filter, limit, offset)?),
            Request::GetSnippet { id } => Reply::Snippet(vault.get_snippet(&id)?),
            Request::CreateSnippet(input) => Reply::Snippet(vault.create_snippet(input)?),
            Request::UpdateSnippet { id, patch } => {
                Reply::Snippet(vault.update_snippet(&id, patch)?)
            }
            Request::DeleteSnippet { id } => {
                vault.delete_snippet(&id)?;
                Reply::Deleted { deleted: true }
            }
            Request::Pin { id } => Reply::Snippet(vault.pin(&id)?),
            Request::Unpin { id } => Reply::Snippet(vault.unpin(&id)?),
            Request::Archive { id } => Reply::Snippet(vault.archive(&id)?),
            Request::Unarchive { id } => Reply::Snippet(vault.unarchive(&id)?),

            Request::ListTags { limit, offset } => Reply::Tags(vault.list_tags(limit, offset)?),
            Request::GetTag { id } => Reply::Tag(vault.get_tag(&id)?),
            Request::CreateTag(input) => Reply::Tag(vault.create_tag(input)?),
            Request::UpdateTag { id, patch } => Reply::Tag(vault.update_tag(&id, patch)?),
            Request::DeleteTag { id } => {
                vault.delete_tag(&id)?;
                Reply::Deleted { deleted: true }
            }

            Request::ListCollections { limit, offset } => {
                Reply::Collections(vault.list_collections(limit, offset)?)
            }
            Request::GetCollection { id } => Reply::Collection(vault.get_collection(&id)?),
            Request::CreateCollection(input) => {
                Reply::Collection(vault.create_collection(input)?)
            }
            Request::UpdateCollection { id, patch } => {
                Reply::Collection(vault.update_collection(&id, patch)?)
            }
            Request::DeleteCollection { id } => {
                vault.delete_collection(&id)?;
                Reply::Deleted { deleted: true }
            }

            Request::Search {
                query,
                include_archived,
                limit,
                offset,
            } => {
                let options = SearchOptions {
                    include_archived,
                    limit,
                    offset,
                };
                Reply::Hits(vault.search(&query, &options)?)
            }
            Request::RebuildIndex => Reply::Reindexed {
                indexed: vault.rebuild_index()?,
            },

            Request::RunBackup => Reply::Backup(ctx.backups.run_backup(vault)?),
            Request::ListBackups => Reply::Backups(ctx.backups.list_backups()?),
            Request::RestoreBackup { name } => Reply::Restored(ctx.backups.restore(vault, &name)?),

            Request::LicenseStatus => Reply::License(ctx.license.check()?),
            Request::ActivateLicense { key } => Reply::License(ctx.license.activate(&key)?),
            Request::DeactivateLicense => Reply::License(ctx.license.deactivate()?),

            Request::GetSettings => Reply::Settings(ctx.settings.get()),
            Request::PatchSettings { patch } => {
                Reply::Settings(ctx.settings.patch(&patch, vault, &ctx.backups)?)
            }

            Request::Stats => Reply::Stats(Box::new(vault.stats(&ctx.backups)?)),
            Request::Export { scope } => Reply::Export(Box::new(vault.export_json(&scope)?)),
            Request::ExportMarkdown { id } => Reply::Markdown {
                markdown: vault.export_markdown(&id)?,
            },
            Request::Import { document } => Reply::Imported(vault.import_json(&document)?),

            Request::Health => {
                let snippets = vault.snippet_count()?;
                let shadow_rows = vault.shadow_count()?;
                Reply::Health(Health {
                    status: "ok".to_string(),
                    version: pinup_core::VERSION.to_string(),
                    snippets,
                    shadow_rows,
                    index_in_sync: snippets == shadow_rows,
                })
            }
        };
        Ok(reply)
    }
}
