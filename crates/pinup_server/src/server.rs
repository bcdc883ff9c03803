//! Line-delimited JSON server.

use crate::config::ServerConfig;
use crate::handler::{HandlerContext, RequestHandler};
use crate::protocol::{Request, Response};
use pinup_core::{Clock, LicenseValidator, VaultConfig, VaultResult};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

/// The vault request server.
///
/// Reads one JSON request per line and writes one JSON response per line.
/// Transport framing is left to the caller: stdin/stdout for a local agent
/// bridge, or any other byte stream.
///
/// # Example
///
/// ```no_run
/// use pinup_core::{OfflineValidator, SystemClock, VaultConfig};
/// use pinup_server::{PinupServer, ServerConfig};
/// use std::sync::Arc;
///
/// let server = PinupServer::open(
///     VaultConfig::new("/tmp/pinup"),
///     ServerConfig::default(),
///     Arc::new(OfflineValidator),
///     Arc::new(SystemClock),
/// )?;
/// let stdin = std::io::stdin();
/// server.serve_lines(stdin.lock(), std::io::stdout())?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PinupServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl PinupServer {
    /// Opens the vault and every component around it.
    pub fn open(
        vault_config: VaultConfig,
        config: ServerConfig,
        validator: Arc<dyn LicenseValidator>,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        let context = HandlerContext::open(vault_config, config, validator, clock)?;
        Ok(Self::with_context(Arc::new(context)))
    }

    /// Creates a server around an existing context.
    pub fn with_context(context: Arc<HandlerContext>) -> Self {
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Handles a typed request.
    pub fn handle(&self, client: Option<&str>, request: Request) -> Response {
        self.handler.handle(client, request)
    }

    /// Handles one JSON request.
    pub fn handle_json(&self, input: &str) -> Response {
        self.handler.handle_json(input)
    }

    /// Runs periodic work (license re-validation, scheduled backups).
    pub fn tick(&self) {
        self.handler.tick();
    }

    /// Serves requests until `input` is exhausted.
    ///
    /// Blank lines are skipped. Returns the number of requests handled.
    pub fn serve_lines<R: BufRead, W: Write>(&self, input: R, mut output: W) -> std::io::Result<u64> {
        self.tick();
        let mut handled = 0u64;
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = self.handle_json(line);
            match serde_json::to_string(&response) {
                Ok(text) => writeln!(output, "{text}")?,
                Err(err) => {
                    warn!(error = %err, "failed to encode response");
                    writeln!(
                        output,
                        r#"{{"ok":false,"error":{{"code":"INTERNAL","message":"internal error"}}}}"#
                    )?;
                }
            }
            output.flush()?;
            handled += 1;
        }
        info!(handled, "input closed");
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinup_core::{ManualClock, OfflineValidator};
    use serde_json::Value;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn server(temp: &TempDir) -> PinupServer {
        PinupServer::open(
            VaultConfig::new(temp.path()),
            ServerConfig::default(),
            Arc::new(OfflineValidator),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
        .unwrap()
    }

    #[test]
    fn serves_one_response_per_line() {
        let temp = TempDir::new().unwrap();
        let server = server(&temp);
        let input = concat!(
            r#"{"op": "create_snippet", "body": "echo hello"}"#,
            "\n\n",
            "garbage\n",
            r#"{"op": "search", "query": "hello"}"#,
            "\n",
        );
        let mut output = Vec::new();
        let handled = server.serve_lines(Cursor::new(input), &mut output).unwrap();
        assert_eq!(handled, 3);

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["ok"], true);
        assert_eq!(lines[1]["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(lines[2]["result"]["total"], 1);
    }

    #[test]
    fn typed_requests() {
        let temp = TempDir::new().unwrap();
        let server = server(&temp);
        let response = server.handle(None, Request::Health);
        assert!(response.ok);
        assert_eq!(server.context().vault.snippet_count().unwrap(), 0);
    }
}
