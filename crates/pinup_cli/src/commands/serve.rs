//! JSON-lines request loop.

use super::{CommandResult, Session};
use tracing::info;

/// Serves requests from stdin until it closes.
pub fn run(session: Session) -> CommandResult {
    let server = session.into_server();
    info!(
        data_dir = %server.context().vault.data_dir().display(),
        "serving requests on stdin"
    );
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    server.serve_lines(stdin.lock(), stdout.lock())?;
    Ok(())
}
