//! CLI command implementations for tabula.
//!
//! Every command works on a single store:
//!
//! - [`create`] - Create an empty database file
//! - [`query`] - Run a query and print rows as JSON
//! - [`update`] - Run a transactional update
//! - [`notes`] - Print a database's sidecar notes

pub mod create;
pub mod notes;
pub mod query;
pub mod update;

use anyhow::Result;
use tabula::ConnectionService;

/// Key the CLI registers its single connection under.
pub const CLI_KEY: &str = "cli";

/// Connects `path` under [`CLI_KEY`], runs `f`, and always disconnects.
pub fn with_connection<T>(
    service: &ConnectionService,
    path: &str,
    read_notes: bool,
    f: impl FnOnce(&ConnectionService, String) -> Result<T>,
) -> Result<T> {
    let message = service.connect(CLI_KEY, path, read_notes)?;
    let result = f(service, message);
    if let Err(e) = service.disconnect(CLI_KEY) {
        tracing::warn!(error = %e, "disconnect failed");
    }
    result
}
