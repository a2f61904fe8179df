use anyhow::{Context, Result};
use tabula::{ConnectionService, Params};

use super::{CLI_KEY, with_connection};

/// Execute the query command, printing the rows as a JSON array.
pub fn execute(service: &ConnectionService, path: &str, sql: &str, params: Params) -> Result<()> {
    let rows = with_connection(service, path, false, |service, message| {
        tracing::debug!("{message}");
        service
            .query(CLI_KEY, sql, &params)
            .context("Query failed")
    })?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
