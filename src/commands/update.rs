use anyhow::{Context, Result};
use tabula::{ConnectionService, Params};

use super::{CLI_KEY, with_connection};

/// Execute the update command.
///
/// `params` is a JSON array of objects, one per execution; without it the
/// statement runs once with no parameters.
pub fn execute(
    service: &ConnectionService,
    path: &str,
    sql: &str,
    params: Option<&str>,
) -> Result<()> {
    let param_sets = parse_param_sets(params)?;
    let updated = with_connection(service, path, false, |service, _| {
        service
            .update(CLI_KEY, sql, &param_sets)
            .context("Update failed")
    })?;
    let summary = serde_json::json!({
        "updated": updated,
        "executions": param_sets.len().max(1),
    });
    println!("{summary}");
    Ok(())
}

fn parse_param_sets(raw: Option<&str>) -> Result<Vec<Params>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    serde_json::from_str(raw).context("--params must be a JSON array of objects")
}
