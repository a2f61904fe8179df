use anyhow::{Context, Result};
use tabula::ConnectionService;

/// Execute the create command.
pub fn execute(service: &ConnectionService, path: &str) -> Result<()> {
    let message = service
        .create_database(path)
        .with_context(|| format!("Failed to create database at {path}"))?;
    println!("{message}");
    Ok(())
}
