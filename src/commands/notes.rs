use anyhow::Result;
use tabula::ConnectionService;

use super::with_connection;

/// Execute the notes command.
///
/// Prints the connect message, which carries the notes or the reason they
/// could not be read.
pub fn execute(service: &ConnectionService, path: &str) -> Result<()> {
    let message = with_connection(service, path, true, |_, message| Ok(message))?;
    println!("{message}");
    Ok(())
}
