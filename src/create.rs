//! Creation of new, empty database files.
//!
//! SQLite files are created by opening them; Access files are copies of an
//! empty template database.

use crate::backend::{SqlEngine, SqliteEngine};
use crate::error::{Error, Result};
use crate::resolver::StoreKind;
use std::path::{Path, PathBuf};

/// Creates an empty database at `target`, picking the type by extension.
///
/// Returns a confirmation message.
///
/// # Errors
///
/// - [`Error::TargetExists`] if anything already exists at `target`
/// - [`Error::UnsupportedExtension`] for unknown extensions (and the empty path)
/// - [`Error::TemplateMissing`] if an Access file is requested and `template`
///   does not exist
/// - [`Error::CreateFailed`] for any other failure
pub fn create_database(target: &str, template: &Path) -> Result<String> {
    let target_path = PathBuf::from(target);
    if target_path.exists() {
        return Err(Error::TargetExists { path: target_path });
    }

    match StoreKind::from_path(target)? {
        StoreKind::Memory => Err(Error::unsupported_extension(target)),
        StoreKind::Sqlite => {
            let mut engine = SqliteEngine::open(&target_path).map_err(|e| Error::CreateFailed {
                path: target_path.clone(),
                reason: e.to_string(),
            })?;
            // Writing the header makes the file a valid database on disk.
            engine
                .update("PRAGMA user_version = 0", &[])
                .map_err(|e| Error::CreateFailed {
                    path: target_path.clone(),
                    reason: e.to_string(),
                })?;
            engine.close();
            tracing::info!(path = %target_path.display(), "created SQLite database");
            Ok(format!("SQLite database created at {}", target_path.display()))
        },
        StoreKind::Mdb | StoreKind::Accdb => {
            if !template.is_file() {
                return Err(Error::TemplateMissing {
                    path: template.to_path_buf(),
                });
            }
            std::fs::copy(template, &target_path).map_err(|e| Error::CreateFailed {
                path: target_path.clone(),
                reason: e.to_string(),
            })?;
            tracing::info!(
                path = %target_path.display(),
                template = %template.display(),
                "created Access database from template"
            );
            Ok(format!("MS Access database created at {}", target_path.display()))
        },
    }
}
