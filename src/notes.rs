//! Sidecar notes files describing a database.
//!
//! Notes for `data/sales.db` live next to it as `data/sales.<marker>.<ext>`
//! (for example `sales.AInotes.md`). When several match, the first in
//! sorted order wins.

use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};

/// Reads free-form notes attached to a database file.
pub trait NotesReader: Send + Sync {
    /// Returns the notes text for `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if no notes exist or they cannot be read.
    fn read_notes(&self, db_path: &Path) -> Result<String>;
}

/// Finds notes in a sidecar file beside the database.
#[derive(Debug, Clone)]
pub struct SidecarNotes {
    marker: String,
}

impl SidecarNotes {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Glob pattern matching notes files for `db_path`.
    fn pattern(&self, db_path: &Path) -> Result<String> {
        let stem = db_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid_path(db_path, "has no file name"))?;
        let dir = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let dir = dir
            .to_str()
            .ok_or_else(|| invalid_path(dir, "is not valid UTF-8"))?;

        Ok(format!(
            "{}/{}.{}.*",
            glob::Pattern::escape(dir),
            glob::Pattern::escape(stem),
            glob::Pattern::escape(&self.marker)
        ))
    }

    /// Sidecar file for `db_path`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no usable file name.
    pub fn locate(&self, db_path: &Path) -> Result<Option<PathBuf>> {
        let pattern = self.pattern(db_path)?;
        let mut matches: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("invalid notes pattern '{pattern}': {e}")))?
            .filter_map(std::result::Result::ok)
            .filter(|p| p.is_file())
            .collect();
        matches.sort();
        Ok(matches.into_iter().next())
    }
}

fn invalid_path(path: &Path, problem: &str) -> Error {
    Error::io(
        format!("locating notes for {}", path.display()),
        io::Error::new(io::ErrorKind::InvalidInput, format!("path {problem}")),
    )
}

impl NotesReader for SidecarNotes {
    fn read_notes(&self, db_path: &Path) -> Result<String> {
        let Some(path) = self.locate(db_path)? else {
            return Err(Error::io(
                format!("reading notes for {}", db_path.display()),
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no '{}' notes file found", self.marker),
                ),
            ));
        };
        tracing::debug!(notes = %path.display(), "reading notes");
        std::fs::read_to_string(&path)
            .map_err(|e| Error::io(format!("reading notes {}", path.display()), e))
    }
}
