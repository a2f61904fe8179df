//! Driver resolution: turns a path into an opened, verified backend.
//!
//! Dispatch is by file extension, case-sensitive:
//!
//! | Path | Backend |
//! |------|---------|
//! | empty | in-memory SQLite |
//! | `.db`, `.sqlite`, `.sqlite3` | SQLite file |
//! | `.mdb` | modern ODBC driver, then legacy ODBC driver, then Jet 3 parser |
//! | `.accdb` | modern ODBC driver; Jet 3 parser only if the failure looks like a legacy-format file |
//! | anything else | rejected |
//!
//! Every SQL engine must answer `SELECT 1` before it is handed out. An engine
//! that opens but fails the probe is closed before the next method is tried.
//! When every method fails, the combined reasons are reported together.
//!
//! # Example
//!
//! ```ignore
//! use tabula::{Config, resolver::Resolver};
//!
//! let resolver = Resolver::from_config(&Config::default());
//! let backend = resolver.resolve("archive/orders.mdb")?;
//! println!("opened with {}", backend.describe());
//! ```

mod attempts;
mod detector;


pub use attempts::{ConnectAttempt, JET_PARSER_NAME, JetParserAttempt, OdbcAttempt};
pub use detector::{LegacyFormatDetector, MarkerDetector};

use crate::backend::{Backend, SqliteEngine};
use crate::config::Config;
use crate::error::{Error, Result};
use std::path::Path;

/// Store type chosen from a path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Empty path: transient in-memory SQLite.
    Memory,
    Sqlite,
    Mdb,
    Accdb,
}

impl StoreKind {
    /// Classifies `path` by extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedExtension`] for anything unrecognized,
    /// including upper-case variants of the known extensions.
    pub fn from_path(path: &str) -> Result<Self> {
        if path.is_empty() {
            Ok(Self::Memory)
        } else if [".db", ".sqlite", ".sqlite3"]
            .iter()
            .any(|ext| path.ends_with(ext))
        {
            Ok(Self::Sqlite)
        } else if path.ends_with(".mdb") {
            Ok(Self::Mdb)
        } else if path.ends_with(".accdb") {
            Ok(Self::Accdb)
        } else {
            Err(Error::unsupported_extension(path))
        }
    }

    pub fn is_access(self) -> bool {
        matches!(self, Self::Mdb | Self::Accdb)
    }
}

/// Opens backends for paths, following the fallback chain for Access files.
pub struct Resolver {
    attempts: Vec<Box<dyn ConnectAttempt>>,
    detector: Box<dyn LegacyFormatDetector>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.attempts.iter().map(|a| a.label()).collect();
        f.debug_struct("Resolver").field("attempts", &labels).finish()
    }
}

impl Resolver {
    /// A resolver with an explicit Access attempt order and detector.
    pub fn new(
        attempts: Vec<Box<dyn ConnectAttempt>>,
        detector: Box<dyn LegacyFormatDetector>,
    ) -> Self {
        Self { attempts, detector }
    }

    /// The standard chain: modern driver, legacy driver, Jet 3 parser.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            vec![
                Box::new(OdbcAttempt::modern(&config.drivers.modern)),
                Box::new(OdbcAttempt::legacy(&config.drivers.legacy)),
                Box::new(JetParserAttempt),
            ],
            Box::new(MarkerDetector::new(&config.fallback.legacy_format_markers)),
        )
    }

    /// Opens and verifies a backend for `path` (empty for in-memory).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedExtension`] for unknown extensions and
    /// [`Error::ConnectionFailed`] when no method could open the store.
    pub fn resolve(&self, path: &str) -> Result<Backend> {
        match StoreKind::from_path(path)? {
            StoreKind::Memory => open_sqlite(path, SqliteEngine::memory()),
            StoreKind::Sqlite => open_sqlite(path, SqliteEngine::open(path)),
            kind => self.resolve_access(path, kind),
        }
    }

    fn resolve_access(&self, path: &str, kind: StoreKind) -> Result<Backend> {
        let mut failures = Vec::new();

        for attempt in self.attempts.iter().filter(|a| a.applies_to(kind)) {
            tracing::debug!(path, attempt = attempt.label(), "trying connection method");
            let error = match attempt.open(Path::new(path)).and_then(verify) {
                Ok(backend) => {
                    tracing::info!(
                        path,
                        attempt = attempt.label(),
                        read_only = backend.is_read_only(),
                        "opened Access database"
                    );
                    return Ok(backend);
                },
                Err(e) => e,
            };

            tracing::warn!(
                path,
                attempt = attempt.label(),
                error = %error,
                "connection method failed"
            );
            let stop = kind == StoreKind::Accdb && !self.detector.is_legacy_format(&error);
            failures.push(format!("{}: {}", attempt.label(), reason_of(&error)));
            if stop {
                tracing::debug!(path, "not a legacy-format .accdb, skipping remaining methods");
                break;
            }
        }

        if failures.is_empty() {
            failures.push("no connection method applies".to_string());
        }
        Err(Error::ConnectionFailed {
            path: path.to_string(),
            reason: failures.join("; "),
        })
    }
}

/// Message of an attempt failure without repeating the driver name.
fn reason_of(error: &Error) -> String {
    match error {
        Error::Driver { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

/// Probes SQL engines, closing any that fail.
fn verify(mut backend: Backend) -> Result<Backend> {
    let probed = match &mut backend {
        Backend::Sql(engine) => engine.probe(),
        Backend::Parser(_) => Ok(()),
    };
    if let Err(e) = probed {
        backend.close();
        return Err(e);
    }
    Ok(backend)
}

fn open_sqlite(path: &str, opened: Result<SqliteEngine>) -> Result<Backend> {
    opened
        .map(|engine| Backend::Sql(Box::new(engine)))
        .and_then(verify)
        .map_err(|e| Error::ConnectionFailed {
            path: if path.is_empty() {
                ":memory:".to_string()
            } else {
                path.to_string()
            },
            reason: reason_of(&e),
        })
}
