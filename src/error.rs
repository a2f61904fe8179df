//! Error types for connection, query and update operations.
//!
//! Every failure surfaced to a caller is an [`Error`] carrying a readable
//! message. [`Error::kind`] exposes the stable category so callers can react
//! to a failure without inspecting message text.

use std::path::PathBuf;

/// Result type for tabula operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    NotConnected,
    UnsupportedExtension,
    ConnectionFailed,
    QueryError,
    UnsupportedQuery,
    ParametersNotSupported,
    ReadOnlyViolation,
    TargetExists,
    TemplateMissing,
    CreateFailed,
    /// A single driver attempt inside the fallback chain.
    Driver,
    /// The structural parser rejected the file.
    Corrupt,
    Io,
    Config,
    /// A blocking task was cancelled or panicked.
    Task,
}

/// Errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A connection already exists under the key.
    #[error("database connection with key '{key}' already exists (existing connection: {path})")]
    AlreadyExists { key: String, path: String },

    /// No connection is registered under the key.
    #[error("not connected to the database with key '{key}', use connect first")]
    NotConnected { key: String },

    /// The path's extension is not one of the recognized store types.
    #[error(
        "unsupported database file extension: {path} (supported: .db, .sqlite, .sqlite3, .mdb, .accdb)"
    )]
    UnsupportedExtension { path: String },

    /// Every connection method failed; `reason` lists each attempt in order.
    #[error("could not open '{path}': {reason}")]
    ConnectionFailed { path: String, reason: String },

    /// Malformed statement or engine failure while running it.
    #[error("query failed: {0}")]
    Query(String),

    /// The read-only parser cannot service this statement shape.
    #[error("unsupported query for read-only backend: {0}")]
    UnsupportedQuery(String),

    /// The read-only parser was given named parameters.
    #[error("named parameters are not supported by the read-only backend")]
    ParametersNotSupported,

    /// An update was issued against a read-only handle.
    #[error("{target} is read-only, updates are not allowed")]
    ReadOnlyViolation { target: String },

    /// `CreateDatabase` target already exists.
    #[error("target file already exists: {path:?}")]
    TargetExists { path: PathBuf },

    /// The template used to create Access databases was not found.
    #[error("MS Access empty template database not found: {path:?}")]
    TemplateMissing { path: PathBuf },

    /// Database creation failed for another reason.
    #[error("failed to create database {path:?}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// One connection method of the fallback chain failed.
    #[error("{driver}: {reason}")]
    Driver { driver: String, reason: String },

    /// The legacy file could not be decoded.
    #[error("corrupt or unsupported file: {0}")]
    Corrupt(String),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A `spawn_blocking` task failed to complete.
    #[error("task join error: {0}")]
    Task(String),
}

impl Error {
    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotConnected { .. } => ErrorKind::NotConnected,
            Self::UnsupportedExtension { .. } => ErrorKind::UnsupportedExtension,
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::Query(_) => ErrorKind::QueryError,
            Self::UnsupportedQuery(_) => ErrorKind::UnsupportedQuery,
            Self::ParametersNotSupported => ErrorKind::ParametersNotSupported,
            Self::ReadOnlyViolation { .. } => ErrorKind::ReadOnlyViolation,
            Self::TargetExists { .. } => ErrorKind::TargetExists,
            Self::TemplateMissing { .. } => ErrorKind::TemplateMissing,
            Self::CreateFailed { .. } => ErrorKind::CreateFailed,
            Self::Driver { .. } => ErrorKind::Driver,
            Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::Io { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
            Self::Task(_) => ErrorKind::Task,
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a not-connected error.
    pub fn not_connected(key: impl Into<String>) -> Self {
        Self::NotConnected { key: key.into() }
    }

    /// Create an already-exists error.
    pub fn already_exists(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self::AlreadyExists {
            key: key.into(),
            path: path.into(),
        }
    }

    /// Create an unsupported-extension error.
    pub fn unsupported_extension(path: impl Into<String>) -> Self {
        Self::UnsupportedExtension { path: path.into() }
    }

    /// Create a query error.
    pub fn query(reason: impl Into<String>) -> Self {
        Self::Query(reason.into())
    }

    /// Create a single-attempt driver failure.
    pub fn driver(driver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Driver {
            driver: driver.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt-file error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt(reason.into())
    }

    /// Create a read-only violation error for `target` (a key or backend name).
    pub fn read_only(target: impl Into<String>) -> Self {
        Self::ReadOnlyViolation {
            target: target.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
