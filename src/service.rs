//! Connection service: the operations callers use.
//!
//! Ties together the [`Resolver`] (opening stores), the
//! [`ConnectionRegistry`] (keyed handles) and the notes reader. Every
//! operation is synchronous; the `*_async` variants run it on tokio's
//! blocking pool for callers living on a runtime.
//!
//! # Example
//!
//! ```ignore
//! use tabula::{Config, ConnectionService, Params};
//!
//! let service = ConnectionService::new(&Config::default());
//! service.connect("scratch", "", false)?;
//! service.update("scratch", "CREATE TABLE t (id INTEGER)", &[])?;
//! let rows = service.query("scratch", "SELECT * FROM t", &Params::new())?;
//! service.disconnect("scratch")?;
//! ```

use crate::backend::{Params, Row};
use crate::config::Config;
use crate::create::create_database;
use crate::error::{Error, Result};
use crate::notes::{NotesReader, SidecarNotes};
use crate::registry::{ConnectionHandle, ConnectionInfo, ConnectionRegistry};
use crate::resolver::Resolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Connect, query, update and disconnect keyed databases.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct ConnectionService {
    registry: Arc<ConnectionRegistry>,
    resolver: Arc<Resolver>,
    notes: Arc<dyn NotesReader>,
    template: PathBuf,
}

impl std::fmt::Debug for ConnectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionService")
            .field("connections", &self.registry.len())
            .field("resolver", &self.resolver)
            .field("template", &self.template)
            .finish()
    }
}

impl ConnectionService {
    /// A service with a fresh registry and the standard resolver.
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            Arc::new(ConnectionRegistry::new()),
            Resolver::from_config(config),
            Arc::new(SidecarNotes::new(&config.notes.marker)),
            config.access_template(),
        )
    }

    /// A service over explicitly supplied collaborators.
    pub fn with_parts(
        registry: Arc<ConnectionRegistry>,
        resolver: Resolver,
        notes: Arc<dyn NotesReader>,
        template: PathBuf,
    ) -> Self {
        Self {
            registry,
            resolver: Arc::new(resolver),
            notes,
            template,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Template copied by [`Self::create_database`] for Access files.
    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Creates an empty database file.
    ///
    /// # Errors
    ///
    /// See [`create_database`].
    pub fn create_database(&self, target: &str) -> Result<String> {
        create_database(target, &self.template)
    }

    /// Opens `path` (empty for a transient in-memory store) under `key`.
    ///
    /// With `read_notes`, the sidecar notes are appended to the message; a
    /// failure to read them is reported in the message, not as an error.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] if `key` is taken (checked before opening
    /// anything and again when storing), [`Error::UnsupportedExtension`], or
    /// [`Error::ConnectionFailed`].
    pub fn connect(&self, key: &str, path: &str, read_notes: bool) -> Result<String> {
        if let Ok(existing) = self.registry.get(key) {
            return Err(Error::already_exists(key, existing.path()));
        }

        let backend = self.resolver.resolve(path)?;
        let handle = self.registry.put(ConnectionHandle::new(key, path, backend))?;
        tracing::info!(
            key,
            path,
            backend = handle.describe(),
            read_only = handle.is_read_only(),
            "connected"
        );

        let mut message = if handle.is_read_only() {
            format!("Successfully connected to the database with key '{key}' (read-only).")
        } else {
            format!("Successfully connected to the database with key '{key}'.")
        };
        if read_notes {
            message.push('\n');
            message.push_str(&self.notes_line(path));
        }
        Ok(message)
    }

    fn notes_line(&self, path: &str) -> String {
        if path.is_empty() {
            return "Notes: none (in-memory databases have no notes file)".to_string();
        }
        match self.notes.read_notes(Path::new(path)) {
            Ok(notes) => format!("Notes: {notes}"),
            Err(e) => {
                tracing::warn!(path, error = %e, "could not read notes");
                format!("Error reading notes: {e}")
            },
        }
    }

    /// Removes `key` and closes its backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if `key` is not registered.
    pub fn disconnect(&self, key: &str) -> Result<String> {
        let handle = self.registry.remove(key)?;
        handle.close();
        tracing::info!(key, path = handle.path(), "disconnected");
        Ok(format!("Disconnected from the database with key '{key}'."))
    }

    /// Key and path of every open connection.
    pub fn list_connections(&self) -> Vec<ConnectionInfo> {
        self.registry.list()
    }

    /// Runs a query with named parameters.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], or the backend's query error.
    pub fn query(&self, key: &str, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let handle = self.registry.get(key)?;
        tracing::debug!(key, backend = handle.describe(), params = params.len(), "query");
        let rows = handle.with_backend(|backend| backend.query(sql, params))?;
        tracing::debug!(key, rows = rows.len(), "query finished");
        Ok(rows)
    }

    /// Executes `sql` once per parameter set in one transaction.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], [`Error::ReadOnlyViolation`] for read-only
    /// handles (nothing is executed), or the backend's error after rollback.
    pub fn update(&self, key: &str, sql: &str, param_sets: &[Params]) -> Result<bool> {
        let handle = self.registry.get(key)?;
        if handle.is_read_only() {
            return Err(Error::read_only(format!("connection '{key}'")));
        }
        tracing::debug!(key, backend = handle.describe(), sets = param_sets.len(), "update");
        handle.with_backend(|backend| backend.update(sql, param_sets))?;
        Ok(true)
    }

    /// Disconnects everything.
    pub fn shutdown(&self) {
        let count = self.registry.len();
        self.registry.close_all();
        tracing::debug!(count, "closed all connections");
    }

    /// Async version of [`Self::connect`] that uses `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// As [`Self::connect`], or [`Error::Task`] if the task fails.
    pub async fn connect_async(
        &self,
        key: String,
        path: String,
        read_notes: bool,
    ) -> Result<String> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.connect(&key, &path, read_notes)).await?
    }

    /// Async version of [`Self::disconnect`] that uses `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// As [`Self::disconnect`], or [`Error::Task`] if the task fails.
    pub async fn disconnect_async(&self, key: String) -> Result<String> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.disconnect(&key)).await?
    }

    /// Async version of [`Self::query`] that uses `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// As [`Self::query`], or [`Error::Task`] if the task fails.
    pub async fn query_async(&self, key: String, sql: String, params: Params) -> Result<Vec<Row>> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.query(&key, &sql, &params)).await?
    }

    /// Async version of [`Self::update`] that uses `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// As [`Self::update`], or [`Error::Task`] if the task fails.
    pub async fn update_async(
        &self,
        key: String,
        sql: String,
        param_sets: Vec<Params>,
    ) -> Result<bool> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.update(&key, &sql, &param_sets)).await?
    }

    /// Async version of [`Self::create_database`] that uses `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// As [`Self::create_database`], or [`Error::Task`] if the task fails.
    pub async fn create_database_async(&self, target: String) -> Result<String> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.create_database(&target)).await?
    }
}
