//! Keyed registry of live connections.
//!
//! One handle per key. Puts are atomic put-if-absent, removes hand the handle
//! back for cleanup. Each handle guards its backend with a mutex holding
//! `Option<Backend>`: closing takes the backend out, so an operation that
//! raced a disconnect sees "not connected" instead of a half-closed backend.
//!
//! # Thread Safety
//!
//! [`ConnectionRegistry`] uses `DashMap` internally and is shared behind an
//! `Arc`; handles are `Arc`s so a lookup stays valid after removal.

use crate::backend::{Backend, BackendKind};
use crate::error::{Error, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A live connection under a caller-chosen key.
pub struct ConnectionHandle {
    key: String,
    path: String,
    kind: BackendKind,
    description: String,
    backend: Mutex<Option<Backend>>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("open", &!self.is_closed())
            .finish()
    }
}

impl ConnectionHandle {
    /// Wraps an opened backend. `path` is empty for in-memory stores.
    pub fn new(key: impl Into<String>, path: impl Into<String>, backend: Backend) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            kind: backend.kind(),
            description: backend.describe().to_string(),
            backend: Mutex::new(Some(backend)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Backend kind, fixed for the handle's lifetime.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn is_read_only(&self) -> bool {
        self.kind.is_read_only()
    }

    /// Engine or parser name serving this handle.
    pub fn describe(&self) -> &str {
        &self.description
    }

    pub fn is_closed(&self) -> bool {
        self.backend.lock().is_none()
    }

    /// Runs `f` with exclusive access to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the handle was closed, otherwise
    /// whatever `f` returns.
    pub fn with_backend<T>(&self, f: impl FnOnce(&mut Backend) -> Result<T>) -> Result<T> {
        let mut guard = self.backend.lock();
        let backend = guard
            .as_mut()
            .ok_or_else(|| Error::not_connected(&self.key))?;
        f(backend)
    }

    /// Closes the backend. Later calls are no-ops.
    pub fn close(&self) {
        // Waits for any in-flight operation to finish first.
        if let Some(mut backend) = self.backend.lock().take() {
            backend.close();
            tracing::debug!(key = %self.key, backend = %self.description, "backend closed");
        }
    }
}

/// Key and source path of a registered connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub key: String,
    pub path: String,
}

/// Process-wide map from key to live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    handles: DashMap<String, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` under its key if the key is free.
    ///
    /// A rejected handle is closed; the existing one is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] naming the existing handle's path.
    pub fn put(&self, handle: ConnectionHandle) -> Result<Arc<ConnectionHandle>> {
        match self.handles.entry(handle.key.clone()) {
            Entry::Occupied(existing) => {
                let err = Error::already_exists(&handle.key, existing.get().path());
                drop(existing);
                handle.close();
                Err(err)
            },
            Entry::Vacant(slot) => {
                let handle = Arc::new(handle);
                slot.insert(Arc::clone(&handle));
                Ok(handle)
            },
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if nothing is registered under `key`.
    pub fn get(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
        self.handles
            .get(key)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| Error::not_connected(key))
    }

    /// Removes and returns the handle; the caller closes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if nothing is registered under `key`.
    pub fn remove(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
        self.handles
            .remove(key)
            .map(|(_, handle)| handle)
            .ok_or_else(|| Error::not_connected(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handles.contains_key(key)
    }

    /// Snapshot of every registered connection, ordered by key.
    pub fn list(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .handles
            .iter()
            .map(|entry| ConnectionInfo {
                key: entry.key().clone(),
                path: entry.value().path().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Removes and closes every handle.
    pub fn close_all(&self) {
        let keys: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, handle)) = self.handles.remove(&key) {
                handle.close();
            }
        }
    }
}
