//! Keyed connections to SQLite and legacy Access databases.
//!
//! A caller opens a store under a key, then queries and updates it by key.
//! SQLite files (and the in-memory store) run on an embedded engine.
//! Access files go through a fallback chain: ODBC drivers first, then a
//! read-only structural parser for the oldest file revision.
//!
//! # Example
//!
//! ```ignore
//! use tabula::{Config, ConnectionService, Params, Value};
//!
//! let service = ConnectionService::new(&Config::resolve(None)?);
//! println!("{}", service.connect("sales", "data/sales.db", true)?);
//!
//! let mut params = Params::new();
//! params.insert("region".into(), Value::from("north"));
//! let rows = service.query("sales", "SELECT * FROM orders WHERE region = :region", &params)?;
//! println!("{}", serde_json::to_string(&rows)?);
//!
//! service.disconnect("sales")?;
//! ```

#![deny(unsafe_code)]

pub mod backend;
pub mod config;
pub mod create;
pub mod error;
pub mod jet;
pub mod notes;
pub mod registry;
pub mod resolver;
pub mod service;

pub use backend::{Backend, BackendKind, Params, Row, Value};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use registry::{ConnectionHandle, ConnectionInfo, ConnectionRegistry};
pub use service::ConnectionService;
