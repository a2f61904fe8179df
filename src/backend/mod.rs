//! Backend capability: the contract every connected store satisfies.
//!
//! A connected store is exactly one of two kinds, fixed when it is opened:
//!
//! - **SQL engine** ([`Backend::Sql`]): a full SQL engine behind the
//!   [`SqlEngine`] trait. SQLite always; the ODBC-driven Access engine
//!   with the `odbc` feature. Read-write.
//! - **Parser** ([`Backend::Parser`]): a structural file parser that
//!   only answers `SELECT ... FROM <table> [WHERE ...]`. Read-only.
//!
//! Both normalize results to [`Row`] records.
//!
//! # Example
//!
//! ```ignore
//! use tabula::backend::{Backend, Params, SqliteEngine};
//!
//! let mut backend = Backend::Sql(Box::new(SqliteEngine::memory()?));
//! backend.update("CREATE TABLE t (id INTEGER)", &[])?;
//! let rows = backend.query("SELECT * FROM t", &Params::new())?;
//! ```

#[cfg(feature = "odbc")]
mod odbc;
mod parser;
mod placeholders;
mod sqlite;
mod types;

#[cfg(feature = "odbc")]
pub use odbc::OdbcEngine;
pub use parser::{ColumnarSource, ParserBackend, SelectTarget, parse_select_target};
pub use placeholders::to_positional;
pub use sqlite::SqliteEngine;
pub use types::{Column, Params, Row, Value, columns_to_rows};

use crate::error::{Error, Result};

/// Statement used to verify a freshly opened SQL engine.
pub const LIVENESS_PROBE: &str = "SELECT 1";

/// A read-write SQL engine.
///
/// Engines are owned by exactly one connection handle, which serializes
/// access, so methods take `&mut self` and implementations need only be
/// `Send`.
pub trait SqlEngine: Send + 'static {
    /// Short engine name for logs and error messages.
    fn name(&self) -> &str;

    /// Runs a statement and returns its result rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] on a malformed statement, a missing named
    /// parameter, or a driver failure.
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    /// Executes `sql` once per parameter set inside one transaction.
    ///
    /// An empty `param_sets` executes the statement once without
    /// parameters. Any failing execution rolls back the whole call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] if any execution fails.
    fn update(&mut self, sql: &str, param_sets: &[Params]) -> Result<()>;

    /// Releases the underlying session. Calling it twice is a no-op.
    fn close(&mut self);

    /// Round-trips [`LIVENESS_PROBE`] to prove the session is usable.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the probe fails.
    fn probe(&mut self) -> Result<()> {
        self.query(LIVENESS_PROBE, &Params::new()).map(|_| ())
    }
}

/// Backend kind, fixed at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    SqlEngine,
    Parser,
}

impl BackendKind {
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Parser)
    }
}

/// A connected store.
pub enum Backend {
    Sql(Box<dyn SqlEngine>),
    Parser(ParserBackend),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(engine) => f.debug_tuple("Sql").field(&engine.name()).finish(),
            Self::Parser(parser) => f.debug_tuple("Parser").field(parser).finish(),
        }
    }
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Sql(_) => BackendKind::SqlEngine,
            Self::Parser(_) => BackendKind::Parser,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.kind().is_read_only()
    }

    /// Name of the engine or parser serving this backend.
    pub fn describe(&self) -> &str {
        match self {
            Self::Sql(engine) => engine.name(),
            Self::Parser(parser) => parser.name(),
        }
    }

    /// Runs a query against whichever kind this is.
    ///
    /// # Errors
    ///
    /// SQL engines fail with [`Error::Query`]; the parser additionally fails
    /// with [`Error::ParametersNotSupported`] or [`Error::UnsupportedQuery`].
    pub fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        match self {
            Self::Sql(engine) => engine.query(sql, params),
            Self::Parser(parser) => parser.query(sql, params),
        }
    }

    /// Runs a transactional update.
    ///
    /// # Errors
    ///
    /// Parser backends always fail with [`Error::ReadOnlyViolation`].
    pub fn update(&mut self, sql: &str, param_sets: &[Params]) -> Result<()> {
        match self {
            Self::Sql(engine) => engine.update(sql, param_sets),
            Self::Parser(parser) => Err(Error::read_only(parser.name())),
        }
    }

    pub fn close(&mut self) {
        match self {
            Self::Sql(engine) => engine.close(),
            Self::Parser(parser) => parser.close(),
        }
    }
}
