//! Connection methods tried, in order, for Access files.

use super::StoreKind;
use crate::backend::{Backend, ParserBackend};
use crate::error::Result;
use crate::jet::JetFile;
use std::path::Path;

/// One way of opening an Access file.
pub trait ConnectAttempt: Send + Sync {
    /// Label used in logs and in the combined failure message.
    fn label(&self) -> &str;

    /// Whether this method is tried for files of `kind`.
    fn applies_to(&self, kind: StoreKind) -> bool;

    /// Opens the file. SQL engines are probed by the caller afterwards.
    ///
    /// # Errors
    ///
    /// Returns the reason this method could not open the file.
    fn open(&self, path: &Path) -> Result<Backend>;
}

/// Opens the file through a named ODBC driver.
#[derive(Debug, Clone)]
pub struct OdbcAttempt {
    driver: String,
    mdb_only: bool,
}

impl OdbcAttempt {
    /// Current-generation driver, tried for `.mdb` and `.accdb`.
    pub fn modern(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            mdb_only: false,
        }
    }

    /// Older driver that only understands `.mdb`.
    pub fn legacy(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            mdb_only: true,
        }
    }
}

impl ConnectAttempt for OdbcAttempt {
    fn label(&self) -> &str {
        &self.driver
    }

    fn applies_to(&self, kind: StoreKind) -> bool {
        match kind {
            StoreKind::Mdb => true,
            StoreKind::Accdb => !self.mdb_only,
            StoreKind::Memory | StoreKind::Sqlite => false,
        }
    }

    #[cfg(feature = "odbc")]
    fn open(&self, path: &Path) -> Result<Backend> {
        let engine = crate::backend::OdbcEngine::open(&self.driver, path)?;
        Ok(Backend::Sql(Box::new(engine)))
    }

    #[cfg(not(feature = "odbc"))]
    fn open(&self, _path: &Path) -> Result<Backend> {
        Err(crate::error::Error::driver(
            &self.driver,
            "built without ODBC support (enable the `odbc` feature)",
        ))
    }
}

/// Name reported by parser-backed handles.
pub const JET_PARSER_NAME: &str = "Jet 3 parser";

/// Reads the file directly with the structural Jet 3 parser. Read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct JetParserAttempt;

impl ConnectAttempt for JetParserAttempt {
    fn label(&self) -> &str {
        JET_PARSER_NAME
    }

    fn applies_to(&self, kind: StoreKind) -> bool {
        kind.is_access()
    }

    fn open(&self, path: &Path) -> Result<Backend> {
        let file = JetFile::open(path)?;
        Ok(Backend::Parser(ParserBackend::new(JET_PARSER_NAME, file)))
    }
}
