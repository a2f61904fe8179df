//! SQLite engine over a file or a transient in-memory database.

use super::SqlEngine;
use super::types::{Params, Row, Value};
use crate::error::{Error, Result};
use rusqlite::{Connection, Statement};
use std::path::Path;

/// Engine name used in logs and errors.
const ENGINE_NAME: &str = "sqlite";

/// SQLite-backed [`SqlEngine`].
///
/// Named parameters use `:name`, `@name` or `$name` placeholders and are
/// looked up in [`Params`] without their prefix.
pub struct SqliteEngine {
    conn: Option<Connection>,
    location: String,
}

impl SqliteEngine {
    /// Opens (creating if needed) a SQLite database file.
    ///
    /// # Errors
    ///
    /// Returns a driver error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::driver(ENGINE_NAME, e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            location: path.display().to_string(),
        })
    }

    /// Opens a transient in-memory database, discarded on close.
    ///
    /// # Errors
    ///
    /// Returns a driver error if SQLite cannot allocate the database.
    pub fn memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::driver(ENGINE_NAME, e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            location: ":memory:".to_string(),
        })
    }

    /// Where this engine's data lives (`:memory:` for transient stores).
    pub fn location(&self) -> &str {
        &self.location
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::query("sqlite connection is closed"))
    }
}

/// Binds every placeholder in `stmt` from `params`.
///
/// Values not referenced by the statement are ignored; a placeholder with
/// no value, or a positional `?`, is an error.
fn bind_named(stmt: &mut Statement<'_>, params: &Params) -> Result<()> {
    stmt.clear_bindings();
    for idx in 1..=stmt.parameter_count() {
        let name = stmt
            .parameter_name(idx)
            .ok_or_else(|| {
                Error::query(format!(
                    "positional parameter #{idx} is not supported, use :name placeholders"
                ))
            })?
            .to_string();
        let key = name.trim_start_matches([':', '@', '$']);
        let value = params
            .get(key)
            .ok_or_else(|| Error::query(format!("missing value for parameter '{name}'")))?;
        stmt.raw_bind_parameter(idx, value.to_rusqlite())?;
    }
    Ok(())
}

impl SqlEngine for SqliteEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let conn = self.conn_mut()?;
        let mut stmt = conn.prepare(sql)?;
        bind_named(&mut stmt, params)?;

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = stmt.raw_query();
        let mut results = Vec::new();

        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            results.push(Row::new(columns.clone(), values));
        }

        Ok(results)
    }

    fn update(&mut self, sql: &str, param_sets: &[Params]) -> Result<()> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(sql)?;
            if param_sets.is_empty() {
                bind_named(&mut stmt, &Params::new())?;
                stmt.raw_execute()?;
            }
            for params in param_sets {
                bind_named(&mut stmt, params)?;
                stmt.raw_execute()?;
            }
        }
        // Dropping `tx` without commit rolls back every execution above.
        tx.commit()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err((_, e)) = conn.close()
        {
            tracing::warn!(location = %self.location, error = %e, "sqlite close reported an error");
        }
    }
}

impl Drop for SqliteEngine {
    fn drop(&mut self) {
        self.close();
    }
}
