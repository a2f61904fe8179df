//! ODBC-driven SQL engine for Access `.mdb`/`.accdb` files.
//!
//! Drivers take positional `?` placeholders, so `:name` placeholders are
//! rewritten first and values bound in placeholder order.

use super::SqlEngine;
use super::placeholders::to_positional;
use super::types::{Params, Row, Value};
use crate::error::{Error, Result};
use odbc_api::parameter::{InputParameter, VarCharBox};
use odbc_api::{
    Bit, Connection, ConnectionOptions, Cursor, DataType, Environment, IntoParameter, Nullable,
};
use std::path::Path;
use std::sync::OnceLock;

/// One driver-manager environment for the whole process.
static ENVIRONMENT: OnceLock<std::result::Result<Environment, String>> = OnceLock::new();

fn environment() -> Result<&'static Environment> {
    ENVIRONMENT
        .get_or_init(|| Environment::new().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| Error::driver("odbc", format!("driver manager unavailable: {e}")))
}

/// Access database opened through a named ODBC driver.
pub struct OdbcEngine {
    conn: Option<Connection<'static>>,
    driver: String,
}

impl OdbcEngine {
    /// Connects with `DRIVER={driver};DBQ=path;`.
    ///
    /// # Errors
    ///
    /// Returns a driver error naming `driver` if the connection is refused.
    pub fn open<P: AsRef<Path>>(driver: &str, path: P) -> Result<Self> {
        let conn_str = format!("DRIVER={{{driver}}};DBQ={};", path.as_ref().display());
        let conn = environment()?
            .connect_with_connection_string(&conn_str, ConnectionOptions::default())
            .map_err(|e| Error::driver(driver, e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            driver: driver.to_string(),
        })
    }

    fn conn(&self) -> Result<&Connection<'static>> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::query(format!("{} connection is closed", self.driver)))
    }
}

fn bind(sql: &str, params: &Params) -> Result<(String, Vec<Box<dyn InputParameter>>)> {
    let (sql, names) = to_positional(sql);
    let bound = names
        .iter()
        .map(|name| {
            let value = params
                .get(name)
                .ok_or_else(|| Error::query(format!("missing value for parameter ':{name}'")))?;
            Ok(to_parameter(value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((sql, bound))
}

fn to_parameter(value: &Value) -> Box<dyn InputParameter> {
    match value {
        Value::Null => Box::new(VarCharBox::null()),
        Value::Bool(b) => Box::new(Bit::from_bool(*b)),
        Value::Integer(i) => Box::new(*i),
        Value::Real(f) => Box::new(*f),
        Value::Text(s) => Box::new(s.clone().into_parameter()),
        Value::Blob(b) => Box::new(b.clone().into_parameter()),
    }
}

fn odbc_error(e: odbc_api::Error) -> Error {
    Error::query(e.to_string())
}

fn read_rows(mut cursor: impl Cursor) -> Result<Vec<Row>> {
    let num_cols = cursor.num_result_cols().map_err(odbc_error)?;
    let mut columns = Vec::new();
    let mut types = Vec::new();
    for i in 1..=num_cols {
        let col = u16::try_from(i).map_err(|_| Error::query("negative column count"))?;
        columns.push(cursor.col_name(col).map_err(odbc_error)?);
        types.push(cursor.col_data_type(col).map_err(odbc_error)?);
    }

    let mut rows = Vec::new();
    while let Some(mut row) = cursor.next_row().map_err(odbc_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for (i, data_type) in types.iter().enumerate() {
            let col = u16::try_from(i + 1).map_err(|_| Error::query("too many columns"))?;
            let value = match data_type {
                DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => {
                    let mut cell = Nullable::<i64>::null();
                    row.get_data(col, &mut cell).map_err(odbc_error)?;
                    cell.into_opt().map_or(Value::Null, Value::Integer)
                },
                DataType::Real | DataType::Float { .. } | DataType::Double => {
                    let mut cell = Nullable::<f64>::null();
                    row.get_data(col, &mut cell).map_err(odbc_error)?;
                    cell.into_opt().map_or(Value::Null, Value::Real)
                },
                DataType::Bit => {
                    let mut cell = Nullable::<i64>::null();
                    row.get_data(col, &mut cell).map_err(odbc_error)?;
                    cell.into_opt().map_or(Value::Null, |b| Value::Bool(b != 0))
                },
                DataType::Binary { .. }
                | DataType::Varbinary { .. }
                | DataType::LongVarbinary { .. } => {
                    let mut buf = Vec::new();
                    if row.get_binary(col, &mut buf).map_err(odbc_error)? {
                        Value::Blob(buf)
                    } else {
                        Value::Null
                    }
                },
                _ => {
                    let mut buf = Vec::new();
                    if row.get_text(col, &mut buf).map_err(odbc_error)? {
                        Value::Text(String::from_utf8_lossy(&buf).into_owned())
                    } else {
                        Value::Null
                    }
                },
            };
            values.push(value);
        }
        rows.push(Row::new(columns.clone(), values));
    }
    Ok(rows)
}

impl SqlEngine for OdbcEngine {
    fn name(&self) -> &str {
        &self.driver
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let (sql, bound) = bind(sql, params)?;
        match self.conn()?.execute(&sql, bound.as_slice()).map_err(odbc_error)? {
            Some(cursor) => read_rows(cursor),
            None => Ok(Vec::new()),
        }
    }

    fn update(&mut self, sql: &str, param_sets: &[Params]) -> Result<()> {
        let conn = self.conn()?;
        conn.set_autocommit(false).map_err(odbc_error)?;

        let empty = [Params::new()];
        let sets = if param_sets.is_empty() { &empty[..] } else { param_sets };
        let outcome = sets.iter().try_for_each(|params| {
            let (sql, bound) = bind(sql, params)?;
            conn.execute(&sql, bound.as_slice())
                .map(|_| ())
                .map_err(odbc_error)
        });

        let finished = match &outcome {
            Ok(()) => conn.commit(),
            Err(_) => conn.rollback(),
        };
        let restored = conn.set_autocommit(true);
        outcome?;
        finished.map_err(odbc_error)?;
        restored.map_err(odbc_error)
    }

    fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!(driver = %self.driver, "ODBC connection released");
        }
    }
}

impl Drop for OdbcEngine {
    fn drop(&mut self) {
        self.close();
    }
}
