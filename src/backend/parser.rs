//! Read-only backend over a structural file parser.
//!
//! The parser hands back whole tables column by column; this backend picks
//! the table out of the statement and transposes the columns into rows.
//! Only `SELECT <anything> FROM <table> [WHERE ...]` is accepted. Anything
//! else is rejected rather than guessed at.

use super::types::{Column, Params, Row, columns_to_rows};
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// `SELECT <projection> FROM <table><rest>`, table optionally `[..]`/`` `..` `` delimited.
static SELECT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*SELECT\s+(?P<projection>.+?)\s+FROM\s+(?:\[(?P<bracketed>[^\]]+)\]|`(?P<quoted>[^`]+)`|(?P<bare>[^\s,();\[\]`]+))(?P<rest>.*)$",
    )
    .expect("valid regex")
});

static WHERE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^WHERE\b").expect("valid regex"));

/// Table named by a parser-path statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectTarget {
    pub table: String,
    /// The statement listed columns instead of `*`.
    pub projected: bool,
    /// The statement carried a WHERE clause.
    pub filtered: bool,
}

/// Extracts the table name from `SELECT ... FROM <table> [WHERE ...]`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedQuery`] for any other statement shape,
/// including joins, comma-separated tables and trailing clauses other than
/// WHERE.
pub fn parse_select_target(sql: &str) -> Result<SelectTarget> {
    let caps = SELECT_FROM.captures(sql).ok_or_else(|| {
        Error::UnsupportedQuery(format!(
            "only SELECT ... FROM <table> [WHERE ...] is supported, got: {sql}"
        ))
    })?;

    let table = caps
        .name("bracketed")
        .or_else(|| caps.name("quoted"))
        .or_else(|| caps.name("bare"))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::UnsupportedQuery(format!("no table name found in: {sql}")))?;

    let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();
    let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
    let filtered = if rest.is_empty() {
        false
    } else if WHERE_CLAUSE.is_match(rest) {
        true
    } else {
        return Err(Error::UnsupportedQuery(format!(
            "unexpected clause after table '{table}': {rest}"
        )));
    };

    let projected = caps
        .name("projection")
        .is_some_and(|m| m.as_str().trim() != "*");

    Ok(SelectTarget {
        table,
        projected,
        filtered,
    })
}

/// A parser that can read a whole table column by column.
pub trait ColumnarSource: Send + 'static {
    /// Reads every column of `table`, values aligned by row position.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or cannot be decoded.
    fn read_table(&mut self, table: &str) -> Result<Vec<Column>>;
}

/// Read-only backend over a [`ColumnarSource`].
pub struct ParserBackend {
    name: String,
    source: Option<Box<dyn ColumnarSource>>,
}

impl std::fmt::Debug for ParserBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserBackend")
            .field("name", &self.name)
            .field("open", &self.source.is_some())
            .finish()
    }
}

impl ParserBackend {
    pub fn new<S: ColumnarSource>(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Answers a `SELECT ... FROM <table>` with every row of the table.
    ///
    /// Projection and WHERE are not evaluated; the whole table is returned.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ParametersNotSupported`] if `params` is non-empty,
    /// [`Error::UnsupportedQuery`] for other statement shapes, or the
    /// parser's error for unknown tables and undecodable data.
    pub fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        if !params.is_empty() {
            return Err(Error::ParametersNotSupported);
        }
        let target = parse_select_target(sql)?;
        if target.projected || target.filtered {
            tracing::warn!(
                table = %target.table,
                projected = target.projected,
                filtered = target.filtered,
                "read-only parser ignores column lists and WHERE clauses, returning the whole table"
            );
        }

        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::query(format!("{} is closed", self.name)))?;
        let columns = source.read_table(&target.table)?;
        Ok(columns_to_rows(&columns))
    }

    pub fn close(&mut self) {
        self.source = None;
    }
}
