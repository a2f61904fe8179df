//! Read-only structural parser for Jet 3 (Access 97) database files.
//!
//! Reads the file directly, with no driver: the system catalog
//! (`MSysObjects`) maps table names to their definition pages, and every
//! data page records which table owns it, so a table is read by scanning
//! the data pages it owns. Values come back column-oriented.
//!
//! Later revisions of the format (Jet 4 `.mdb`, ACE `.accdb`) are rejected.
//!
//! # Example
//!
//! ```ignore
//! use tabula::jet::JetFile;
//!
//! let file = JetFile::open("legacy.mdb")?;
//! for name in file.table_names() {
//!     let columns = file.read_table(&name)?;
//!     println!("{name}: {} columns", columns.len());
//! }
//! ```

mod page;
mod row;
mod tdef;

#[cfg(test)]
pub(crate) mod fixture;

use crate::backend::{Column, ColumnarSource, Value};
use crate::error::{Error, Result};
use page::{Pages, RowSlot, data_page_owner, pointed_row, row_count, row_slot, slice, u32_at};
use std::path::{Path, PathBuf};
use tdef::{TableDef, read_table_def};

/// Format signature at offset 4 of the header page.
const SIGNATURE: &[u8] = b"Standard Jet DB";
const SIGNATURE_OFFSET: usize = 4;
const VERSION_OFFSET: usize = 0x14;
const VERSION_JET3: u8 = 0x00;
const VERSION_JET4: u8 = 0x01;

/// `MSysObjects` definition always lives on page 2.
const CATALOG_PAGE: u32 = 2;
/// Catalog object type for local tables.
const OBJECT_TABLE: i64 = 1;
/// Catalog flags marking system and hidden tables.
const SYSTEM_FLAGS: i64 = 0x8000_0002;
/// Catalog ids carry the definition page in the low 24 bits.
const ID_PAGE_MASK: i64 = 0x00ff_ffff;

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    page: u32,
    system: bool,
}

/// An open Jet 3 file.
pub struct JetFile {
    path: PathBuf,
    pages: Pages,
    catalog: Vec<CatalogEntry>,
}

impl std::fmt::Debug for JetFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JetFile")
            .field("path", &self.path)
            .field("tables", &self.catalog.len())
            .finish()
    }
}

impl JetFile {
    /// Opens and validates a Jet 3 file, loading its catalog.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or
    /// [`Error::Corrupt`] if it is not a Jet 3 database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        Self::from_bytes(path, data)
    }

    /// Parses an in-memory image of a Jet 3 file; `path` labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if the bytes are not a Jet 3 database.
    pub fn from_bytes<P: AsRef<Path>>(path: P, data: Vec<u8>) -> Result<Self> {
        let pages = Pages::new(data)?;
        check_header(pages.page(0)?)?;

        let mut file = Self {
            path: path.as_ref().to_path_buf(),
            pages,
            catalog: Vec::new(),
        };
        file.catalog = file.load_catalog()?;
        tracing::debug!(
            path = %file.path.display(),
            pages = file.pages.count(),
            tables = file.catalog.len(),
            "opened Jet 3 file"
        );
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// User table names in catalog order (system and hidden tables excluded).
    pub fn table_names(&self) -> Vec<String> {
        self.catalog
            .iter()
            .filter(|e| !e.system)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Reads every column of a table. Names match case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] for an unknown table, or [`Error::Corrupt`]
    /// if the table's pages cannot be decoded.
    pub fn read_table(&self, name: &str) -> Result<Vec<Column>> {
        let entry = self
            .catalog
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                Error::query(format!(
                    "table '{name}' not found (available: {})",
                    self.table_names().join(", ")
                ))
            })?;
        let table = read_table_def(&self.pages, entry.page)?;
        self.read_columns(&table)
    }

    fn read_columns(&self, table: &TableDef) -> Result<Vec<Column>> {
        let mut columns: Vec<Column> = table
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), Vec::new()))
            .collect();

        for values in self.scan_rows(table)? {
            for (column, value) in columns.iter_mut().zip(values) {
                column.values.push(value);
            }
        }
        Ok(columns)
    }

    /// Decodes every live row on the data pages owned by `table`.
    ///
    /// Walks the usage map when it could be read, otherwise every page; in
    /// both cases only data pages naming `table` as owner are decoded.
    fn scan_rows(&self, table: &TableDef) -> Result<Vec<Vec<Value>>> {
        let candidates: Vec<u32> = match &table.data_pages {
            Some(pages) => pages.clone(),
            None => (1..self.pages.count()).collect(),
        };

        let mut rows = Vec::new();
        for page_no in candidates {
            let page = self.pages.page(page_no)?;
            if data_page_owner(page)? != Some(table.page) {
                continue;
            }
            for slot in 0..row_count(page)? {
                let bytes = match row_slot(page, slot)? {
                    RowSlot::Deleted => continue,
                    RowSlot::Live { start, end } => slice(page, start, end)?,
                    RowSlot::Overflow { start, .. } => {
                        pointed_row(&self.pages, u32_at(page, start)?)?
                    },
                };
                rows.push(row::decode_row(&self.pages, table, bytes)?);
            }
        }
        Ok(rows)
    }

    fn load_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let table = read_table_def(&self.pages, CATALOG_PAGE)?;
        let columns = self.read_columns(&table)?;
        let find = |name: &str| {
            columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::corrupt(format!("catalog has no '{name}' column")))
        };
        let (ids, names, types, flags) =
            (find("Id")?, find("Name")?, find("Type")?, find("Flags")?);

        let mut entries = Vec::new();
        for i in 0..ids.values.len() {
            let integer = |column: &Column| match column.values.get(i) {
                Some(Value::Integer(v)) => Some(*v),
                _ => None,
            };
            if integer(types) != Some(OBJECT_TABLE) {
                continue;
            }
            let (Some(id), Some(Value::Text(name))) = (integer(ids), names.values.get(i)) else {
                continue;
            };
            let flag_bits = integer(flags).unwrap_or(0);
            entries.push(CatalogEntry {
                name: name.clone(),
                page: u32::try_from(id & ID_PAGE_MASK).unwrap_or_default(),
                system: flag_bits & SYSTEM_FLAGS != 0,
            });
        }
        Ok(entries)
    }
}

fn check_header(header: &[u8]) -> Result<()> {
    let signature = slice(header, SIGNATURE_OFFSET, SIGNATURE_OFFSET + SIGNATURE.len())?;
    if signature != SIGNATURE {
        return Err(Error::corrupt("not a Jet database (missing 'Standard Jet DB' signature)"));
    }
    match page::u8_at(header, VERSION_OFFSET)? {
        VERSION_JET3 => Ok(()),
        VERSION_JET4 => Err(Error::corrupt(
            "Jet 4 (Access 2000-2003) files need an ODBC driver, only Jet 3 is parsed",
        )),
        other => Err(Error::corrupt(format!(
            "unsupported Jet version byte {other:#04x}, only Jet 3 is parsed"
        ))),
    }
}

impl ColumnarSource for JetFile {
    fn read_table(&mut self, table: &str) -> Result<Vec<Column>> {
        JetFile::read_table(self, table)
    }
}
