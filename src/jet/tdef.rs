//! Table definition (TDEF) pages: column layout of one table.

use super::page::{PAGE_SIZE, PAGE_TDEF, Pages, pointed_row, slice, u8_at, u16_at, u32_at};
use crate::error::{Error, Result};

/// Continuation pointer to the next TDEF page.
const TDEF_NEXT_PAGE: usize = 0x04;
const TDEF_NUM_COLS: usize = 0x19;
const TDEF_NUM_REAL_IDX: usize = 0x1f;
/// Row pointer to the usage map listing the table's data pages.
const TDEF_USAGE_MAP: usize = 0x23;
/// Real index entries, then column entries, start here.
const TDEF_COLS_START: usize = 0x2b;
const REAL_IDX_ENTRY_SIZE: usize = 8;

const COL_ENTRY_SIZE: usize = 18;
const COL_TYPE: usize = 0;
const COL_NUM: usize = 1;
const COL_VAR_INDEX: usize = 3;
const COL_FLAGS: usize = 13;
const COL_FIXED_OFFSET: usize = 14;
const COL_LEN: usize = 16;

const FLAG_FIXED: u8 = 0x01;

const MAP_INLINE: u8 = 0x00;
const MAP_REFERENCE: u8 = 0x01;
/// Inline maps: type byte then the first page the bitmap covers.
const MAP_INLINE_BITMAP: usize = 5;
/// Reference map pages carry their bitmap after a 4-byte header.
const MAP_PAGE_BITMAP: usize = 4;

/// Header bytes repeated on every continuation page.
const CONTINUATION_HEADER: usize = 8;

/// Column storage types.
pub(crate) mod col_type {
    pub const BOOL: u8 = 0x01;
    pub const BYTE: u8 = 0x02;
    pub const INT: u8 = 0x03;
    pub const LONG: u8 = 0x04;
    pub const MONEY: u8 = 0x05;
    pub const FLOAT: u8 = 0x06;
    pub const DOUBLE: u8 = 0x07;
    pub const DATETIME: u8 = 0x08;
    pub const BINARY: u8 = 0x09;
    pub const TEXT: u8 = 0x0a;
    pub const OLE: u8 = 0x0b;
    pub const MEMO: u8 = 0x0c;
    pub const GUID: u8 = 0x0f;
    pub const NUMERIC: u8 = 0x10;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnDef {
    pub name: String,
    pub col_type: u8,
    /// Position in the row's null mask.
    pub col_num: u16,
    /// Index into the row's variable-length offset table.
    pub var_index: u16,
    /// Offset of fixed-length data after the column-count byte.
    pub fixed_offset: u16,
    pub len: u16,
    pub fixed: bool,
}

impl ColumnDef {
    /// Bytes a fixed-length value occupies in the row.
    pub(crate) fn fixed_size(&self) -> usize {
        match self.col_type {
            col_type::BOOL => 0,
            col_type::BYTE => 1,
            col_type::INT => 2,
            col_type::LONG | col_type::FLOAT => 4,
            col_type::MONEY | col_type::DOUBLE | col_type::DATETIME => 8,
            col_type::GUID => 16,
            col_type::NUMERIC => 17,
            _ => usize::from(self.len),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TableDef {
    pub page: u32,
    /// Columns ordered by column number.
    pub columns: Vec<ColumnDef>,
    /// Data pages from the usage map, or None when the map is unreadable.
    pub data_pages: Option<Vec<u32>>,
}

/// Jet 3 names are single-byte; decode as Latin-1.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Concatenates a TDEF page with its continuation pages.
fn read_definition_bytes(pages: &Pages, first: u32) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(PAGE_SIZE);
    let mut next = first;
    let mut visited = 0u32;

    while next != 0 {
        if visited > pages.count() {
            return Err(Error::corrupt(format!(
                "table definition at page {first} has a continuation loop"
            )));
        }
        let page = pages.page(next)?;
        if u8_at(page, 0)? != PAGE_TDEF {
            return Err(Error::corrupt(format!(
                "page {next} is not a table definition page"
            )));
        }
        if buf.is_empty() {
            buf.extend_from_slice(page);
        } else {
            buf.extend_from_slice(&page[CONTINUATION_HEADER..]);
        }
        next = u32_at(page, TDEF_NEXT_PAGE)?;
        visited += 1;
    }

    Ok(buf)
}

/// Reads the table definition rooted at `page`.
pub(crate) fn read_table_def(pages: &Pages, page: u32) -> Result<TableDef> {
    let buf = read_definition_bytes(pages, page)?;
    let num_cols = usize::from(u16_at(&buf, TDEF_NUM_COLS)?);
    let num_real_idx = u32_at(&buf, TDEF_NUM_REAL_IDX)? as usize;
    if num_real_idx > buf.len() / REAL_IDX_ENTRY_SIZE {
        return Err(Error::corrupt(format!(
            "table definition at page {page} claims {num_real_idx} indexes"
        )));
    }

    let mut cursor = TDEF_COLS_START + num_real_idx * REAL_IDX_ENTRY_SIZE;
    let mut columns = Vec::with_capacity(num_cols);
    for _ in 0..num_cols {
        let entry = slice(&buf, cursor, cursor + COL_ENTRY_SIZE)?;
        columns.push(ColumnDef {
            name: String::new(),
            col_type: u8_at(entry, COL_TYPE)?,
            col_num: u16_at(entry, COL_NUM)?,
            var_index: u16_at(entry, COL_VAR_INDEX)?,
            fixed_offset: u16_at(entry, COL_FIXED_OFFSET)?,
            len: u16_at(entry, COL_LEN)?,
            fixed: u8_at(entry, COL_FLAGS)? & FLAG_FIXED != 0,
        });
        cursor += COL_ENTRY_SIZE;
    }

    for column in &mut columns {
        let len = usize::from(u8_at(&buf, cursor)?);
        column.name = decode_latin1(slice(&buf, cursor + 1, cursor + 1 + len)?);
        cursor += 1 + len;
    }

    columns.sort_by_key(|c| c.col_num);
    let data_pages = match read_usage_map(pages, u32_at(&buf, TDEF_USAGE_MAP)?) {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(page, error = %e, "usage map unreadable, scanning all pages");
            None
        },
    };

    Ok(TableDef {
        page,
        columns,
        data_pages,
    })
}

fn set_bits(bitmap: &[u8], first_page: u32, out: &mut Vec<u32>) {
    for (byte_idx, byte) in bitmap.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                let index = u32::try_from(byte_idx * 8 + bit).unwrap_or(u32::MAX);
                out.push(first_page.saturating_add(index));
            }
        }
    }
}

/// Pages flagged in a usage map.
///
/// Inline maps hold a bitmap relative to a start page; reference maps hold
/// pointers to bitmap pages, each covering a fixed run of pages.
fn read_usage_map(pages: &Pages, pointer: u32) -> Result<Option<Vec<u32>>> {
    let map = pointed_row(pages, pointer)?;
    let mut found = Vec::new();

    match u8_at(map, 0)? {
        MAP_INLINE => {
            let first_page = u32_at(map, 1)?;
            set_bits(slice(map, MAP_INLINE_BITMAP, map.len())?, first_page, &mut found);
        },
        MAP_REFERENCE => {
            let pages_per_map =
                u32::try_from((PAGE_SIZE - MAP_PAGE_BITMAP) * 8).unwrap_or(u32::MAX);
            for (index, chunk) in map[1..].chunks_exact(4).enumerate() {
                let map_page = u32_at(chunk, 0)?;
                if map_page == 0 {
                    continue;
                }
                let bitmap = &pages.page(map_page)?[MAP_PAGE_BITMAP..];
                let first_page = u32::try_from(index)
                    .unwrap_or(u32::MAX)
                    .saturating_mul(pages_per_map);
                set_bits(bitmap, first_page, &mut found);
            }
        },
        _ => return Ok(None),
    }

    found.retain(|&p| p < pages.count());
    Ok(Some(found))
}
