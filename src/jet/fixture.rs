//! Builds small Jet 3 images for tests.
//!
//! Layout: header on page 0, usage maps on page 1, the catalog definition
//! and its data on pages 2 and 3, then three pages per user table
//! (definition, data, and an extra page holding long values and overflow
//! targets). Reference usage maps, when requested, are appended last.

use super::page::{PAGE_DATA, PAGE_SIZE, PAGE_TDEF};
pub(crate) use super::tdef::col_type;
use crate::backend::Value;
use std::path::Path;

const FIRST_TABLE_PAGE: u32 = 4;
const PAGES_PER_TABLE: u32 = 3;
const MAP_PAGE: u32 = 1;
const CATALOG_TDEF: u32 = 2;
const CATALOG_DATA: u32 = 3;

/// Memo text up to this length is stored inline in the row.
const INLINE_MEMO_MAX: usize = 64;
/// Memo text beyond this length is split across a chain of two rows.
const SINGLE_PAGE_MEMO_MAX: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Live,
    Deleted,
    Overflow,
}

/// One user table: columns in column-number order and its rows.
#[derive(Debug, Clone)]
pub(crate) struct FixtureTable {
    name: String,
    columns: Vec<(String, u8)>,
    rows: Vec<(Storage, Vec<Value>)>,
    system: bool,
}

impl FixtureTable {
    pub(crate) fn new(name: &str, columns: &[(&str, u8)]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| ((*n).to_string(), *t))
                .collect(),
            rows: Vec::new(),
            system: false,
        }
    }

    pub(crate) fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push((Storage::Live, values));
        self
    }

    /// A row present on the page but flagged deleted.
    pub(crate) fn deleted_row(mut self, values: Vec<Value>) -> Self {
        self.rows.push((Storage::Deleted, values));
        self
    }

    /// A row moved to another page, leaving a pointer behind.
    pub(crate) fn overflow_row(mut self, values: Vec<Value>) -> Self {
        self.rows.push((Storage::Overflow, values));
        self
    }

    /// Flag the table as a hidden system table in the catalog.
    pub(crate) fn system(mut self) -> Self {
        self.system = true;
        self
    }
}

#[derive(Debug, Clone)]
struct Layout {
    col_type: u8,
    col_num: u16,
    var_index: u16,
    fixed_offset: u16,
    len: u16,
    fixed: bool,
}

fn fixed_size(col_type: u8) -> Option<usize> {
    match col_type {
        col_type::BOOL => Some(0),
        col_type::BYTE => Some(1),
        col_type::INT => Some(2),
        col_type::LONG | col_type::FLOAT => Some(4),
        col_type::MONEY | col_type::DOUBLE | col_type::DATETIME => Some(8),
        col_type::GUID => Some(16),
        _ => None,
    }
}

fn layout(columns: &[(String, u8)]) -> (Vec<Layout>, usize, usize) {
    let mut out = Vec::new();
    let (mut fixed_total, mut var_count) = (0usize, 0usize);
    for (i, (_, ty)) in columns.iter().enumerate() {
        match fixed_size(*ty) {
            Some(size) => {
                out.push(Layout {
                    col_type: *ty,
                    col_num: i as u16,
                    var_index: 0,
                    fixed_offset: fixed_total as u16,
                    len: size as u16,
                    fixed: true,
                });
                fixed_total += size;
            },
            None => {
                out.push(Layout {
                    col_type: *ty,
                    col_num: i as u16,
                    var_index: var_count as u16,
                    fixed_offset: 0,
                    len: 255,
                    fixed: false,
                });
                var_count += 1;
            },
        }
    }
    (out, fixed_total, var_count)
}

/// Rows collected for one data page.
#[derive(Debug, Default)]
struct PageRows {
    rows: Vec<(Vec<u8>, u16)>,
}

impl PageRows {
    /// Adds a row and returns its index on the page.
    fn push(&mut self, bytes: Vec<u8>, flags: u16) -> u32 {
        self.rows.push((bytes, flags));
        (self.rows.len() - 1) as u32
    }

    fn render(&self, owner: u32) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = PAGE_DATA;
        page[1] = 0x01;
        page[4..8].copy_from_slice(&owner.to_le_bytes());
        page[8..10].copy_from_slice(&(self.rows.len() as u16).to_le_bytes());

        let mut end = PAGE_SIZE;
        for (i, (bytes, flags)) in self.rows.iter().enumerate() {
            let start = end - bytes.len();
            assert!(start >= 0x0a + 2 * self.rows.len(), "fixture rows overflow the page");
            page[start..end].copy_from_slice(bytes);
            let slot = 0x0a + i * 2;
            page[slot..slot + 2].copy_from_slice(&(start as u16 | flags).to_le_bytes());
            end = start;
        }
        page
    }
}

fn pointer(page: u32, row: u32) -> u32 {
    (page << 8) | row
}

fn encode_memo(text: &str, extra_page: u32, extra: &mut PageRows) -> Vec<u8> {
    let bytes: Vec<u8> = text.chars().map(|c| c as u8).collect();
    let len = bytes.len() as u32;
    let mut field = Vec::with_capacity(12 + bytes.len());

    if bytes.len() <= INLINE_MEMO_MAX {
        field.extend_from_slice(&(len | 0x8000_0000).to_le_bytes());
        field.extend_from_slice(&[0; 8]);
        field.extend_from_slice(&bytes);
    } else if bytes.len() <= SINGLE_PAGE_MEMO_MAX {
        let row = extra.push(bytes, 0);
        field.extend_from_slice(&(len | 0x4000_0000).to_le_bytes());
        field.extend_from_slice(&pointer(extra_page, row).to_le_bytes());
        field.extend_from_slice(&[0; 4]);
    } else {
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        let mut second = 0u32.to_le_bytes().to_vec();
        second.extend_from_slice(tail);
        let second_row = extra.push(second, 0);
        let mut first = pointer(extra_page, second_row).to_le_bytes().to_vec();
        first.extend_from_slice(head);
        let first_row = extra.push(first, 0);
        field.extend_from_slice(&len.to_le_bytes());
        field.extend_from_slice(&pointer(extra_page, first_row).to_le_bytes());
        field.extend_from_slice(&[0; 4]);
    }
    field
}

fn encode_fixed(ty: u8, value: &Value) -> Vec<u8> {
    match (ty, value) {
        (col_type::BYTE, Value::Integer(v)) => vec![*v as u8],
        (col_type::INT, Value::Integer(v)) => (*v as i16).to_le_bytes().to_vec(),
        (col_type::LONG, Value::Integer(v)) => (*v as i32).to_le_bytes().to_vec(),
        (col_type::FLOAT, Value::Real(v)) => (*v as f32).to_le_bytes().to_vec(),
        (col_type::DOUBLE | col_type::DATETIME, Value::Real(v)) => v.to_le_bytes().to_vec(),
        (col_type::MONEY, Value::Real(v)) => ((v * 10_000.0).round() as i64).to_le_bytes().to_vec(),
        (ty, value) => panic!("fixture cannot store {value:?} in a column of type {ty:#04x}"),
    }
}

/// Encodes one row, spilling long values onto `extra`.
fn encode_row(
    columns: &[Layout],
    fixed_total: usize,
    var_count: usize,
    values: &[Value],
    extra_page: u32,
    extra: &mut PageRows,
) -> Vec<u8> {
    assert_eq!(columns.len(), values.len(), "fixture row width mismatch");
    let num_cols = columns.len();
    let mut mask = vec![0u8; num_cols.div_ceil(8)];
    let mut fixed = vec![0u8; fixed_total];
    let mut var_data: Vec<Vec<u8>> = vec![Vec::new(); var_count];

    for (column, value) in columns.iter().zip(values) {
        let bit = usize::from(column.col_num);
        if column.col_type == col_type::BOOL {
            if matches!(value, Value::Bool(true)) {
                mask[bit / 8] |= 1 << (bit % 8);
            }
            continue;
        }
        if value.is_null() {
            continue;
        }
        mask[bit / 8] |= 1 << (bit % 8);

        if column.fixed {
            let bytes = encode_fixed(column.col_type, value);
            let start = usize::from(column.fixed_offset);
            fixed[start..start + bytes.len()].copy_from_slice(&bytes);
        } else {
            var_data[usize::from(column.var_index)] = match (column.col_type, value) {
                (col_type::TEXT, Value::Text(s)) => s.chars().map(|c| c as u8).collect(),
                (col_type::MEMO, Value::Text(s)) => encode_memo(s, extra_page, extra),
                (col_type::OLE, Value::Blob(b)) => {
                    let mut field = (b.len() as u32 | 0x8000_0000).to_le_bytes().to_vec();
                    field.extend_from_slice(&[0; 8]);
                    field.extend_from_slice(b);
                    field
                },
                (_, Value::Blob(b)) => b.clone(),
                (ty, value) => {
                    panic!("fixture cannot store {value:?} in a column of type {ty:#04x}")
                },
            };
        }
    }

    let mut row = vec![num_cols as u8];
    row.extend_from_slice(&fixed);
    let mut offsets = Vec::with_capacity(var_count + 1);
    for data in &var_data {
        offsets.push(row.len());
        row.extend_from_slice(data);
    }
    offsets.push(row.len());

    // Trailer: offsets, jump table, var count, mask. The jump count depends
    // on the final length, so settle it first.
    let mut jumps = 0;
    loop {
        let total = row.len() + offsets.len() + jumps + 1 + mask.len();
        let needed = (total - 1) / 256;
        if needed == jumps {
            break;
        }
        jumps = needed;
    }
    let real_jumps = jumps.min(row.len() / 256);
    let mut jump_table: Vec<u8> = (0..real_jumps)
        .map(|k| {
            offsets
                .iter()
                .position(|&o| o >= 256 * (k + 1))
                .map_or(0xff, |i| i as u8)
        })
        .collect();
    jump_table.resize(jumps, 0xff);

    for offset in offsets.iter().rev() {
        row.push((offset % 256) as u8);
    }
    for entry in jump_table.iter().rev() {
        row.push(*entry);
    }
    row.push(var_count as u8);
    row.extend_from_slice(&mask);
    row
}

fn tdef_page(columns: &[(String, u8)], layouts: &[Layout], usage_map: u32, rows: usize) -> Vec<u8> {
    let mut page = vec![0u8; PAGE_SIZE];
    page[0] = PAGE_TDEF;
    page[1] = 0x01;
    page[2..4].copy_from_slice(b"VC");
    page[0x0c..0x10].copy_from_slice(&(rows as u32).to_le_bytes());
    page[0x14] = 0x4e;
    let var_cols = layouts.iter().filter(|l| !l.fixed).count() as u16;
    page[0x15..0x17].copy_from_slice(&(columns.len() as u16).to_le_bytes());
    page[0x17..0x19].copy_from_slice(&var_cols.to_le_bytes());
    page[0x19..0x1b].copy_from_slice(&(columns.len() as u16).to_le_bytes());
    page[0x23..0x27].copy_from_slice(&usage_map.to_le_bytes());

    let mut cursor = 0x2b;
    for l in layouts {
        page[cursor] = l.col_type;
        page[cursor + 1..cursor + 3].copy_from_slice(&l.col_num.to_le_bytes());
        page[cursor + 3..cursor + 5].copy_from_slice(&l.var_index.to_le_bytes());
        page[cursor + 5..cursor + 7].copy_from_slice(&l.col_num.to_le_bytes());
        page[cursor + 13] = u8::from(l.fixed);
        page[cursor + 14..cursor + 16].copy_from_slice(&l.fixed_offset.to_le_bytes());
        page[cursor + 16..cursor + 18].copy_from_slice(&l.len.to_le_bytes());
        cursor += 18;
    }
    for (name, _) in columns {
        page[cursor] = name.len() as u8;
        page[cursor + 1..cursor + 1 + name.len()].copy_from_slice(name.as_bytes());
        cursor += 1 + name.len();
    }
    page
}

/// Assembles a Jet 3 image from [`FixtureTable`]s.
#[derive(Debug, Clone)]
pub(crate) struct JetBuilder {
    tables: Vec<FixtureTable>,
    version: u8,
    signature: &'static [u8],
    reference_maps: bool,
    broken_maps: bool,
}

impl JetBuilder {
    pub(crate) fn new() -> Self {
        Self {
            tables: Vec::new(),
            version: 0,
            signature: b"Standard Jet DB",
            reference_maps: false,
            broken_maps: false,
        }
    }

    pub(crate) fn table(mut self, table: FixtureTable) -> Self {
        self.tables.push(table);
        self
    }

    pub(crate) fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn signature(mut self, signature: &'static [u8]) -> Self {
        self.signature = signature;
        self
    }

    /// Store usage maps as pointers to bitmap pages instead of inline.
    pub(crate) fn reference_maps(mut self) -> Self {
        self.reference_maps = true;
        self
    }

    /// Write usage maps with an unknown type byte.
    pub(crate) fn broken_maps(mut self) -> Self {
        self.broken_maps = true;
        self
    }

    fn table_tdef(index: usize) -> u32 {
        FIRST_TABLE_PAGE + PAGES_PER_TABLE * index as u32
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let table_count = self.tables.len();
        let ref_base = FIRST_TABLE_PAGE + PAGES_PER_TABLE * table_count as u32;
        let total_pages = ref_base + if self.reference_maps { 1 + table_count as u32 } else { 0 };
        let mut image = vec![0u8; total_pages as usize * PAGE_SIZE];

        let mut header = vec![0u8; PAGE_SIZE];
        header[4..4 + self.signature.len()].copy_from_slice(self.signature);
        header[0x14] = self.version;
        write_page(&mut image, 0, &header);

        // Usage maps: row 0 for the catalog, row i + 1 for table i.
        let mut maps = PageRows::default();
        let mut map_pages = Vec::new();
        let data_pages = std::iter::once(CATALOG_DATA)
            .chain((0..table_count).map(|i| Self::table_tdef(i) + 1));
        for (i, data_page) in data_pages.enumerate() {
            let row = if self.broken_maps {
                vec![0x7f, 0, 0, 0, 0]
            } else if self.reference_maps {
                let map_page = ref_base + i as u32;
                let mut bitmap = vec![0u8; PAGE_SIZE];
                bitmap[0] = 0x05;
                bitmap[1] = 0x01;
                bitmap[4 + data_page as usize / 8] |= 1 << (data_page % 8);
                map_pages.push((map_page, bitmap));
                let mut row = vec![0x01];
                row.extend_from_slice(&map_page.to_le_bytes());
                row
            } else {
                let mut row = vec![0x00];
                row.extend_from_slice(&data_page.to_le_bytes());
                row.push(0x01);
                row
            };
            maps.push(row, 0);
        }
        write_page(&mut image, MAP_PAGE, &maps.render(0));
        for (number, page) in map_pages {
            write_page(&mut image, number, &page);
        }

        // Catalog.
        let catalog_columns: Vec<(String, u8)> = [
            ("Id", col_type::LONG),
            ("Name", col_type::TEXT),
            ("Type", col_type::INT),
            ("Flags", col_type::LONG),
        ]
        .iter()
        .map(|(n, t)| ((*n).to_string(), *t))
        .collect();
        let (catalog_layout, catalog_fixed, catalog_vars) = layout(&catalog_columns);
        let mut catalog_rows = PageRows::default();
        let mut unused = PageRows::default();
        let mut entries = vec![(
            CATALOG_TDEF,
            "MSysObjects".to_string(),
            0x8000_0002u32 as i32,
        )];
        entries.extend(self.tables.iter().enumerate().map(|(i, t)| {
            let flags = if t.system { 0x8000_0002u32 as i32 } else { 0 };
            (Self::table_tdef(i), t.name.clone(), flags)
        }));
        for (page, name, flags) in &entries {
            let values = vec![
                Value::Integer(i64::from(*page) | 0x0200_0000),
                Value::Text(name.clone()),
                Value::Integer(1),
                Value::Integer(i64::from(*flags)),
            ];
            let row = encode_row(
                &catalog_layout,
                catalog_fixed,
                catalog_vars,
                &values,
                0,
                &mut unused,
            );
            catalog_rows.push(row, 0);
        }
        // A non-table object that must not show up as a table.
        let form = vec![
            Value::Integer(0),
            Value::Text("SomeForm".to_string()),
            Value::Integer(-32768),
            Value::Integer(0),
        ];
        let row = encode_row(&catalog_layout, catalog_fixed, catalog_vars, &form, 0, &mut unused);
        catalog_rows.push(row, 0);

        write_page(
            &mut image,
            CATALOG_TDEF,
            &tdef_page(&catalog_columns, &catalog_layout, pointer(MAP_PAGE, 0), entries.len() + 1),
        );
        write_page(&mut image, CATALOG_DATA, &catalog_rows.render(CATALOG_TDEF));

        // User tables.
        for (i, table) in self.tables.iter().enumerate() {
            let tdef = Self::table_tdef(i);
            let (data_page, extra_page) = (tdef + 1, tdef + 2);
            let (layouts, fixed_total, var_count) = layout(&table.columns);
            let mut data = PageRows::default();
            let mut extra = PageRows::default();

            for (storage, values) in &table.rows {
                let row = encode_row(
                    &layouts,
                    fixed_total,
                    var_count,
                    values,
                    extra_page,
                    &mut extra,
                );
                match storage {
                    Storage::Live => {
                        data.push(row, 0);
                    },
                    Storage::Deleted => {
                        data.push(row, 0x8000);
                    },
                    Storage::Overflow => {
                        let target = extra.push(row, 0);
                        data.push(pointer(extra_page, target).to_le_bytes().to_vec(), 0x4000);
                    },
                }
            }

            let map = pointer(MAP_PAGE, i as u32 + 1);
            let definition = tdef_page(&table.columns, &layouts, map, table.rows.len());
            write_page(&mut image, tdef, &definition);
            write_page(&mut image, data_page, &data.render(tdef));
            // Long values share the table as owner but are not in the usage map.
            write_page(&mut image, extra_page, &extra.render(tdef));
        }

        image
    }

    pub(crate) fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).expect("write fixture");
    }
}

fn write_page(image: &mut [u8], number: u32, page: &[u8]) {
    let start = number as usize * PAGE_SIZE;
    image[start..start + PAGE_SIZE].copy_from_slice(page);
}
