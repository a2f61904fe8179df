//! Page-level access for Jet 3 files: fixed 2 KiB pages, little-endian fields.

use crate::error::{Error, Result};

/// Jet 3 page size.
pub(crate) const PAGE_SIZE: usize = 2048;

pub(crate) const PAGE_DATA: u8 = 0x01;
pub(crate) const PAGE_TDEF: u8 = 0x02;

/// Data page: owning table definition page.
const DATA_OWNER: usize = 0x04;
/// Data page: number of row slots.
const DATA_ROW_COUNT: usize = 0x08;
/// Data page: first row offset entry.
const DATA_ROW_TABLE: usize = 0x0a;

const OFFSET_MASK: u16 = 0x1fff;
const ROW_DELETED: u16 = 0x8000;
const ROW_OVERFLOW: u16 = 0x4000;

fn array_at<const N: usize>(buf: &[u8], off: usize) -> Result<[u8; N]> {
    off.checked_add(N)
        .and_then(|end| buf.get(off..end))
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| {
            Error::corrupt(format!("read of {N} bytes at offset {off} is out of bounds"))
        })
}

pub(crate) fn u8_at(buf: &[u8], off: usize) -> Result<u8> {
    buf.get(off)
        .copied()
        .ok_or_else(|| Error::corrupt(format!("read at offset {off} is out of bounds")))
}

pub(crate) fn u16_at(buf: &[u8], off: usize) -> Result<u16> {
    array_at(buf, off).map(u16::from_le_bytes)
}

pub(crate) fn u32_at(buf: &[u8], off: usize) -> Result<u32> {
    array_at(buf, off).map(u32::from_le_bytes)
}

pub(crate) fn i16_at(buf: &[u8], off: usize) -> Result<i16> {
    array_at(buf, off).map(i16::from_le_bytes)
}

pub(crate) fn i32_at(buf: &[u8], off: usize) -> Result<i32> {
    array_at(buf, off).map(i32::from_le_bytes)
}

pub(crate) fn i64_at(buf: &[u8], off: usize) -> Result<i64> {
    array_at(buf, off).map(i64::from_le_bytes)
}

pub(crate) fn f32_at(buf: &[u8], off: usize) -> Result<f32> {
    array_at(buf, off).map(f32::from_le_bytes)
}

pub(crate) fn f64_at(buf: &[u8], off: usize) -> Result<f64> {
    array_at(buf, off).map(f64::from_le_bytes)
}

/// Slice `buf[start..end]` or a corrupt-file error.
pub(crate) fn slice(buf: &[u8], start: usize, end: usize) -> Result<&[u8]> {
    buf.get(start..end)
        .ok_or_else(|| Error::corrupt(format!("range {start}..{end} is out of bounds")))
}

/// Splits a 4-byte row pointer into `(page, row)`.
pub(crate) fn split_row_pointer(pointer: u32) -> (u32, usize) {
    (pointer >> 8, (pointer & 0xff) as usize)
}

/// The whole file, addressed by page number.
pub(crate) struct Pages {
    data: Vec<u8>,
}

impl Pages {
    pub(crate) fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() < PAGE_SIZE {
            return Err(Error::corrupt(format!(
                "file is {} bytes, smaller than one {PAGE_SIZE}-byte page",
                data.len()
            )));
        }
        Ok(Self { data })
    }

    pub(crate) fn count(&self) -> u32 {
        u32::try_from(self.data.len() / PAGE_SIZE).unwrap_or(u32::MAX)
    }

    pub(crate) fn page(&self, number: u32) -> Result<&[u8]> {
        let start = number as usize * PAGE_SIZE;
        self.data
            .get(start..start + PAGE_SIZE)
            .ok_or_else(|| Error::corrupt(format!("page {number} is past the end of the file")))
    }
}

/// What a row slot on a data page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowSlot {
    Deleted,
    /// The slot stores a pointer to the real row on another page.
    Overflow { start: usize, end: usize },
    Live { start: usize, end: usize },
}

/// Owning table definition page of a data page, or None for other page types.
pub(crate) fn data_page_owner(page: &[u8]) -> Result<Option<u32>> {
    if u8_at(page, 0)? != PAGE_DATA {
        return Ok(None);
    }
    u32_at(page, DATA_OWNER).map(Some)
}

/// Number of row slots on a data page.
pub(crate) fn row_count(page: &[u8]) -> Result<usize> {
    let count = usize::from(u16_at(page, DATA_ROW_COUNT)?);
    if DATA_ROW_TABLE + count * 2 > PAGE_SIZE {
        return Err(Error::corrupt(format!("row count {count} does not fit in a page")));
    }
    Ok(count)
}

/// Byte range of row `row`, ignoring deleted/overflow flags.
///
/// Rows are packed from the end of the page downwards, so a row ends where
/// the previous slot's row starts.
pub(crate) fn row_bounds(page: &[u8], row: usize) -> Result<(u16, usize, usize)> {
    if row >= row_count(page)? {
        return Err(Error::corrupt(format!("row {row} is not on this page")));
    }
    let raw = u16_at(page, DATA_ROW_TABLE + row * 2)?;
    let start = usize::from(raw & OFFSET_MASK);
    let end = if row == 0 {
        PAGE_SIZE
    } else {
        usize::from(u16_at(page, DATA_ROW_TABLE + (row - 1) * 2)? & OFFSET_MASK)
    };
    if start >= end || end > PAGE_SIZE {
        return Err(Error::corrupt(format!(
            "row {row} has invalid bounds {start}..{end}"
        )));
    }
    Ok((raw, start, end))
}

pub(crate) fn row_slot(page: &[u8], row: usize) -> Result<RowSlot> {
    let (raw, start, end) = row_bounds(page, row)?;
    Ok(if raw & ROW_DELETED != 0 {
        RowSlot::Deleted
    } else if raw & ROW_OVERFLOW != 0 {
        RowSlot::Overflow { start, end }
    } else {
        RowSlot::Live { start, end }
    })
}

/// Bytes of the row a 4-byte row pointer refers to.
pub(crate) fn pointed_row(pages: &Pages, pointer: u32) -> Result<&[u8]> {
    let (page_no, row) = split_row_pointer(pointer);
    let page = pages.page(page_no)?;
    let (_, start, end) = row_bounds(page, row)?;
    slice(page, start, end)
}
