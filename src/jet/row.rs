//! Row decoding: splits a Jet 3 row into column values.
//!
//! Row layout, front to back:
//!
//! ```text
//! [col count: u8][fixed columns][variable columns]
//! [var offsets, last to first: u8 each][jump table: u8 each][var count: u8][null mask]
//! ```
//!
//! Variable offsets are single bytes; rows longer than 256 bytes carry a
//! jump table recording the variable column at which each 256-byte
//! boundary is crossed.

use super::page::{
    PAGE_SIZE, Pages, f32_at, f64_at, i16_at, i32_at, i64_at, pointed_row, slice, u8_at, u32_at,
};
use super::tdef::{ColumnDef, TableDef, col_type, decode_latin1};
use crate::backend::Value;
use crate::error::{Error, Result};
use chrono::{NaiveDate, TimeDelta};

/// Long value header: 4-byte length with flags, 4-byte row pointer, 4 unused.
const LVAL_HEADER: usize = 12;
const LVAL_INLINE: u32 = 0x8000_0000;
const LVAL_SINGLE_PAGE: u32 = 0x4000_0000;
const LVAL_LEN_MASK: u32 = 0x3fff_ffff;
/// Bytes at the start of each chained long value row pointing at the next.
const LVAL_CHAIN_POINTER: usize = 4;

/// Money is stored as a scaled 64-bit integer.
const MONEY_SCALE: f64 = 10_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Offsets of each variable column within the row, plus the end offset.
fn var_offsets(row: &[u8], mask_len: usize, var_count: usize) -> Result<Vec<usize>> {
    let row_end = row.len() - 1;
    let mut num_jumps = row_end / 256;
    let col_ptr = row_end
        .checked_sub(mask_len + num_jumps + 1)
        .ok_or_else(|| Error::corrupt("row too short for its offset table"))?;
    // A trailing jump entry is a placeholder when the data stops short of it.
    if num_jumps > 0
        && col_ptr
            .checked_sub(var_count)
            .is_some_and(|data_end| data_end / 256 < num_jumps)
    {
        num_jumps -= 1;
    }

    let mut offsets = Vec::with_capacity(var_count + 1);
    let mut jumps_used = 0;
    for i in 0..=var_count {
        while jumps_used < num_jumps
            && usize::from(u8_at(row, row_end - mask_len - jumps_used - 1)?) == i
        {
            jumps_used += 1;
        }
        let pos = col_ptr
            .checked_sub(i)
            .ok_or_else(|| Error::corrupt("variable offset table runs past row start"))?;
        offsets.push(usize::from(u8_at(row, pos)?) + jumps_used * 256);
    }
    Ok(offsets)
}

fn is_present(mask: &[u8], col_num: u16) -> bool {
    let col = usize::from(col_num);
    mask.get(col / 8).is_some_and(|b| b & (1 << (col % 8)) != 0)
}

/// Decodes one row into values ordered like `table.columns`.
pub(crate) fn decode_row(pages: &Pages, table: &TableDef, row: &[u8]) -> Result<Vec<Value>> {
    let num_cols = usize::from(u8_at(row, 0)?);
    let mask_len = num_cols.div_ceil(8);
    if row.len() < 2 + mask_len {
        return Err(Error::corrupt(format!(
            "row of {} bytes is too short for {num_cols} columns",
            row.len()
        )));
    }
    let mask = &row[row.len() - mask_len..];
    let var_count = usize::from(u8_at(row, row.len() - 1 - mask_len)?);
    let offsets = var_offsets(row, mask_len, var_count)?;

    table
        .columns
        .iter()
        .map(|column| {
            let present = is_present(mask, column.col_num);
            if column.col_type == col_type::BOOL {
                return Ok(Value::Bool(present));
            }
            if !present {
                return Ok(Value::Null);
            }

            if column.fixed {
                if usize::from(column.col_num) >= num_cols {
                    return Ok(Value::Null);
                }
                let start = 1 + usize::from(column.fixed_offset);
                let bytes = slice(row, start, start + column.fixed_size())?;
                decode_value(pages, column, bytes)
            } else {
                let index = usize::from(column.var_index);
                if index >= var_count {
                    return Ok(Value::Null);
                }
                let (start, end) = (offsets[index], offsets[index + 1]);
                if end < start {
                    return Err(Error::corrupt(format!(
                        "column '{}' has negative length",
                        column.name
                    )));
                }
                decode_value(pages, column, slice(row, start, end)?)
            }
        })
        .collect()
}

fn decode_value(pages: &Pages, column: &ColumnDef, bytes: &[u8]) -> Result<Value> {
    Ok(match column.col_type {
        col_type::BYTE => Value::Integer(i64::from(u8_at(bytes, 0)?)),
        col_type::INT => Value::Integer(i64::from(i16_at(bytes, 0)?)),
        col_type::LONG => Value::Integer(i64::from(i32_at(bytes, 0)?)),
        #[allow(clippy::cast_precision_loss)]
        col_type::MONEY => Value::Real(i64_at(bytes, 0)? as f64 / MONEY_SCALE),
        col_type::FLOAT => Value::Real(f64::from(f32_at(bytes, 0)?)),
        col_type::DOUBLE => Value::Real(f64_at(bytes, 0)?),
        col_type::DATETIME => decode_datetime(f64_at(bytes, 0)?),
        col_type::TEXT => Value::Text(decode_latin1(bytes)),
        col_type::MEMO => Value::Text(decode_latin1(&read_long_value(pages, bytes)?)),
        col_type::OLE => Value::Blob(read_long_value(pages, bytes)?),
        col_type::GUID => Value::Text(format_guid(bytes)?),
        col_type::BINARY => Value::Blob(bytes.to_vec()),
        _ => Value::Blob(bytes.to_vec()),
    })
}

/// Days since 1899-12-30, rendered `YYYY-MM-DD HH:MM:SS`.
///
/// The whole-day part counts toward zero and the fraction is always a
/// forward time of day, so `-1.25` is 1899-12-29 06:00.
fn decode_datetime(days: f64) -> Value {
    #[allow(clippy::cast_possible_truncation)]
    let whole = days.trunc() as i64;
    #[allow(clippy::cast_possible_truncation)]
    let millis = (days.fract().abs() * MILLIS_PER_DAY).round() as i64;
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .zip(TimeDelta::try_days(whole))
        .and_then(|(epoch, delta)| epoch.checked_add_signed(delta))
        .zip(TimeDelta::try_milliseconds(millis))
        .and_then(|(date, delta)| date.checked_add_signed(delta))
        .map_or(Value::Real(days), |dt| {
            Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())
        })
}

fn format_guid(bytes: &[u8]) -> Result<String> {
    let b = slice(bytes, 0, 16)?;
    Ok(format!(
        "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
        u32_at(b, 0)?,
        u16::from_le_bytes([b[4], b[5]]),
        u16::from_le_bytes([b[6], b[7]]),
        b[8],
        b[9],
        b[10],
        b[11],
        b[12],
        b[13],
        b[14],
        b[15]
    ))
}

/// Resolves a memo/OLE field to its bytes.
fn read_long_value(pages: &Pages, field: &[u8]) -> Result<Vec<u8>> {
    let header = u32_at(field, 0)?;
    let len = (header & LVAL_LEN_MASK) as usize;

    if header & LVAL_INLINE != 0 {
        return Ok(slice(field, LVAL_HEADER, LVAL_HEADER + len)?.to_vec());
    }

    let pointer = u32_at(field, 4)?;
    if header & LVAL_SINGLE_PAGE != 0 {
        let data = pointed_row(pages, pointer)?;
        return Ok(slice(data, 0, len.min(data.len()))?.to_vec());
    }

    // The length comes from the file; never reserve more than it holds.
    let mut out = Vec::with_capacity(len.min(pages.count() as usize * PAGE_SIZE));
    let mut next = pointer;
    let mut hops = 0u32;
    while out.len() < len && next != 0 {
        if hops > pages.count() {
            return Err(Error::corrupt("long value chain loops"));
        }
        let data = pointed_row(pages, next)?;
        next = u32_at(data, 0)?;
        out.extend_from_slice(slice(data, LVAL_CHAIN_POINTER, data.len())?);
        hops += 1;
    }
    out.truncate(len);
    Ok(out)
}
