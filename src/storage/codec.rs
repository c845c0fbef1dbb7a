//! Per-type conversion between [`Value`]s and fixed-width record slices.
//!
//! Memo-backed columns are not handled by [`encode`]/[`decode`]: their slot
//! only holds a block pointer, see [`encode_memo_pointer`] and
//! [`decode_memo_pointer`]. The payload itself lives in the memo store.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::{
    storage::{memo, schema::Column},
    types::{
        BlockIndex,
        error::XBaseError,
        field_type::FieldType,
        table_type::{MemoKind, TableType},
        value::Value,
    },
};

/// Julian day number of 0001-01-01 minus one.
const JULIAN_DAY_OFFSET: i64 = 1_721_425;
const CURRENCY_SCALE: f64 = 10_000.0;

fn codec_error(column: &Column, details: impl Into<String>) -> XBaseError {
    XBaseError::Codec {
        column: column.name.clone(),
        details: details.into(),
    }
}

fn mismatch(column: &Column, value: &Value) -> XBaseError {
    codec_error(
        column,
        format!("{} value not accepted by {} field", value.type_name(), column.field_type),
    )
}

/// Encode `value` into `out`, which must be exactly `column.length` bytes.
pub fn encode(
    column: &Column,
    table_type: TableType,
    value: &Value,
    out: &mut [u8],
) -> Result<(), XBaseError> {
    debug_assert!(table_type.supports(column.field_type));
    debug_assert!(!column.is_memo());
    debug_assert_eq!(out.len(), column.length as usize);

    match column.field_type {
        FieldType::Char => encode_char(column, value, out),
        FieldType::Date => encode_date(column, value, out),
        FieldType::Logical => encode_logical(column, value, out),
        FieldType::Numeric | FieldType::Float => encode_numeric(column, value, out),
        FieldType::Integer | FieldType::AutoIncrement => {
            encode_integer(column, table_type, value, out)
        }
        FieldType::Double => encode_double(column, value, out),
        FieldType::Currency => encode_currency(column, value, out),
        FieldType::DateTime => encode_datetime(column, value, out, false),
        FieldType::Timestamp => encode_datetime(column, value, out, true),
        FieldType::NullFlags => match value {
            Value::Null => {
                out.fill(0);
                Ok(())
            }
            Value::Blob(bytes) if bytes.len() == out.len() => {
                out.copy_from_slice(bytes);
                Ok(())
            }
            other => Err(mismatch(column, other)),
        },
        FieldType::Memo | FieldType::General | FieldType::Blob | FieldType::Picture => {
            unreachable!("memo columns are encoded through encode_memo_pointer")
        }
    }
}

/// Decode the slot of a non-memo column.
pub fn decode(column: &Column, table_type: TableType, bytes: &[u8]) -> Result<Value, XBaseError> {
    debug_assert!(!column.is_memo());

    match column.field_type {
        FieldType::Char => {
            let end = bytes
                .iter()
                .rposition(|&b| b != b' ' && b != 0)
                .map_or(0, |p| p + 1);
            Ok(Value::Text(String::from_utf8_lossy(&bytes[..end]).into_owned()))
        }
        FieldType::Date => decode_date(column, bytes),
        FieldType::Logical => match bytes.first().copied() {
            Some(b'T' | b't' | b'Y' | b'y') => Ok(Value::Logical(true)),
            Some(b'F' | b'f' | b'N' | b'n') => Ok(Value::Logical(false)),
            Some(b'?' | b' ') | None => Ok(Value::Null),
            Some(other) => Err(codec_error(
                column,
                format!("invalid logical byte 0x{:02X}", other),
            )),
        },
        FieldType::Numeric | FieldType::Float => decode_numeric(column, bytes),
        FieldType::Integer | FieldType::AutoIncrement => {
            let raw = fixed::<4>(column, bytes)?;
            let value = if table_type.is_dbase7() {
                (u32::from_be_bytes(raw) ^ 0x8000_0000) as i32
            } else {
                i32::from_le_bytes(raw)
            };
            Ok(Value::Integer(value as i64))
        }
        FieldType::Double => {
            let raw = u64::from_be_bytes(fixed::<8>(column, bytes)?);
            if raw == 0 {
                return Ok(Value::Null);
            }
            let bits = if raw & 0x8000_0000_0000_0000 != 0 {
                raw ^ 0x8000_0000_0000_0000
            } else {
                !raw
            };
            Ok(Value::Number(f64::from_bits(bits)))
        }
        FieldType::Currency => {
            let raw = i64::from_le_bytes(fixed::<8>(column, bytes)?);
            Ok(Value::Number(raw as f64 / CURRENCY_SCALE))
        }
        FieldType::DateTime => decode_datetime(column, bytes, false),
        FieldType::Timestamp => decode_datetime(column, bytes, true),
        FieldType::NullFlags => Ok(Value::Blob(bytes.to_vec())),
        FieldType::Memo | FieldType::General | FieldType::Blob | FieldType::Picture => {
            unreachable!("memo columns are decoded through decode_memo_pointer")
        }
    }
}

fn fixed<const N: usize>(column: &Column, bytes: &[u8]) -> Result<[u8; N], XBaseError> {
    bytes
        .try_into()
        .map_err(|_| codec_error(column, format!("expected {} bytes, got {}", N, bytes.len())))
}

fn encode_char(column: &Column, value: &Value, out: &mut [u8]) -> Result<(), XBaseError> {
    let text: &[u8] = match value {
        Value::Null => &[],
        Value::Text(s) => s.as_bytes(),
        other => return Err(mismatch(column, other)),
    };
    if text.len() > out.len() {
        return Err(codec_error(
            column,
            format!("{} bytes do not fit into length {}", text.len(), out.len()),
        ));
    }
    out.fill(b' ');
    out[..text.len()].copy_from_slice(text);
    Ok(())
}

fn encode_date(column: &Column, value: &Value, out: &mut [u8]) -> Result<(), XBaseError> {
    let date = match value {
        Value::Null => {
            out.fill(b' ');
            return Ok(());
        }
        Value::Date(d) => *d,
        Value::DateTime(dt) => dt.date(),
        other => return Err(mismatch(column, other)),
    };
    let formatted = format!("{:04}{:02}{:02}", date.year(), date.month(), date.day());
    if formatted.len() != out.len() {
        return Err(codec_error(column, format!("year {} out of range", date.year())));
    }
    out.copy_from_slice(formatted.as_bytes());
    Ok(())
}

fn decode_date(column: &Column, bytes: &[u8]) -> Result<Value, XBaseError> {
    if bytes.iter().all(|&b| b == b' ' || b == b'0' || b == 0) {
        return Ok(Value::Null);
    }
    let text = std::str::from_utf8(bytes)
        .ok()
        .filter(|t| t.len() == 8 && t.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| codec_error(column, "date is not 8 ASCII digits"))?;
    let part = |range: std::ops::Range<usize>| text[range].parse::<u32>().unwrap_or(0);
    NaiveDate::from_ymd_opt(part(0..4) as i32, part(4..6), part(6..8))
        .map(Value::Date)
        .ok_or_else(|| codec_error(column, format!("invalid date '{}'", text)))
}

fn encode_logical(column: &Column, value: &Value, out: &mut [u8]) -> Result<(), XBaseError> {
    out[0] = match value {
        Value::Logical(true) => b'T',
        Value::Logical(false) => b'F',
        Value::Null => b'?',
        other => return Err(mismatch(column, other)),
    };
    Ok(())
}

fn encode_numeric(column: &Column, value: &Value, out: &mut [u8]) -> Result<(), XBaseError> {
    let decimals = column.decimal_count as usize;
    let formatted = match value {
        Value::Null => {
            out.fill(b' ');
            return Ok(());
        }
        // Integers are formatted directly; f64 loses digits past 2^53.
        Value::Integer(i) if decimals == 0 => i.to_string(),
        Value::Integer(i) => format!("{}.{}", i, "0".repeat(decimals)),
        Value::Number(n) if n.is_finite() => format!("{:.*}", decimals, n),
        Value::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => format!("{:.*}", decimals, n),
            _ => return Err(mismatch(column, value)),
        },
        other => return Err(mismatch(column, other)),
    };

    if formatted.len() > out.len() {
        return Err(XBaseError::NumericOverflow {
            column: column.name.clone(),
            value: formatted,
            length: column.length,
        });
    }
    let pad = out.len() - formatted.len();
    out[..pad].fill(b' ');
    out[pad..].copy_from_slice(formatted.as_bytes());
    Ok(())
}

fn decode_numeric(column: &Column, bytes: &[u8]) -> Result<Value, XBaseError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    if text.is_empty() {
        return Ok(Value::Null);
    }
    if column.decimal_count == 0 {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Integer(i));
        }
    }
    text.parse::<f64>()
        .map(Value::Number)
        .map_err(|_| codec_error(column, format!("invalid number '{}'", text)))
}

fn encode_integer(
    column: &Column,
    table_type: TableType,
    value: &Value,
    out: &mut [u8],
) -> Result<(), XBaseError> {
    let number = match value {
        Value::Null => 0,
        Value::Integer(i) => *i,
        Value::Number(n) if n.fract() == 0.0 => *n as i64,
        other => return Err(mismatch(column, other)),
    };
    let number = i32::try_from(number).map_err(|_| XBaseError::NumericOverflow {
        column: column.name.clone(),
        value: number.to_string(),
        length: column.length,
    })?;
    if table_type.is_dbase7() {
        out.copy_from_slice(&((number as u32) ^ 0x8000_0000).to_be_bytes());
    } else {
        out.copy_from_slice(&number.to_le_bytes());
    }
    Ok(())
}

fn encode_double(column: &Column, value: &Value, out: &mut [u8]) -> Result<(), XBaseError> {
    let number = match value {
        Value::Null => {
            out.fill(0);
            return Ok(());
        }
        Value::Number(n) => *n,
        Value::Integer(i) => *i as f64,
        other => return Err(mismatch(column, other)),
    };
    let bits = number.to_bits();
    let sortable = if number.is_sign_negative() {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    };
    out.copy_from_slice(&sortable.to_be_bytes());
    Ok(())
}

fn encode_currency(column: &Column, value: &Value, out: &mut [u8]) -> Result<(), XBaseError> {
    let number = match value {
        Value::Null => 0.0,
        Value::Number(n) => *n,
        Value::Integer(i) => *i as f64,
        other => return Err(mismatch(column, other)),
    };
    let scaled = (number * CURRENCY_SCALE).round();
    if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
        return Err(XBaseError::NumericOverflow {
            column: column.name.clone(),
            value: number.to_string(),
            length: column.length,
        });
    }
    out.copy_from_slice(&(scaled as i64).to_le_bytes());
    Ok(())
}

fn encode_datetime(
    column: &Column,
    value: &Value,
    out: &mut [u8],
    big_endian: bool,
) -> Result<(), XBaseError> {
    let (day, millis) = match value {
        Value::Null => (0u32, 0u32),
        Value::DateTime(dt) => (
            julian_day(dt.date()),
            dt.time().num_seconds_from_midnight() * 1000 + dt.time().nanosecond() / 1_000_000,
        ),
        Value::Date(d) => (julian_day(*d), 0),
        other => return Err(mismatch(column, other)),
    };
    if big_endian {
        out[..4].copy_from_slice(&day.to_be_bytes());
        out[4..].copy_from_slice(&millis.to_be_bytes());
    } else {
        out[..4].copy_from_slice(&day.to_le_bytes());
        out[4..].copy_from_slice(&millis.to_le_bytes());
    }
    Ok(())
}

fn decode_datetime(column: &Column, bytes: &[u8], big_endian: bool) -> Result<Value, XBaseError> {
    let raw = fixed::<8>(column, bytes)?;
    let (day, millis) = if big_endian {
        (
            u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        )
    } else {
        (
            u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        )
    };
    if day == 0 && millis == 0 {
        return Ok(Value::Null);
    }
    let date = NaiveDate::from_num_days_from_ce_opt((day as i64 - JULIAN_DAY_OFFSET) as i32)
        .ok_or_else(|| codec_error(column, format!("invalid julian day {}", day)))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(millis / 1000, (millis % 1000) * 1_000_000)
        .ok_or_else(|| codec_error(column, format!("invalid time {} ms", millis)))?;
    Ok(Value::DateTime(NaiveDateTime::new(date, time)))
}

fn julian_day(date: NaiveDate) -> u32 {
    (date.num_days_from_ce() as i64 + JULIAN_DAY_OFFSET) as u32
}

/// Check that a value may be stored in a memo column and return its payload.
/// `None` means "no memo".
pub fn memo_payload(column: &Column, value: &Value) -> Result<Option<Vec<u8>>, XBaseError> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) if s.is_empty() => Ok(None),
        Value::Blob(b) if b.is_empty() => Ok(None),
        Value::Text(s) => Ok(Some(s.as_bytes().to_vec())),
        Value::Blob(b) => Ok(Some(b.clone())),
        other => Err(mismatch(column, other)),
    }
}

/// Reject payloads a memo dialect cannot store intact.
pub fn check_memo_payload(column: &Column, kind: MemoKind, payload: &[u8]) -> Result<(), XBaseError> {
    if kind == MemoKind::DBase3 && !memo::terminated_entry_safe(payload) {
        return Err(codec_error(column, "dBase III memo cannot hold the byte pair 0x1A 0x1A"));
    }
    Ok(())
}

/// The value a memo payload reads back as.
pub fn memo_value(field_type: FieldType, payload: Vec<u8>) -> Value {
    if payload.is_empty() {
        return Value::Null;
    }
    if field_type == FieldType::Memo {
        match String::from_utf8(payload) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Blob(e.into_bytes()),
        }
    } else {
        Value::Blob(payload)
    }
}

pub fn encode_memo_pointer(
    column: &Column,
    table_type: TableType,
    block: Option<BlockIndex>,
    out: &mut [u8],
) -> Result<(), XBaseError> {
    debug_assert!(column.is_memo());
    if table_type.binary_memo_pointer() || out.len() == 4 {
        let raw: [u8; 4] = block.unwrap_or(0).to_le_bytes();
        if out.len() != raw.len() {
            return Err(codec_error(column, "binary memo pointer must be 4 bytes"));
        }
        out.copy_from_slice(&raw);
        return Ok(());
    }

    out.fill(b' ');
    if let Some(block) = block {
        let digits = block.to_string();
        if digits.len() > out.len() {
            return Err(XBaseError::NumericOverflow {
                column: column.name.clone(),
                value: digits,
                length: column.length,
            });
        }
        let pad = out.len() - digits.len();
        out[pad..].copy_from_slice(digits.as_bytes());
    }
    Ok(())
}

pub fn decode_memo_pointer(
    column: &Column,
    table_type: TableType,
    bytes: &[u8],
) -> Result<Option<BlockIndex>, XBaseError> {
    if table_type.binary_memo_pointer() || bytes.len() == 4 {
        let block = u32::from_le_bytes(fixed::<4>(column, bytes)?);
        return Ok((block != 0).then_some(block));
    }
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    if text.is_empty() {
        return Ok(None);
    }
    let block = text
        .parse::<u32>()
        .map_err(|_| codec_error(column, format!("invalid memo pointer '{}'", text)))?;
    Ok((block != 0).then_some(block))
}
