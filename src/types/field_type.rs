use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::error::XBaseError;

/// Column data types across the supported dialects.
///
/// The on-disk type byte is an ASCII character. Whether a given type may be
/// used by a table is decided by [`TableType::supports`](crate::types::table_type::TableType::supports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Char,
    Date,
    Numeric,
    Float,
    Logical,
    Memo,
    General,
    Blob,
    Picture,
    Integer,
    Double,
    Currency,
    DateTime,
    Timestamp,
    AutoIncrement,
    NullFlags,
}

impl FieldType {
    pub fn to_byte(self) -> u8 {
        match self {
            FieldType::Char => b'C',
            FieldType::Date => b'D',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Logical => b'L',
            FieldType::Memo => b'M',
            FieldType::General => b'G',
            FieldType::Blob => b'B',
            FieldType::Picture => b'P',
            FieldType::Integer => b'I',
            FieldType::Double => b'O',
            FieldType::Currency => b'Y',
            FieldType::DateTime => b'T',
            FieldType::Timestamp => b'@',
            FieldType::AutoIncrement => b'+',
            FieldType::NullFlags => b'0',
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, XBaseError> {
        let field_type = match byte.to_ascii_uppercase() {
            b'C' => FieldType::Char,
            b'D' => FieldType::Date,
            b'N' => FieldType::Numeric,
            b'F' => FieldType::Float,
            b'L' => FieldType::Logical,
            b'M' => FieldType::Memo,
            b'G' => FieldType::General,
            b'B' => FieldType::Blob,
            b'P' => FieldType::Picture,
            b'I' => FieldType::Integer,
            b'O' => FieldType::Double,
            b'Y' => FieldType::Currency,
            b'T' => FieldType::DateTime,
            b'@' => FieldType::Timestamp,
            b'+' => FieldType::AutoIncrement,
            b'0' => FieldType::NullFlags,
            other => return Err(XBaseError::UnknownFieldType(other as char)),
        };
        Ok(field_type)
    }

    /// Types whose record slot holds a pointer into the memo file.
    pub fn is_memo(self) -> bool {
        matches!(
            self,
            FieldType::Memo | FieldType::General | FieldType::Blob | FieldType::Picture
        )
    }

    /// Memo types whose payload is text rather than binary.
    pub fn is_text_memo(self) -> bool {
        self == FieldType::Memo
    }

    /// Types that carry a decimal count.
    pub fn has_decimals(self) -> bool {
        matches!(self, FieldType::Numeric | FieldType::Float)
    }

    /// Length fixed by the type itself, or `None` when the column must
    /// supply one. Memo pointers shrink to 4 binary bytes on Visual FoxPro.
    pub fn fixed_length(self, binary_memo_pointer: bool) -> Option<u8> {
        match self {
            FieldType::Char | FieldType::Numeric | FieldType::Float | FieldType::NullFlags => None,
            FieldType::Logical => Some(1),
            FieldType::Date => Some(8),
            FieldType::Memo | FieldType::General | FieldType::Blob | FieldType::Picture => {
                Some(if binary_memo_pointer { 4 } else { 10 })
            }
            FieldType::Integer | FieldType::AutoIncrement => Some(4),
            FieldType::Double
            | FieldType::Currency
            | FieldType::DateTime
            | FieldType::Timestamp => Some(8),
        }
    }

    /// Maximum length accepted for types that take an explicit length.
    pub fn max_length(self) -> u8 {
        match self {
            FieldType::Char => 254,
            FieldType::Numeric | FieldType::Float => 20,
            _ => u8::MAX,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_byte() as char)
    }
}
