use serde::{Deserialize, Serialize};

use crate::types::{error::XBaseError, field_type::FieldType};

/// Table dialects, identified by the first byte of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableType {
    FoxBase,
    DBase3,
    DBase7,
    VisualFoxPro,
    VisualFoxProAutoInc,
    DBase3Memo,
    DBase4Memo,
    DBase7Memo,
    FoxProMemo,
}

/// Layout of the memo file that accompanies a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoKind {
    /// `.dbt`, 512-byte blocks, entries terminated by `0x1A 0x1A`.
    DBase3,
    /// `.dbt`, entries prefixed by `FF FF 08 00` and a length.
    DBase4,
    /// `.fpt`, big-endian header, entries prefixed by type and length.
    FoxPro,
}

use FieldType::*;

const BASIC: &[FieldType] = &[Char, Date, Numeric, Logical];
const DBASE3_MEMO: &[FieldType] = &[Char, Date, Numeric, Logical, Memo];
const DBASE4_MEMO: &[FieldType] = &[Char, Date, Numeric, Float, Logical, Memo];
const DBASE7: &[FieldType] = &[
    Char, Date, Numeric, Float, Logical, Integer, Double, Timestamp, AutoIncrement,
];
const DBASE7_MEMO: &[FieldType] = &[
    Char, Date, Numeric, Float, Logical, Integer, Double, Timestamp, AutoIncrement, Memo, Blob,
    General,
];
const FOXPRO_MEMO: &[FieldType] = &[Char, Date, Numeric, Float, Logical, Memo, General, Picture];
const VISUAL_FOXPRO: &[FieldType] = &[
    Char, Date, Numeric, Float, Logical, Memo, General, Picture, Integer, Currency, DateTime,
    NullFlags,
];

impl TableType {
    pub fn to_byte(self) -> u8 {
        match self {
            TableType::FoxBase => 0x02,
            TableType::DBase3 => 0x03,
            TableType::DBase7 => 0x04,
            TableType::VisualFoxPro => 0x30,
            TableType::VisualFoxProAutoInc => 0x31,
            TableType::DBase3Memo => 0x83,
            TableType::DBase4Memo => 0x8B,
            TableType::DBase7Memo => 0x8C,
            TableType::FoxProMemo => 0xF5,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, XBaseError> {
        let table_type = match byte {
            0x02 => TableType::FoxBase,
            0x03 => TableType::DBase3,
            0x04 => TableType::DBase7,
            0x30 => TableType::VisualFoxPro,
            0x31 => TableType::VisualFoxProAutoInc,
            0x83 => TableType::DBase3Memo,
            0x8B => TableType::DBase4Memo,
            0x8C => TableType::DBase7Memo,
            0xF5 => TableType::FoxProMemo,
            other => return Err(XBaseError::UnknownTableType(other)),
        };
        Ok(table_type)
    }

    /// The validity matrix: every field type this dialect may declare.
    pub fn supported_field_types(self) -> &'static [FieldType] {
        match self {
            TableType::FoxBase | TableType::DBase3 => BASIC,
            TableType::DBase3Memo => DBASE3_MEMO,
            TableType::DBase4Memo => DBASE4_MEMO,
            TableType::DBase7 => DBASE7,
            TableType::DBase7Memo => DBASE7_MEMO,
            TableType::FoxProMemo => FOXPRO_MEMO,
            TableType::VisualFoxPro | TableType::VisualFoxProAutoInc => VISUAL_FOXPRO,
        }
    }

    pub fn supports(self, field_type: FieldType) -> bool {
        self.supported_field_types().contains(&field_type)
    }

    pub fn memo_kind(self) -> Option<MemoKind> {
        match self {
            TableType::FoxBase | TableType::DBase3 | TableType::DBase7 => None,
            TableType::DBase3Memo => Some(MemoKind::DBase3),
            TableType::DBase4Memo | TableType::DBase7Memo => Some(MemoKind::DBase4),
            TableType::FoxProMemo | TableType::VisualFoxPro | TableType::VisualFoxProAutoInc => {
                Some(MemoKind::FoxPro)
            }
        }
    }

    pub fn is_foxpro(self) -> bool {
        matches!(
            self,
            TableType::FoxProMemo | TableType::VisualFoxPro | TableType::VisualFoxProAutoInc
        )
    }

    pub fn is_visual_foxpro(self) -> bool {
        matches!(self, TableType::VisualFoxPro | TableType::VisualFoxProAutoInc)
    }

    pub fn is_dbase7(self) -> bool {
        matches!(self, TableType::DBase7 | TableType::DBase7Memo)
    }

    /// Size of the fixed header that precedes the column descriptors.
    pub fn fixed_header_size(self) -> usize {
        if self.is_dbase7() { 68 } else { 32 }
    }

    pub fn descriptor_size(self) -> usize {
        if self.is_dbase7() { 48 } else { 32 }
    }

    /// Bytes following the terminator that still belong to the header.
    pub fn backlink_size(self) -> usize {
        if self.is_visual_foxpro() { 263 } else { 0 }
    }

    pub fn max_column_name_length(self) -> usize {
        if self.is_dbase7() { 31 } else { 10 }
    }

    /// Visual FoxPro stores memo pointers as 4-byte integers.
    pub fn binary_memo_pointer(self) -> bool {
        self.is_visual_foxpro()
    }

    pub fn header_length(self, column_count: usize) -> usize {
        self.fixed_header_size() + self.descriptor_size() * column_count + 1 + self.backlink_size()
    }
}
